use super::{registrar, HandlerErr};
use crate::admission::{CounterKey, SequenceCounter};
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Missing `collection`/`docId` fall back to the configured admission counter.
fn counter_key(state: &AppState, params: &serde_json::Value) -> CounterKey {
    let default = &state.settings.registrar.counter_key;
    let pick = |key: &str, fallback: &str| {
        params
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    CounterKey::new(
        pick("collection", &default.collection),
        pick("docId", &default.doc_id),
    )
}

fn counter_json(key: &CounterKey, counter: &SequenceCounter) -> serde_json::Value {
    json!({
        "collection": key.collection,
        "docId": key.doc_id,
        "totalCount": counter.total_count,
        "updatedAt": counter.updated_at,
    })
}

fn counters_get(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let registrar = registrar(state.registrar.as_ref())?;
    let key = counter_key(state, params);
    let counter = registrar.counter(&key)?;
    Ok(json!({ "counter": counter_json(&key, &counter) }))
}

fn counters_provision(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let registrar = registrar(state.registrar.as_ref())?;
    let key = counter_key(state, params);
    let total = match params.get("totalCount") {
        None | Some(serde_json::Value::Null) => 0,
        Some(v) => v
            .as_u64()
            .ok_or_else(|| HandlerErr::bad_params("totalCount must be a non-negative integer"))?,
    };
    let counter = registrar.provision_counter(&key, total)?;
    Ok(json!({ "counter": counter_json(&key, &counter) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "counters.get" => counters_get(state, &req.params),
        "counters.provision" => counters_provision(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
