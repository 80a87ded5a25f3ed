use super::{get_object, get_required_str, registrar, HandlerErr};
use crate::assets::ImageUpload;
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn students_enroll(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let registrar = registrar(state.registrar.as_ref())?;
    let fields = get_object(params, "fields")?;
    let student = registrar.enroll(fields)?;
    Ok(json!({ "student": student }))
}

fn students_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let Some(registrar) = state.registrar.as_ref() else {
        return Ok(json!({ "students": [] }));
    };
    let students = registrar.list()?;
    Ok(json!({ "students": students }))
}

fn students_get(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let registrar = registrar(state.registrar.as_ref())?;
    let id = get_required_str(params, "id")?;
    let student = registrar.get(&id)?;
    Ok(json!({ "student": student }))
}

fn students_update(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let registrar = registrar(state.registrar.as_ref())?;
    let id = get_required_str(params, "id")?;
    let patch = match params.get("patch") {
        None | Some(serde_json::Value::Null) => serde_json::Map::new(),
        Some(_) => get_object(params, "patch")?,
    };

    let image = match params.get("imagePath").and_then(|v| v.as_str()) {
        Some(p) if !p.trim().is_empty() => {
            let path = PathBuf::from(p.trim());
            let upload = ImageUpload::from_path(&path).map_err(|e| HandlerErr {
                code: "asset_failed",
                message: e.to_string(),
                details: Some(json!({ "imagePath": p })),
            })?;
            Some(upload)
        }
        _ => None,
    };

    let student = registrar.update(&id, patch, image.as_ref())?;
    Ok(json!({ "student": student }))
}

fn students_delete(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let registrar = registrar(state.registrar.as_ref())?;
    let id = get_required_str(params, "id")?;
    registrar.remove(&id)?;
    Ok(json!({ "id": id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.enroll" => students_enroll(state, &req.params),
        "students.list" => students_list(state),
        "students.get" => students_get(state, &req.params),
        "students.update" => students_update(state, &req.params),
        "students.delete" => students_delete(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
