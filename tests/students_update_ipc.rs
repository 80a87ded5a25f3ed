use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar(workspace: &Path) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_admissiond");
    let mut child = Command::new(exe)
        .arg("--workspace")
        .arg(workspace)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn admissiond");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn result(value: serde_json::Value) -> serde_json::Value {
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "request failed: {}",
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value.pointer("/error/code").and_then(|v| v.as_str())
}

fn enrolled_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
) -> serde_json::Value {
    let _ = result(request(stdin, reader, "p", "counters.provision", json!({})));
    let res = result(request(
        stdin,
        reader,
        "e",
        "students.enroll",
        json!({ "fields": { "name": "Asha", "dob": "09-11-2014", "class": 5 } }),
    ));
    res.get("student").cloned().expect("student")
}

#[test]
fn update_merges_patch_and_keeps_assigned_identity() {
    let workspace = temp_dir("admissiond-update-merge");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&workspace);
    let before = enrolled_student(&mut stdin, &mut reader);
    let id = before.get("id").and_then(|v| v.as_str()).expect("id").to_string();

    let res = result(request(
        &mut stdin,
        &mut reader,
        "u1",
        "students.update",
        json!({
            "id": id,
            "patch": {
                "section": "D",
                "class": 6,
                "admission_no": "APX209999999",
                "created_at": "1999-01-01T00:00:00.000Z"
            }
        }),
    ));
    let after = res.get("student").expect("student");
    assert_eq!(after.get("section"), Some(&json!("D")));
    assert_eq!(after.get("class"), Some(&json!(6)));
    assert_eq!(after.get("name"), Some(&json!("Asha")));
    assert_eq!(after.get("admission_no"), before.get("admission_no"));
    assert_eq!(after.get("created_at"), before.get("created_at"));
    assert!(after.get("updated_at").and_then(|v| v.as_str()).is_some());

    let fetched = result(request(
        &mut stdin,
        &mut reader,
        "g1",
        "students.get",
        json!({ "id": id }),
    ));
    assert_eq!(fetched.get("student"), Some(after));

    // Updating does not consume admission numbers.
    let counter = result(request(&mut stdin, &mut reader, "c1", "counters.get", json!({})));
    assert_eq!(counter.pointer("/counter/totalCount"), Some(&json!(1)));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn update_stores_profile_image_under_workspace() {
    let workspace = temp_dir("admissiond-update-image");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&workspace);
    let before = enrolled_student(&mut stdin, &mut reader);
    let id = before.get("id").and_then(|v| v.as_str()).expect("id").to_string();

    let upload_dir = temp_dir("admissiond-update-image-src");
    let image_path = upload_dir.join("portrait.webp");
    std::fs::write(&image_path, b"RIFF0000WEBPVP8 ").expect("write image");

    let res = result(request(
        &mut stdin,
        &mut reader,
        "u1",
        "students.update",
        json!({ "id": id, "imagePath": image_path.to_string_lossy() }),
    ));
    let url = res
        .pointer("/student/profil_url")
        .and_then(|v| v.as_str())
        .expect("profil_url")
        .to_string();
    let stored = PathBuf::from(&url);
    assert!(stored.is_file(), "missing stored image at {}", url);
    assert!(stored.starts_with(workspace.join("profile_images").join(&id)));
    assert_eq!(stored.extension().and_then(|s| s.to_str()), Some("webp"));
    assert_eq!(
        std::fs::read(&stored).expect("read stored image"),
        b"RIFF0000WEBPVP8 ".to_vec()
    );

    // A missing upload is reported and the record keeps its previous image.
    let missing = request(
        &mut stdin,
        &mut reader,
        "u2",
        "students.update",
        json!({
            "id": id,
            "patch": { "section": "X" },
            "imagePath": upload_dir.join("absent.png").to_string_lossy()
        }),
    );
    assert_eq!(error_code(&missing), Some("asset_failed"));
    let fetched = result(request(
        &mut stdin,
        &mut reader,
        "g1",
        "students.get",
        json!({ "id": id }),
    ));
    assert_eq!(
        fetched.pointer("/student/profil_url").and_then(|v| v.as_str()),
        Some(url.as_str())
    );
    assert_eq!(fetched.pointer("/student/section"), None);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn update_and_get_report_unknown_students() {
    let workspace = temp_dir("admissiond-update-missing");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&workspace);

    let update = request(
        &mut stdin,
        &mut reader,
        "1",
        "students.update",
        json!({ "id": "nope", "patch": { "section": "A" } }),
    );
    assert_eq!(error_code(&update), Some("not_found"));
    let get = request(&mut stdin, &mut reader, "2", "students.get", json!({ "id": "nope" }));
    assert_eq!(error_code(&get), Some("not_found"));
    let missing_id = request(&mut stdin, &mut reader, "3", "students.get", json!({}));
    assert_eq!(error_code(&missing_id), Some("bad_params"));
    let bad_patch = request(
        &mut stdin,
        &mut reader,
        "4",
        "students.update",
        json!({ "id": "nope", "patch": "section=A" }),
    );
    assert_eq!(error_code(&bad_patch), Some("bad_params"));

    drop(stdin);
    let _ = child.wait();
}
