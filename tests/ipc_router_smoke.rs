use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_examdashd");
    let mut child = Command::new(exe)
        .env_remove("EXAMDASHD_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn examdashd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn read_response(reader: &mut BufReader<ChildStdout>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response");
    serde_json::from_str(line.trim()).expect("parse response json")
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

    let value = read_response(reader);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false), "{}", value);
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
}

#[test]
fn router_dispatch_smoke() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"], json!(true));
    assert_eq!(health["result"]["sessions"], json!(0));

    let cfg = request(&mut stdin, &mut reader, "2", "config.get", json!({}));
    assert_eq!(cfg["result"]["sheetName"], json!("UG"));
    assert_eq!(cfg["result"]["semesters"], json!([5, 7]));
    let prefixes: Vec<&str> = cfg["result"]["departmentPrefixes"]
        .as_array()
        .expect("departmentPrefixes")
        .iter()
        .filter_map(|p| p.get("prefix").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(
        prefixes,
        vec!["AE", "AU", "EC", "AZ", "IT", "EI", "ME", "PR", "RO", "RP"]
    );

    let unknown = request(&mut stdin, &mut reader, "3", "classes.list", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    let opened = request(&mut stdin, &mut reader, "4", "session.open", json!({}));
    let session_id = opened["result"]["sessionId"]
        .as_str()
        .expect("sessionId")
        .to_string();

    let health = request(&mut stdin, &mut reader, "5", "health", json!({}));
    assert_eq!(health["result"]["sessions"], json!(1));

    let no_workbook = request(
        &mut stdin,
        &mut reader,
        "6",
        "dashboard.compute",
        json!({ "sessionId": session_id }),
    );
    assert_eq!(error_code(&no_workbook), "no_workbook");

    let missing_id = request(&mut stdin, &mut reader, "7", "filters.options", json!({}));
    assert_eq!(error_code(&missing_id), "bad_params");

    let bogus = request(
        &mut stdin,
        &mut reader,
        "8",
        "dashboard.details",
        json!({ "sessionId": "not-a-session" }),
    );
    assert_eq!(error_code(&bogus), "no_session");

    let missing_path = request(
        &mut stdin,
        &mut reader,
        "9",
        "workbook.load",
        json!({ "sessionId": session_id }),
    );
    assert_eq!(error_code(&missing_path), "bad_params");

    let closed = request(
        &mut stdin,
        &mut reader,
        "10",
        "session.close",
        json!({ "sessionId": session_id }),
    );
    assert_eq!(closed["result"]["closed"], json!(true));
    let closed_again = request(
        &mut stdin,
        &mut reader,
        "11",
        "session.close",
        json!({ "sessionId": session_id }),
    );
    assert_eq!(closed_again["result"]["closed"], json!(false));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_json_gets_bad_json_and_loop_continues() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let resp = read_response(&mut reader);
    assert_eq!(error_code(&resp), "bad_json");

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"], json!(true));

    drop(stdin);
    let _ = child.wait();
}
