use rust_xlsxwriter::Workbook;
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

/// Writes a single sheet of text cells; the first row is the header.
fn write_sheet(path: &Path, sheet_name: &str, rows: &[&[&str]]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name).expect("sheet name");
    for (r, row) in rows.iter().enumerate() {
        for (c, v) in row.iter().enumerate() {
            sheet
                .write_string(r as u32, c as u16, *v)
                .expect("write cell");
        }
    }
    workbook.save(path).expect("save workbook");
}

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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn open_session(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) -> String {
    let opened = request(stdin, reader, "open", "session.open", json!({}));
    opened["result"]["sessionId"]
        .as_str()
        .expect("sessionId")
        .to_string()
}

const FULL_HEADER: [&str; 10] = [
    "DEPNAME", "BRNAME", "SEM", "REGNO", "SUBCODE", "SUBTYPE", "SESMARK", "ESEM", "TOTMARK",
    "GRADE",
];

#[test]
fn missing_columns_reject_the_load() {
    let dir = temp_dir("examdashd-missing-cols");
    let path = dir.join("partial.xlsx");
    write_sheet(
        &path,
        "UG",
        &[
            &["DEPNAME", "BRNAME", "SEM", "REGNO", "SUBCODE", "SUBTYPE", "SESMARK", "TOTMARK"],
            &["Mech", "B.E. Mech", "5", "1", "ME5701", "T", "30", "70"],
        ],
    );

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let session_id = open_session(&mut stdin, &mut reader);
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "workbook.load",
        json!({ "sessionId": session_id, "path": path.to_string_lossy() }),
    );
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("schema_error"));
    assert_eq!(resp["error"]["details"]["missing"], json!(["ESEM", "GRADE"]));

    // A rejected load leaves the session without a workbook.
    let after = request(
        &mut stdin,
        &mut reader,
        "2",
        "dashboard.compute",
        json!({ "sessionId": session_id }),
    );
    assert_eq!(after["error"]["code"], json!("no_workbook"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn sheet_name_defaults_to_ug_and_can_be_overridden() {
    let dir = temp_dir("examdashd-sheet");
    let path = dir.join("pg.xlsx");
    write_sheet(
        &path,
        "PG",
        &[
            &FULL_HEADER,
            &["Mech", "B.E. Mech", "5", "1", "ME5701", "T", "30", "40", "70", "A"],
        ],
    );

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let session_id = open_session(&mut stdin, &mut reader);

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "workbook.load",
        json!({ "sessionId": session_id, "path": path.to_string_lossy() }),
    );
    assert_eq!(resp["error"]["code"], json!("schema_error"));
    assert_eq!(resp["error"]["details"]["sheet"], json!("UG"));
    assert_eq!(resp["error"]["details"]["available"], json!(["PG"]));

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "workbook.load",
        json!({ "sessionId": session_id, "path": path.to_string_lossy(), "sheetName": "PG" }),
    );
    assert_eq!(resp["ok"], json!(true), "{}", resp);
    assert_eq!(resp["result"]["sheetName"], json!("PG"));
    assert_eq!(resp["result"]["rowCount"], json!(1));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn text_cells_coerce_tolerantly() {
    let dir = temp_dir("examdashd-coerce");
    let path = dir.join("dirty.xlsx");
    write_sheet(
        &path,
        "UG",
        &[
            &FULL_HEADER,
            &["Mech", "B.E. Mech", "5", "1", "ME5701", "T", "40", "50", "90", "A"],
            &["Mech", "B.E. Mech", "5", "2", "ME5701", "T", "x", "40", "", "B"],
            &["Mech", "B.E. Mech", "5", "3", "ME5701", "T", "60", " A ", "60", "u"],
            &["Mech", "B.E. Mech", "5", "3", "ME5701", "T", "10", "10", "20", "U"],
        ],
    );

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let session_id = open_session(&mut stdin, &mut reader);

    let loaded = request(
        &mut stdin,
        &mut reader,
        "1",
        "workbook.load",
        json!({ "sessionId": session_id, "path": path.to_string_lossy() }),
    );
    assert_eq!(loaded["ok"], json!(true), "{}", loaded);
    assert_eq!(loaded["result"]["rowCount"], json!(3));
    assert_eq!(loaded["result"]["coercionGaps"], json!(3));
    assert_eq!(loaded["result"]["duplicateRows"], json!(1));

    let model = request(
        &mut stdin,
        &mut reader,
        "2",
        "dashboard.compute",
        json!({ "sessionId": session_id, "selection": { "semester": "5" } }),
    );
    let overall = &model["result"]["averageMarks"]["overall"];
    assert_eq!(overall[0]["average"], json!(50.0));
    assert_eq!(overall[1]["average"], json!(45.0));
    assert_eq!(overall[2]["average"], json!(75.0));
    assert_eq!(model["result"]["failCategories"][2]["count"], json!(1));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn unreadable_files_report_read_failures() {
    let dir = temp_dir("examdashd-unreadable");
    let not_a_workbook = dir.join("notes.xlsx");
    std::fs::write(&not_a_workbook, b"plain text").expect("write file");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let session_id = open_session(&mut stdin, &mut reader);

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "workbook.load",
        json!({ "sessionId": session_id, "path": not_a_workbook.to_string_lossy() }),
    );
    assert_eq!(resp["error"]["code"], json!("workbook_read_failed"));

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "workbook.load",
        json!({ "sessionId": session_id, "path": dir.join("absent.xlsx").to_string_lossy() }),
    );
    assert_eq!(resp["error"]["code"], json!("workbook_read_failed"));

    drop(stdin);
    let _ = child.wait();
}
