use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_itemstatd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn itemstatd");
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
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn free_text_rows() -> serde_json::Value {
    json!([
        ["Nama", "Kelas", "benar", "merah"],
        ["Ana", "X", "benar", "biru"],
        ["Budi", "X", "salah", "merah"]
    ])
}

#[test]
fn convert_produces_lettered_table_with_mappings() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "exam.convert",
        json!({ "rows": free_text_rows(), "seed": 11 }),
    );
    assert_eq!(resp["ok"], true, "{}", resp);

    let result = &resp["result"];
    let header = result["rows"][0].as_array().expect("header row");
    assert_eq!(header[0], "Nama");
    assert_eq!(header.last().expect("total column"), "Total Correct");
    // Ana matched the key on question 1, Budi on question 2.
    assert_eq!(result["rows"][1].as_array().expect("row").last().expect("score"), "1");
    assert_eq!(result["rows"][2].as_array().expect("row").last().expect("score"), "1");

    let mappings = result["mappings"].as_array().expect("mappings");
    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings[0]["questionNumber"], 1);
    assert!(mappings[0]["mapping"]["benar"].is_string());
    assert!(mappings[0]["mapping"]["salah"].is_string());

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn convert_is_deterministic_under_a_seed() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let a = request(
        &mut stdin,
        &mut reader,
        "1",
        "exam.convert",
        json!({ "rows": free_text_rows(), "seed": 7 }),
    );
    let b = request(
        &mut stdin,
        &mut reader,
        "2",
        "exam.convert",
        json!({ "rows": free_text_rows(), "seed": 7 }),
    );
    assert_eq!(a["result"], b["result"]);
    drop(stdin);
    let _ = child.wait();
}

#[test]
fn preview_scores_students_against_threshold() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "exam.convertPreview",
        json!({ "rows": free_text_rows(), "seed": 5, "masteryThreshold": 50 }),
    );
    assert_eq!(resp["ok"], true, "{}", resp);

    let result = &resp["result"];
    assert_eq!(result["totalQuestions"], 2);
    let ana = &result["students"][0];
    assert_eq!(ana["number"], 1);
    assert_eq!(ana["name"], "Ana");
    assert_eq!(ana["correct"], 1);
    assert_eq!(ana["mark"], 50);
    assert_eq!(ana["verdict"], "Passed");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn convert_rejects_header_only_input() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "exam.convert",
        json!({ "rows": [["Nama", "Kelas", "benar"]] }),
    );
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "input_too_short");
    drop(stdin);
    let _ = child.wait();
}
