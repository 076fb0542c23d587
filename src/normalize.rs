use serde::Deserialize;

/// A raw spreadsheet cell as it arrives over IPC. Untagged so JSON strings,
/// numbers and nulls all decode without a wrapper object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    /// Trimmed display form. Integral numbers render without a decimal
    /// point, matching how spreadsheet tools show them.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Empty => String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub name: String,
    pub group_label: String,
    pub answers: Vec<String>,
    pub score: usize,
}

/// Canonical answer token: trimmed, upper-cased, with the numeric encodings
/// 1..5 mapped onto A..E. Anything else passes through unchanged so
/// already-lettered input (including unrecognized tokens) survives verbatim.
pub fn normalize_answer(value: &CellValue) -> String {
    let s = value.as_text().to_uppercase();
    match s.as_str() {
        "1" => "A".to_string(),
        "2" => "B".to_string(),
        "3" => "C".to_string(),
        "4" => "D".to_string(),
        "5" => "E".to_string(),
        _ => s,
    }
}

/// Answer key from the header row. Columns 0 and 1 are the name and class
/// labels; every column from index 2 on is one question.
pub fn build_answer_key(header: &[CellValue]) -> Vec<String> {
    header.iter().skip(2).map(normalize_answer).collect()
}

pub fn build_student_records(rows: &[Vec<CellValue>], key: &[String]) -> Vec<StudentRecord> {
    rows.iter()
        .map(|row| {
            let name = row.first().map(CellValue::as_text).unwrap_or_default();
            let group_label = row.get(1).map(CellValue::as_text).unwrap_or_default();
            let answers: Vec<String> = row.iter().skip(2).map(normalize_answer).collect();
            // Short rows score over the positions present in both vectors.
            let score = answers
                .iter()
                .zip(key.iter())
                .filter(|(a, k)| a.trim().eq_ignore_ascii_case(k.trim()))
                .count();
            StudentRecord {
                name,
                group_label,
                answers,
                score,
            }
        })
        .collect()
}
