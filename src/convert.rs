use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::analysis::AnalysisError;
use crate::normalize::CellValue;

const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random bijection from the free-text tokens of one question column onto
/// option letters. Tokens past the alphabet stay unmapped and pass through.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionMapping {
    pub question_number: usize,
    pub mapping: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedTable {
    pub rows: Vec<Vec<String>>,
    pub mappings: Vec<QuestionMapping>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPreview {
    pub number: usize,
    pub name: String,
    pub group_label: String,
    pub answers: String,
    pub correct: usize,
    pub incorrect: usize,
    pub score: usize,
    pub mark: i64,
    pub verdict: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertPreview {
    pub mappings: Vec<QuestionMapping>,
    pub answer_key: String,
    pub total_questions: usize,
    pub total_options: usize,
    pub students: Vec<StudentPreview>,
}

fn too_short() -> AnalysisError {
    AnalysisError::new(
        "input_too_short",
        "input must contain a header row and at least one data row",
    )
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// One mapping per question column, built from the distinct trimmed tokens
/// of the key cell and every student cell, shuffled before letters are
/// assigned.
pub fn build_mappings<R: Rng>(
    header: &[CellValue],
    data_rows: &[Vec<CellValue>],
    rng: &mut R,
) -> Vec<QuestionMapping> {
    let mut mappings = Vec::new();
    for col in 2..header.len() {
        let mut tokens: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let key_token = header[col].as_text();
        if !key_token.is_empty() && seen.insert(key_token.clone()) {
            tokens.push(key_token);
        }
        for row in data_rows {
            let Some(cell) = row.get(col) else {
                continue;
            };
            let token = cell.as_text();
            if !token.is_empty() && seen.insert(token.clone()) {
                tokens.push(token);
            }
        }

        tokens.shuffle(rng);
        let mut mapping = BTreeMap::new();
        for (idx, token) in tokens.into_iter().enumerate() {
            if idx < LETTERS.len() {
                mapping.insert(token, (LETTERS[idx] as char).to_string());
            }
        }
        mappings.push(QuestionMapping {
            question_number: col - 1,
            mapping,
        });
    }
    mappings
}

fn map_token(mappings: &[QuestionMapping], col: usize, token: &str) -> String {
    mappings
        .get(col - 2)
        .and_then(|m| m.mapping.get(token))
        .cloned()
        .unwrap_or_else(|| token.to_string())
}

fn mapped_answer_key(header: &[CellValue], mappings: &[QuestionMapping]) -> Vec<String> {
    (2..header.len())
        .map(|col| map_token(mappings, col, &header[col].as_text()))
        .collect()
}

fn count_correct(answers: &[String], key: &[String]) -> usize {
    answers
        .iter()
        .enumerate()
        .filter(|(i, a)| {
            let Some(k) = key.get(*i) else {
                return false;
            };
            !a.is_empty() && !k.is_empty() && a.eq_ignore_ascii_case(k)
        })
        .count()
}

/// Rewrite the uploaded table with lettered answers. The output header is
/// `name | class | <combined key> | one column per question | Total Correct`
/// and every data row carries the combined answer string plus a score.
pub fn convert_exam(
    rows: &[Vec<CellValue>],
    seed: Option<u64>,
) -> Result<ConvertedTable, AnalysisError> {
    if rows.len() < 2 {
        return Err(too_short());
    }
    let header = &rows[0];
    let data_rows = &rows[1..];
    let mut rng = make_rng(seed);
    let mappings = build_mappings(header, data_rows, &mut rng);
    let key = mapped_answer_key(header, &mappings);

    let mut out: Vec<Vec<String>> = Vec::with_capacity(rows.len());
    let mut header_row: Vec<String> = Vec::with_capacity(header.len() + 2);
    header_row.push(header.first().map(CellValue::as_text).unwrap_or_default());
    header_row.push(header.get(1).map(CellValue::as_text).unwrap_or_default());
    header_row.push(key.concat());
    header_row.extend(key.iter().cloned());
    header_row.push("Total Correct".to_string());
    out.push(header_row);

    for row in data_rows {
        let answers: Vec<String> = (2..row.len())
            .map(|col| map_token(&mappings, col, &row[col].as_text()))
            .collect();
        let mut converted: Vec<String> = Vec::with_capacity(row.len() + 2);
        converted.push(row.first().map(CellValue::as_text).unwrap_or_default());
        converted.push(row.get(1).map(CellValue::as_text).unwrap_or_default());
        converted.push(answers.concat());
        converted.extend(answers.iter().cloned());
        converted.push(count_correct(&answers, &key).to_string());
        out.push(converted);
    }

    Ok(ConvertedTable {
        rows: out,
        mappings,
    })
}

/// Scored per-student preview of a conversion, with a pass verdict against
/// the mastery threshold.
pub fn convert_preview(
    rows: &[Vec<CellValue>],
    seed: Option<u64>,
    mastery_threshold: f64,
) -> Result<ConvertPreview, AnalysisError> {
    if rows.len() < 2 {
        return Err(too_short());
    }
    let header = &rows[0];
    let data_rows = &rows[1..];
    let mut rng = make_rng(seed);
    let mappings = build_mappings(header, data_rows, &mut rng);
    let key = mapped_answer_key(header, &mappings);
    let total_options: HashSet<&String> = key.iter().collect();

    let mut students = Vec::with_capacity(data_rows.len());
    for (idx, row) in data_rows.iter().enumerate() {
        let answers: Vec<String> = (2..row.len())
            .map(|col| map_token(&mappings, col, &row[col].as_text()))
            .collect();
        let correct = count_correct(&answers, &key);
        let mark = if answers.is_empty() {
            0.0
        } else {
            correct as f64 / answers.len() as f64 * 100.0
        };
        students.push(StudentPreview {
            number: idx + 1,
            name: row.first().map(CellValue::as_text).unwrap_or_default(),
            group_label: row.get(1).map(CellValue::as_text).unwrap_or_default(),
            answers: answers.concat(),
            correct,
            incorrect: answers.len() - correct,
            score: correct,
            mark: mark.round() as i64,
            verdict: if mark >= mastery_threshold {
                "Passed"
            } else {
                "Not Passed"
            },
        });
    }

    Ok(ConvertPreview {
        answer_key: key.concat(),
        total_questions: key.len(),
        total_options: total_options.len(),
        mappings,
        students,
    })
}
