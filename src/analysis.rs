use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::normalize::{build_answer_key, build_student_records, CellValue, StudentRecord};

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AnalysisError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Thresholds of the classical item-analysis method. All cut-offs are
/// inclusive lower bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    /// Share of the ranked class forming each comparison group (27% is the
    /// standard Kelley cut).
    pub group_fraction: f64,
    pub difficulty_easy_min: f64,
    pub difficulty_medium_min: f64,
    pub discrimination_very_good_min: f64,
    pub discrimination_good_min: f64,
    pub discrimination_fair_min: f64,
    pub discrimination_poor_min: f64,
    /// A distractor chosen by fewer than this percentage of the class counts
    /// as not chosen.
    pub distractor_min_percent: f64,
    pub status_good_discrimination_min: f64,
    pub status_good_difficulty_min: f64,
    pub status_good_difficulty_max: f64,
    pub status_revise_discrimination_below: f64,
    pub status_revise_difficulty_below: f64,
    pub status_revise_difficulty_above: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            group_fraction: 0.27,
            difficulty_easy_min: 0.7,
            difficulty_medium_min: 0.3,
            discrimination_very_good_min: 0.4,
            discrimination_good_min: 0.3,
            discrimination_fair_min: 0.2,
            discrimination_poor_min: 0.1,
            distractor_min_percent: 5.0,
            status_good_discrimination_min: 0.3,
            status_good_difficulty_min: 0.3,
            status_good_difficulty_max: 0.7,
            status_revise_discrimination_below: 0.2,
            status_revise_difficulty_below: 0.25,
            status_revise_difficulty_above: 0.8,
        }
    }
}

impl AnalysisConfig {
    pub fn difficulty_label(&self, p: f64) -> &'static str {
        if p >= self.difficulty_easy_min {
            "Easy"
        } else if p >= self.difficulty_medium_min {
            "Medium"
        } else {
            "Difficult"
        }
    }

    pub fn discrimination_label(&self, d: f64) -> &'static str {
        if d >= self.discrimination_very_good_min {
            "Very Good"
        } else if d >= self.discrimination_good_min {
            "Good"
        } else if d >= self.discrimination_fair_min {
            "Fair"
        } else if d >= self.discrimination_poor_min {
            "Poor"
        } else {
            "Bad"
        }
    }

    /// Composite keep/revise verdict. The two source predicates are not
    /// complements; items falling in neither band stay `Indeterminate`
    /// rather than being forced into one of them.
    pub fn item_status(&self, difficulty: f64, discrimination: f64) -> ItemStatus {
        if discrimination >= self.status_good_discrimination_min
            && difficulty >= self.status_good_difficulty_min
            && difficulty <= self.status_good_difficulty_max
        {
            ItemStatus::Good
        } else if discrimination < self.status_revise_discrimination_below
            || difficulty < self.status_revise_difficulty_below
            || difficulty > self.status_revise_difficulty_above
        {
            ItemStatus::NeedsRevision
        } else {
            ItemStatus::Indeterminate
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemStatus {
    #[serde(rename = "Good item")]
    Good,
    #[serde(rename = "Needs revision")]
    NeedsRevision,
    #[serde(rename = "Indeterminate")]
    Indeterminate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectAnswerStats {
    pub upper_count: usize,
    pub lower_count: usize,
    pub total_count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistractorStats {
    pub option: String,
    pub upper_count: usize,
    pub lower_count: usize,
    pub total_count: usize,
    pub percentage: f64,
    pub effectiveness: &'static str,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStatistics {
    pub question: String,
    pub correct_answer: String,
    pub difficulty: f64,
    pub difficulty_label: &'static str,
    pub discrimination: f64,
    pub discrimination_label: &'static str,
    pub correct_answer_stats: CorrectAnswerStats,
    pub distractors: Vec<DistractorStats>,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub name: String,
    pub group_label: String,
    pub correct: usize,
    pub incorrect: usize,
    pub total: usize,
    pub score: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub group_label: String,
    pub students: Vec<StudentSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub total_questions: usize,
    pub total_students: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAnalysis {
    pub analysis: Vec<ItemStatistics>,
    pub grouped_students: Vec<ClassGroup>,
    pub summary: AnalysisSummary,
}

#[derive(Clone, Copy, PartialEq)]
enum GroupSide {
    Upper,
    Lower,
    Middle,
}

#[derive(Debug, Clone, Default)]
struct OptionCount {
    total: usize,
    upper: usize,
    lower: usize,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Record indices ordered by descending score. `sort_by` is stable, so
/// equal scores keep their input order; grouping must not depend on host
/// sort quirks.
pub(crate) fn ranked_indices(students: &[StudentRecord]) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..students.len()).collect();
    ranked.sort_by(|&a, &b| students[b].score.cmp(&students[a].score));
    ranked
}

pub fn analyze_exam(
    rows: &[Vec<CellValue>],
    config: &AnalysisConfig,
) -> Result<ExamAnalysis, AnalysisError> {
    if rows.len() < 2 {
        return Err(AnalysisError::new(
            "input_too_short",
            "input must contain a header row and at least one data row",
        ));
    }

    let key = build_answer_key(&rows[0]);
    let students = build_student_records(&rows[1..], &key);
    let n = students.len();
    let total_questions = key.len();

    let ranked = ranked_indices(&students);
    let group_size = (n as f64 * config.group_fraction).floor() as usize;
    let mut side = vec![GroupSide::Middle; n];
    for &i in &ranked[..group_size] {
        side[i] = GroupSide::Upper;
    }
    for &i in &ranked[n - group_size..] {
        side[i] = GroupSide::Lower;
    }

    let mut analysis: Vec<ItemStatistics> = Vec::with_capacity(total_questions);
    for (q, correct_token) in key.iter().enumerate() {
        // Blank answers contribute to no tally entry. BTreeMap keeps the
        // option order deterministic regardless of scan order.
        let mut tally: BTreeMap<String, OptionCount> = BTreeMap::new();
        for (i, s) in students.iter().enumerate() {
            let Some(answer) = s.answers.get(q) else {
                continue;
            };
            if answer.is_empty() {
                continue;
            }
            let entry = tally.entry(answer.clone()).or_default();
            entry.total += 1;
            match side[i] {
                GroupSide::Upper => entry.upper += 1,
                GroupSide::Lower => entry.lower += 1,
                GroupSide::Middle => {}
            }
        }

        let correct = tally.get(correct_token).cloned().unwrap_or_default();
        let difficulty = if n > 0 {
            correct.total as f64 / n as f64
        } else {
            0.0
        };
        // With fewer than 1/group_fraction students both groups are empty;
        // the discrimination index is defined to 0 rather than 0/0.
        let discrimination = if group_size > 0 {
            (correct.upper as f64 - correct.lower as f64) / group_size as f64
        } else {
            0.0
        };

        let mut distractors: Vec<DistractorStats> = Vec::new();
        for (option, count) in &tally {
            if option.eq_ignore_ascii_case(correct_token) {
                continue;
            }
            let percentage = if n > 0 {
                count.total as f64 / n as f64 * 100.0
            } else {
                0.0
            };
            let effective =
                count.lower > count.upper && percentage >= config.distractor_min_percent;
            let effectiveness = if effective {
                "Effective"
            } else if percentage < config.distractor_min_percent {
                "Not Chosen"
            } else {
                "Less Effective"
            };
            let reason = if count.lower <= count.upper {
                "Chosen more by upper group"
            } else if percentage < config.distractor_min_percent {
                "Rarely chosen"
            } else {
                "Good"
            };
            distractors.push(DistractorStats {
                option: option.clone(),
                upper_count: count.upper,
                lower_count: count.lower,
                total_count: count.total,
                percentage: round1(percentage),
                effectiveness,
                reason,
            });
        }
        distractors.sort_by(|a, b| b.total_count.cmp(&a.total_count));

        let difficulty_out = round2(difficulty);
        let discrimination_out = round2(discrimination);
        analysis.push(ItemStatistics {
            question: format!("Question {}", q + 1),
            correct_answer: correct_token.clone(),
            difficulty: difficulty_out,
            difficulty_label: config.difficulty_label(difficulty),
            discrimination: discrimination_out,
            discrimination_label: config.discrimination_label(discrimination),
            correct_answer_stats: CorrectAnswerStats {
                upper_count: correct.upper,
                lower_count: correct.lower,
                total_count: correct.total,
                percentage: round1(difficulty * 100.0),
            },
            distractors,
            // The verdict reads off the reported 2-decimal figures.
            status: config.item_status(difficulty_out, discrimination_out),
        });
    }

    let mut groups: BTreeMap<String, Vec<StudentSummary>> = BTreeMap::new();
    for s in &students {
        if s.name.is_empty() || s.group_label.is_empty() {
            continue;
        }
        let percentage = if total_questions > 0 {
            s.score as f64 / total_questions as f64 * 100.0
        } else {
            0.0
        };
        groups.entry(s.group_label.clone()).or_default().push(StudentSummary {
            name: s.name.clone(),
            group_label: s.group_label.clone(),
            correct: s.score,
            incorrect: total_questions.saturating_sub(s.score),
            total: total_questions,
            score: s.score,
            percentage: round1(percentage),
        });
    }
    let grouped_students: Vec<ClassGroup> = groups
        .into_iter()
        .map(|(group_label, mut students)| {
            students.sort_by(|a, b| a.name.to_uppercase().cmp(&b.name.to_uppercase()));
            ClassGroup {
                group_label,
                students,
            }
        })
        .collect();

    Ok(ExamAnalysis {
        analysis,
        grouped_students,
        summary: AnalysisSummary {
            total_questions,
            total_students: n,
        },
    })
}
