use crate::libkaruta::db::PoemRecord;
use crate::libkaruta::shitsumon::QuizKind;
use log::warn;
use std::collections::{HashMap, HashSet};

impl PoemRecord {
    pub fn full_text(&self) -> String {
        format!("{} {}", self.upper, self.lower)
    }

    /// Shown after a round is judged.
    pub fn explanation(&self, kind: QuizKind) -> String {
        let mut parts = vec![
            format!("【歌番号】{}番", self.id),
            format!("【作者】{}", self.author),
            String::new(),
            "【全文】".to_string(),
            self.full_text(),
        ];

        if !self.upper_reading.is_empty() || !self.lower_reading.is_empty() {
            parts.push(String::new());
            parts.push("【読み】".to_string());
            parts.push(format!("{} {}", self.upper_reading, self.lower_reading).trim().to_string());
        }
        if !self.description.is_empty() {
            parts.push(String::new());
            parts.push("【解説】".to_string());
            parts.push(self.description.clone());
        }

        parts.push(String::new());
        parts.push(match kind {
            QuizKind::UpperToLower => "※上の句から下の句を導く問題でした。".to_string(),
            QuizKind::LowerToUpper => "※下の句から上の句を導く問題でした。".to_string(),
            QuizKind::AuthorToPoem => format!("※この歌の作者は「{}」です。", self.author),
            QuizKind::PoemToAuthor => format!("※この歌を詠んだのは「{}」です。", self.author),
        });

        parts.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    DuplicateId(i32),
    EmptyUpper(i32),
    EmptyLower(i32),
    EmptyAuthor(i32),
    /// Not fatal, but the affected poems cannot share a question.
    SharedLower { text: String, ids: Vec<i32> },
}

impl Problem {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Problem::SharedLower { .. })
    }
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Problem::DuplicateId(id) => write!(f, "poem number {} appears more than once", id),
            Problem::EmptyUpper(id) => write!(f, "poem {} has an empty upper fragment", id),
            Problem::EmptyLower(id) => write!(f, "poem {} has an empty lower fragment", id),
            Problem::EmptyAuthor(id) => write!(f, "poem {} has no author", id),
            Problem::SharedLower { text, ids } => {
                write!(f, "poems {:?} share the lower fragment {:?}", ids, text)
            }
        }
    }
}

pub fn validate_record(record: &PoemRecord) -> Vec<Problem> {
    let mut problems = Vec::new();
    if record.upper.trim().is_empty() {
        problems.push(Problem::EmptyUpper(record.id));
    }
    if record.lower.trim().is_empty() {
        problems.push(Problem::EmptyLower(record.id));
    }
    if record.author.trim().is_empty() {
        problems.push(Problem::EmptyAuthor(record.id));
    }
    problems
}

pub fn validate_records(records: &[PoemRecord]) -> Vec<Problem> {
    let mut problems = Vec::new();
    let mut seen_ids = HashSet::with_capacity(records.len());
    let mut by_lower: HashMap<&str, Vec<i32>> = HashMap::new();

    for record in records {
        if !seen_ids.insert(record.id) {
            problems.push(Problem::DuplicateId(record.id));
        }
        problems.extend(validate_record(record));
        by_lower.entry(record.lower.as_str()).or_default().push(record.id);
    }

    let mut shared: Vec<Problem> = by_lower
        .into_iter()
        .filter(|(text, ids)| ids.len() > 1 && !text.trim().is_empty())
        .map(|(text, ids)| {
            warn!("[Setup] Poems {:?} share a lower fragment", ids);
            Problem::SharedLower {
                text: text.to_string(),
                ids,
            }
        })
        .collect();
    shared.sort_by_key(|p| match p {
        Problem::SharedLower { ids, .. } => ids.first().copied().unwrap_or_default(),
        _ => 0,
    });
    problems.extend(shared);

    problems
}
