use crate::libkaruta::db::PoemRecord;
use clap::ValueEnum;
use log::debug;
use rand::seq::{index, IndexedRandom, SliceRandom};
use rand::Rng;
use std::collections::HashSet;
use thiserror::Error;

pub(crate) const CHOICES_COUNT: usize = 4;
const DISTRACTOR_COUNT: usize = CHOICES_COUNT - 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("need at least {} poems to build a question, found {available}", CHOICES_COUNT)]
    InsufficientData { available: usize },
    #[error("poem {poem_id} has only {available} distinct wrong answers to choose from")]
    InsufficientDistinctDistractors { poem_id: i32, available: usize },
    #[error("choice {index} is out of range (0..{count})")]
    InvalidChoice { index: usize, count: usize },
    #[error("every poem has already been asked")]
    Exhausted,
}

/// Which side of a poem is asked and which side is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum QuizKind {
    #[default]
    UpperToLower,
    LowerToUpper,
    AuthorToPoem,
    PoemToAuthor,
}

impl QuizKind {
    pub fn label(&self) -> &'static str {
        match self {
            QuizKind::UpperToLower => "上の句→下の句",
            QuizKind::LowerToUpper => "下の句→上の句",
            QuizKind::AuthorToPoem => "作者→歌",
            QuizKind::PoemToAuthor => "歌→作者",
        }
    }

    fn prompt_of(&self, record: &PoemRecord) -> String {
        match self {
            QuizKind::UpperToLower => record.upper.clone(),
            QuizKind::LowerToUpper => record.lower.clone(),
            QuizKind::AuthorToPoem => format!("「{}」が詠んだ歌は？", record.author),
            QuizKind::PoemToAuthor => record.full_text(),
        }
    }

    fn answer_of(&self, record: &PoemRecord) -> String {
        match self {
            QuizKind::UpperToLower => record.lower.clone(),
            QuizKind::LowerToUpper => record.upper.clone(),
            QuizKind::AuthorToPoem => record.full_text(),
            QuizKind::PoemToAuthor => record.author.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub poem_id: i32,
    pub kind: QuizKind,
    pub prompt: String,
    pub candidates: Vec<String>,
    pub correct_index: usize,
}

impl Question {
    pub fn correct_answer(&self) -> &str {
        &self.candidates[self.correct_index]
    }

    pub fn hint(&self) -> String {
        match self.kind {
            QuizKind::UpperToLower | QuizKind::LowerToUpper => {
                let first = self.correct_answer().chars().next().unwrap_or('?');
                format!("最初の文字は「{}」です", first)
            }
            QuizKind::AuthorToPoem | QuizKind::PoemToAuthor => {
                format!("この歌は{}番の歌です", self.poem_id)
            }
        }
    }
}

/// Upper-fragment prompt, lower-fragment answers, any target.
pub(crate) fn generate<R: Rng + ?Sized>(
    records: &[PoemRecord],
    rng: &mut R,
) -> Result<Question, QuizError> {
    generate_with(records, QuizKind::UpperToLower, &[], rng)
}

/// Builds one question whose target is not in `exclude`.
///
/// Distractors may come from any record other than the target. Answer texts
/// equal to the target's are dropped and repeated texts collapse to one
/// entry, so the four candidates are always distinct.
pub(crate) fn generate_with<R: Rng + ?Sized>(
    records: &[PoemRecord],
    kind: QuizKind,
    exclude: &[i32],
    rng: &mut R,
) -> Result<Question, QuizError> {
    if records.len() < CHOICES_COUNT {
        return Err(QuizError::InsufficientData {
            available: records.len(),
        });
    }

    let targets: Vec<&PoemRecord> = records
        .iter()
        .filter(|r| !exclude.contains(&r.id))
        .collect();
    let target = *targets.choose(rng).ok_or(QuizError::Exhausted)?;
    let correct = kind.answer_of(target);

    let mut seen = HashSet::with_capacity(records.len());
    seen.insert(correct.clone());
    let pool: Vec<String> = records
        .iter()
        .filter(|r| r.id != target.id)
        .map(|r| kind.answer_of(r))
        .filter(|answer| seen.insert(answer.clone()))
        .collect();

    if pool.len() < DISTRACTOR_COUNT {
        return Err(QuizError::InsufficientDistinctDistractors {
            poem_id: target.id,
            available: pool.len(),
        });
    }

    let mut candidates: Vec<String> = index::sample(rng, pool.len(), DISTRACTOR_COUNT)
        .into_iter()
        .map(|i| pool[i].clone())
        .collect();
    candidates.shuffle(rng);
    let correct_index = rng.random_range(0..CHOICES_COUNT);
    candidates.insert(correct_index, correct);

    debug!(
        "[Quiz] Poem {} ({:?}): correct at {} of {:?}",
        target.id, kind, correct_index, candidates
    );

    Ok(Question {
        poem_id: target.id,
        kind,
        prompt: kind.prompt_of(target),
        candidates,
        correct_index,
    })
}

pub(crate) fn judge(question: &Question, chosen_index: usize) -> Result<bool, QuizError> {
    if chosen_index >= CHOICES_COUNT {
        return Err(QuizError::InvalidChoice {
            index: chosen_index,
            count: CHOICES_COUNT,
        });
    }
    Ok(chosen_index == question.correct_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libkaruta::db::tests::poem;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn abcd() -> Vec<PoemRecord> {
        vec![
            poem(1, "w", "a", "A"),
            poem(2, "x", "b", "B"),
            poem(3, "y", "c", "C"),
            poem(4, "z", "d", "D"),
        ]
    }

    fn hundred() -> Vec<PoemRecord> {
        (1..=100)
            .map(|i| {
                poem(
                    i,
                    &format!("author{}", i),
                    &format!("upper{}", i),
                    &format!("lower{}", i),
                )
            })
            .collect()
    }

    fn target<'a>(records: &'a [PoemRecord], q: &Question) -> &'a PoemRecord {
        records.iter().find(|r| r.id == q.poem_id).unwrap()
    }

    #[test]
    fn four_records_yield_a_permutation() {
        let records = abcd();
        for seed in 0..50 {
            let q = generate(&records, &mut StdRng::seed_from_u64(seed)).unwrap();
            let mut sorted = q.candidates.clone();
            sorted.sort();
            assert_eq!(sorted, vec!["A", "B", "C", "D"]);
            assert_eq!(q.correct_answer(), target(&records, &q).lower);
            assert_eq!(q.prompt, target(&records, &q).upper);
        }
    }

    #[test]
    fn candidates_are_distinct_with_one_correct() {
        let records = hundred();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let q = generate(&records, &mut rng).unwrap();
            let expected = &target(&records, &q).lower;

            assert_eq!(q.candidates.len(), CHOICES_COUNT);
            let unique: HashSet<&String> = q.candidates.iter().collect();
            assert_eq!(unique.len(), CHOICES_COUNT);
            assert_eq!(q.candidates.iter().filter(|c| *c == expected).count(), 1);
            assert_eq!(&q.candidates[q.correct_index], expected);
        }
    }

    #[test]
    fn same_seed_same_question() {
        let records = hundred();
        let first = generate(&records, &mut StdRng::seed_from_u64(42)).unwrap();
        let second = generate(&records, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn correct_position_covers_every_slot() {
        let records = abcd();
        let mut rng = StdRng::seed_from_u64(1);
        let mut hits = [0usize; CHOICES_COUNT];
        for _ in 0..400 {
            hits[generate(&records, &mut rng).unwrap().correct_index] += 1;
        }
        assert!(hits.iter().all(|&n| n > 50), "skewed slots: {:?}", hits);
    }

    #[test]
    fn three_records_is_insufficient() {
        let records = &abcd()[..3];
        assert_eq!(
            generate(records, &mut StdRng::seed_from_u64(0)),
            Err(QuizError::InsufficientData { available: 3 })
        );
    }

    #[test]
    fn shared_lower_fragments_leave_too_few_distractors() {
        let records = vec![
            poem(1, "w", "a", "A"),
            poem(2, "x", "b", "A"),
            poem(3, "y", "c", "B"),
            poem(4, "z", "d", "B"),
        ];
        let result = generate(&records, &mut StdRng::seed_from_u64(3));
        assert_matches!(
            result,
            Err(QuizError::InsufficientDistinctDistractors { available: 1, .. })
        );
    }

    #[test]
    fn duplicate_distractor_texts_collapse() {
        let records = vec![
            poem(1, "w", "a", "A"),
            poem(2, "x", "b", "B"),
            poem(3, "y", "c", "B"),
            poem(4, "z", "d", "C"),
            poem(5, "v", "e", "D"),
        ];
        let exclude = [2, 3, 4, 5];
        for seed in 0..30 {
            let mut rng = StdRng::seed_from_u64(seed);
            let q = generate_with(&records, QuizKind::UpperToLower, &exclude, &mut rng).unwrap();
            let mut sorted = q.candidates.clone();
            sorted.sort();
            assert_eq!(sorted, vec!["A", "B", "C", "D"]);
        }
    }

    #[test]
    fn excluded_poems_are_never_targets() {
        let records = hundred();
        let exclude: Vec<i32> = (1..=95).collect();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let q = generate_with(&records, QuizKind::UpperToLower, &exclude, &mut rng).unwrap();
            assert!(q.poem_id > 95);
        }
    }

    #[test]
    fn all_excluded_is_exhausted() {
        let records = abcd();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            generate_with(&records, QuizKind::UpperToLower, &[1, 2, 3, 4], &mut rng),
            Err(QuizError::Exhausted)
        );
    }

    #[test]
    fn kinds_pick_matching_prompt_and_answer() {
        let records = hundred();
        let mut rng = StdRng::seed_from_u64(5);

        let q = generate_with(&records, QuizKind::LowerToUpper, &[], &mut rng).unwrap();
        let t = target(&records, &q);
        assert_eq!((q.prompt.as_str(), q.correct_answer()), (t.lower.as_str(), t.upper.as_str()));

        let q = generate_with(&records, QuizKind::AuthorToPoem, &[], &mut rng).unwrap();
        let t = target(&records, &q);
        assert!(q.prompt.contains(&t.author));
        assert_eq!(q.correct_answer(), t.full_text());

        let q = generate_with(&records, QuizKind::PoemToAuthor, &[], &mut rng).unwrap();
        let t = target(&records, &q);
        assert_eq!(q.prompt, t.full_text());
        assert_eq!(q.correct_answer(), t.author);
    }

    #[test]
    fn judge_accepts_only_the_correct_index() {
        let q = generate(&hundred(), &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(judge(&q, q.correct_index), Ok(true));
        for i in (0..CHOICES_COUNT).filter(|&i| i != q.correct_index) {
            assert_eq!(judge(&q, i), Ok(false));
        }
        assert_eq!(
            judge(&q, 4),
            Err(QuizError::InvalidChoice { index: 4, count: 4 })
        );
    }

    #[test]
    fn hint_reveals_first_character() {
        let q = Question {
            poem_id: 1,
            kind: QuizKind::UpperToLower,
            prompt: "秋の田の".to_string(),
            candidates: vec!["わが衣手は".into(), "b".into(), "c".into(), "d".into()],
            correct_index: 0,
        };
        assert_eq!(q.hint(), "最初の文字は「わ」です");
        assert_eq!(
            Question { kind: QuizKind::PoemToAuthor, ..q }.hint(),
            "この歌は1番の歌です"
        );
    }
}
