use crate::libkaruta::db::PoemRecord;
use crate::libkaruta::shitsumon::{generate_with, judge, Question, QuizError, QuizKind};
use log::{debug, info, warn};
use rand::Rng;
use std::time::Duration;

const QUICK_ANSWER_SECS: f64 = 5.0;
const MAX_POINTS: f64 = 1.5;
const HINT_POINTS: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStatus {
    Correct,
    HintUsed,
    Incorrect,
    Skipped,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Choice(usize),
    DontKnow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerRecord {
    pub poem_id: i32,
    pub prompt: String,
    pub correct_answer: String,
    pub user_answer: Option<String>,
    pub status: AnswerStatus,
    pub time_taken: Duration,
}

impl AnswerRecord {
    pub fn is_correct(&self) -> bool {
        matches!(self.status, AnswerStatus::Correct | AnswerStatus::HintUsed)
    }

    /// Quick correct answers earn up to half a point extra.
    pub fn points(&self) -> f64 {
        match self.status {
            AnswerStatus::Correct => {
                let secs = self.time_taken.as_secs_f64();
                if secs <= QUICK_ANSWER_SECS {
                    (1.0 + (QUICK_ANSWER_SECS - secs) * 0.1).min(MAX_POINTS)
                } else {
                    1.0
                }
            }
            AnswerStatus::HintUsed => HINT_POINTS,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuizSettings {
    pub kind: QuizKind,
    pub question_count: usize,
    pub time_limit: Option<Duration>,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            kind: QuizKind::default(),
            question_count: 10,
            time_limit: None,
        }
    }
}

#[derive(Debug)]
pub struct QuizSession {
    settings: QuizSettings,
    asked: Vec<i32>,
    results: Vec<AnswerRecord>,
    score: usize,
}

impl QuizSession {
    pub fn new(settings: QuizSettings) -> Self {
        Self {
            asked: Vec::with_capacity(settings.question_count),
            results: Vec::with_capacity(settings.question_count),
            settings,
            score: 0,
        }
    }

    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    pub fn is_finished(&self) -> bool {
        self.asked.len() >= self.settings.question_count
    }

    /// Next question with a poem not asked before in this session.
    ///
    /// A poem without three distinct wrong answers is skipped and another
    /// target is tried. If every remaining poem is rejected that way the
    /// rejection is returned. Returns `None` once the session is complete or
    /// no unasked poem is left.
    pub fn next_question<R: Rng + ?Sized>(
        &mut self,
        records: &[PoemRecord],
        rng: &mut R,
    ) -> Result<Option<Question>, QuizError> {
        if self.is_finished() {
            return Ok(None);
        }

        let mut exclude = self.asked.clone();
        let mut rejected = None;
        // Each rejection removes one target, so this ends in at most `records.len()` rounds.
        loop {
            match generate_with(records, self.settings.kind, &exclude, rng) {
                Ok(question) => {
                    self.asked.push(question.poem_id);
                    debug!(
                        "[Quiz] Question {}/{} is poem {}",
                        self.asked.len(),
                        self.settings.question_count,
                        question.poem_id
                    );
                    return Ok(Some(question));
                }
                Err(err @ QuizError::InsufficientDistinctDistractors { poem_id, .. }) => {
                    warn!("[Quiz] {}, trying another poem", err);
                    exclude.push(poem_id);
                    rejected = Some(err);
                }
                Err(QuizError::Exhausted) => break,
                Err(err) => return Err(err),
            }
        }

        if let Some(err) = rejected {
            return Err(err);
        }
        info!("[Quiz] No askable poems left after {} questions", self.asked.len());
        Ok(None)
    }

    pub fn record_answer(
        &mut self,
        question: &Question,
        answer: Answer,
        hint_used: bool,
        elapsed: Duration,
    ) -> Result<&AnswerRecord, QuizError> {
        let (user_answer, correct) = match answer {
            Answer::Choice(index) => {
                let correct = judge(question, index)?;
                (question.candidates.get(index).cloned(), Some(correct))
            }
            Answer::DontKnow => (None, None),
        };

        let timed_out = self
            .settings
            .time_limit
            .is_some_and(|limit| elapsed >= limit);
        let status = match correct {
            _ if timed_out => AnswerStatus::Timeout,
            None => AnswerStatus::Skipped,
            Some(true) if hint_used => AnswerStatus::HintUsed,
            Some(true) => AnswerStatus::Correct,
            Some(false) => AnswerStatus::Incorrect,
        };

        let record = AnswerRecord {
            poem_id: question.poem_id,
            prompt: question.prompt.clone(),
            correct_answer: question.correct_answer().to_string(),
            user_answer,
            status,
            time_taken: elapsed,
        };
        if record.is_correct() {
            self.score += 1;
        }
        debug!(
            "[Quiz] Poem {} answered {:?} in {:.2}s",
            record.poem_id,
            record.status,
            elapsed.as_secs_f64()
        );

        self.results.push(record);
        Ok(&self.results[self.results.len() - 1])
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn answered(&self) -> usize {
        self.results.len()
    }

    /// Percentage of answered questions that were correct.
    pub fn accuracy(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.score as f64 * 100.0 / self.results.len() as f64
    }

    pub fn total_points(&self) -> f64 {
        self.results.iter().map(AnswerRecord::points).sum()
    }

    pub fn average_time(&self) -> Duration {
        match self.results.len() {
            0 => Duration::ZERO,
            n => self.results.iter().map(|r| r.time_taken).sum::<Duration>() / n as u32,
        }
    }

    pub fn grade(&self) -> &'static str {
        match self.accuracy() {
            a if a >= 95.0 => "S",
            a if a >= 90.0 => "A+",
            a if a >= 85.0 => "A",
            a if a >= 80.0 => "B+",
            a if a >= 75.0 => "B",
            a if a >= 70.0 => "C+",
            a if a >= 65.0 => "C",
            a if a >= 60.0 => "D",
            _ => "F",
        }
    }

    pub fn verdict(&self) -> &'static str {
        match self.accuracy() {
            a if a >= 90.0 => "素晴らしい！百人一首マスターです！",
            a if a >= 70.0 => "よくできました！もう少しで完璧です！",
            a if a >= 50.0 => "まずまずです。もう少し練習しましょう！",
            _ => "がんばりましょう！繰り返し挑戦してみてください！",
        }
    }

    pub fn wrong_answers(&self) -> impl Iterator<Item = &AnswerRecord> {
        self.results.iter().filter(|r| !r.is_correct())
    }
}
