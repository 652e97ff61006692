use crate::libkaruta::db::PoemRecord;
use crate::libkaruta::session::{Answer, AnswerRecord, AnswerStatus, QuizSession};
use crate::libkaruta::shitsumon::CHOICES_COUNT;
use crate::{Choice, Error};
use colored::Colorize;
use log::debug;
use rand::Rng;
use std::io::{self, Write};
use std::time::Instant;
use text_io::read;

pub fn cli_loop<R: Rng + ?Sized>(
    records: &[PoemRecord],
    session: &mut QuizSession,
    rng: &mut R,
) -> Result<(), Error> {
    let question_count = session.settings().question_count;

    while let Some(question) = session.next_question(records, rng)? {
        let leading = format!("{}/{}. ", session.answered() + 1, question_count);
        println!(
            "{}{} {}",
            leading.cyan(),
            format!(" {} ", question.prompt).black().bold().on_white(),
            format!("(score: {})", session.score()).dimmed()
        );

        let indent = " ".repeat(leading.chars().count());
        for (i, candidate) in question.candidates.iter().enumerate() {
            println!("{}{}. {}", indent, format!("{}", i + 1).bold(), candidate);
        }

        let started = Instant::now();
        let mut hint_used = false;
        let answer = loop {
            print!(
                "{} ",
                format!(
                    "Answer (1-{}, h for a hint, q to quit prematurely and anything else if you don't know):",
                    CHOICES_COUNT
                )
                .cyan()
            );
            io::stdout().flush()?;
            let choice_string: String = read!("{}\n");
            let choice = Choice::from_str(CHOICES_COUNT, choice_string.as_str());
            debug!("choice: {:?}", choice);

            match choice {
                Choice::Option(num) => break Answer::Choice(num),
                Choice::DontKnow => break Answer::DontKnow,
                Choice::Hint => {
                    hint_used = true;
                    println!("{}{}", indent, question.hint().yellow());
                }
                Choice::Quit => {
                    println!("{}", "Quitting Early!".cyan());
                    return Ok(());
                }
            }
        };

        let score = session.score();
        let record = session.record_answer(&question, answer, hint_used, started.elapsed())?;
        print_outcome(record, score);

        if let Some(poem) = records.iter().find(|r| r.id == question.poem_id) {
            println!("{}\n", poem.explanation(question.kind).dimmed());
        }
    }
    Ok(())
}

fn print_outcome(record: &AnswerRecord, previous_score: usize) {
    let current = previous_score + usize::from(record.is_correct());
    match record.status {
        AnswerStatus::Correct => println!(
            "{}",
            format!("Correct!: {} -> {}", previous_score, current).bright_green()
        ),
        AnswerStatus::HintUsed => println!(
            "{}",
            format!("Correct (with hint): {} -> {}", previous_score, current).green()
        ),
        AnswerStatus::Incorrect | AnswerStatus::Skipped => println!(
            "{}",
            format!("Incorrect!: {} -> {}", previous_score, current).bright_red()
        ),
        AnswerStatus::Timeout => println!(
            "{}",
            format!("Too slow!: {} -> {}", previous_score, current).bright_red()
        ),
    }
    if !record.is_correct() {
        println!(
            "{}",
            format!("The correct answer was {:?}.", record.correct_answer).green()
        );
    }
}

pub fn print_summary(session: &QuizSession) {
    let answered = session.answered();
    if answered == 0 {
        return;
    }

    println!("{}", "==========> Results <==========".cyan());
    println!("Questions:  {}", answered);
    println!("Correct:    {}", session.score());
    println!("Accuracy:   {:.1}%", session.accuracy());
    println!("Points:     {:.1}", session.total_points());
    println!(
        "Avg. time:  {:.1}s",
        session.average_time().as_secs_f64()
    );
    println!("Grade:      {}", session.grade().bold());

    let verdict = session.verdict();
    match session.accuracy() {
        a if a >= 90.0 => println!("{}", verdict.bright_green()),
        a if a >= 70.0 => println!("{}", verdict.green()),
        a if a >= 50.0 => println!("{}", verdict.yellow()),
        _ => println!("{}", verdict.bright_red()),
    }

    let wrong: Vec<&AnswerRecord> = session.wrong_answers().collect();
    if wrong.is_empty() {
        return;
    }
    println!("{}", format!("==========> Review ({}) <==========", wrong.len()).cyan());
    for (i, record) in wrong.iter().enumerate() {
        println!("{}. {}", i + 1, record.prompt.bold());
        match &record.user_answer {
            Some(answer) => println!("   {} {}", "✘".bright_red(), answer),
            None => println!("   {} {:?}", "✘".bright_red(), record.status),
        }
        println!("   {} {}", "✔".bright_green(), record.correct_answer);
    }
}
