use crate::llm::provider::LlmProvider;
use crate::relay::{Conversation, ExchangeOutcome, RelayService, SessionState};
use anyhow::{Result, bail};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::Path;
use std::time::Duration;

pub const EXIT_WORDS: [&str; 3] = ["exit", "quit", "keluar"];
const PROMPT: &str = "You: ";
const RETRY_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction<'a> {
    Exit,
    Skip,
    Send(&'a str),
}

pub fn classify_line(line: &str) -> LineAction<'_> {
    let trimmed = line.trim();
    if EXIT_WORDS
        .iter()
        .any(|word| trimmed.eq_ignore_ascii_case(word))
    {
        LineAction::Exit
    } else if trimmed.is_empty() {
        LineAction::Skip
    } else {
        LineAction::Send(trimmed)
    }
}

pub fn banner(name: &str, max: u32, remaining: u32) -> String {
    let rule = "-".repeat(50);
    format!(
        "--- {name} PROPERTY CHAT ---\nRequest limit: {max}. Remaining: {remaining}.\nWelcome! I'm {name}, your property assistant. How can I help you today?\n{rule}"
    )
}

pub async fn run_repl<P: LlmProvider>(relay: &RelayService<P>, usage_file: &Path) -> Result<()> {
    let notices = relay.notices();
    if let Some(reason) = relay.offline_reason() {
        bail!("{}", notices.offline(reason));
    }

    let ledger = relay.quota().ledger_for(None);
    let remaining = ledger.remaining()?;
    if remaining == 0 {
        println!("\n--- WARNING ---");
        println!(
            "{} Delete {} to start a new session.",
            notices.quota_exhausted(ledger.max()),
            usage_file.display()
        );
        return Ok(());
    }

    println!("{}", banner(notices.name(), ledger.max(), remaining));

    let mut rl = DefaultEditor::new()?;
    let mut conversation = Conversation::new();

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                println!("\n{}", notices.farewell());
                break;
            }
            Err(err) => return Err(err.into()),
        };

        let text = match classify_line(&line) {
            LineAction::Exit => {
                println!("\n{}", notices.farewell());
                break;
            }
            LineAction::Skip => continue,
            LineAction::Send(text) => text,
        };
        let _ = rl.add_history_entry(text);

        // Outside readline the terminal is in cooked mode, so Ctrl-C arrives as SIGINT.
        let outcome = tokio::select! {
            outcome = relay.exchange(None, &mut conversation, text) => outcome,
            () = interrupted() => {
                println!("\n{}", notices.farewell());
                break;
            }
        };
        match &outcome {
            ExchangeOutcome::Replied { text, .. } => {
                println!("{}: {text}", notices.name());
                println!("{}", "-".repeat(50));
            }
            ExchangeOutcome::Failed { .. } => {
                println!("\n{}", relay.render(&outcome));
                tokio::select! {
                    () = tokio::time::sleep(RETRY_PAUSE) => {}
                    () = interrupted() => {
                        println!("\n{}", notices.farewell());
                        break;
                    }
                }
            }
            ExchangeOutcome::QuotaExhausted | ExchangeOutcome::Offline(_) => {}
        }

        if outcome.next_state() == SessionState::Exhausted {
            println!("\n--- SESSION ENDED ---");
            println!("{}", notices.quota_exhausted(ledger.max()));
            break;
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
