use anyhow::Result;
use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};

mod api_client;
mod poller;

use api_client::{ApiClient, InsightSource};
use poller::Poller;

#[derive(Parser)]
#[command(name = "poll-client")]
#[command(about = "Insight Polling Test Client")]
struct Cli {
    /// Base URL of the backend (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// Existing session to poll; a new session is created when omitted
    #[arg(long)]
    session_id: Option<String>,

    /// Poll interval in seconds (match the backend's chunk duration)
    #[arg(long, default_value_t = 60)]
    interval: u64,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    let api_client = ApiClient::new(reqwest::Client::new(), cli.base_url.clone());

    let session_id = match cli.session_id {
        Some(id) => id,
        None => {
            let id = api_client.create_session().await?;
            println!("{} Created session {}", "✓".green(), id);
            id
        }
    };

    println!(
        "{} Polling session {} every {}s",
        "→".blue(),
        session_id,
        cli.interval
    );
    println!(
        "Commands: {} (pause polling), {} (save + resume), {} (resume without saving), {}, {}, {}",
        "edit".bold(),
        "save <text>".bold(),
        "discard".bold(),
        "end".bold(),
        "resume".bold(),
        "quit".bold()
    );

    let mut poller = Poller::new();
    let mut ticks = tokio::time::interval(std::time::Duration::from_secs(cli.interval));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                run_tick(&api_client, &session_id, &mut poller).await;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(&api_client, &session_id, &mut poller, line.trim()).await? {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// One poll cycle: flush any saved edit first so regeneration merges around
/// it, then ask for the current document. Errors are printed and tolerated;
/// the last shown document stays on screen.
async fn run_tick(source: &impl InsightSource, session_id: &str, poller: &mut Poller) {
    if let Some(content) = poller.take_pending_edit() {
        match source.save_document(session_id, &content).await {
            Ok(()) => println!("{} Edit saved", "✓".green()),
            Err(err) => {
                println!("{} Failed to save edit: {err}", "✗".red());
                // Try again next tick rather than dropping the edit
                poller.end_edit(content);
                return;
            }
        }
    }

    if !poller.should_poll() {
        return;
    }

    match source.ensure_insight(session_id).await {
        Ok(fetched) => {
            if let Some(document) = poller.observe(fetched) {
                println!("\n{}", "=== INSIGHT DOCUMENT ===".bright_white().bold());
                for bullet in &document.bullets {
                    println!("{} {}", "•".cyan(), bullet);
                }
                println!("{}\n", document.content);
            }
        }
        Err(err) => println!("{} Poll failed (will retry): {err}", "✗".red()),
    }
}

async fn handle_command(
    api_client: &ApiClient,
    session_id: &str,
    poller: &mut Poller,
    command: &str,
) -> Result<bool> {
    match command.split_once(' ').unwrap_or((command, "")) {
        ("edit", _) => {
            poller.begin_edit();
            println!("{} Editing; polling paused", "→".blue());
        }
        ("save", content) if !content.is_empty() => {
            poller.end_edit(content.to_string());
            println!("{} Edit staged; polling resumes", "→".blue());
        }
        ("discard", _) => {
            poller.discard_edit();
            println!("{} Edit discarded; polling resumes", "→".blue());
        }
        ("end", _) => {
            api_client.end_session(session_id).await?;
            println!("{} Session ended", "✓".green());
        }
        ("resume", _) => {
            api_client.resume_session(session_id).await?;
            println!("{} Session resumed", "✓".green());
        }
        ("quit", _) => return Ok(false),
        _ => println!("{} Unknown command: {command}", "✗".red()),
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::{FetchedInsight, InsightDocument};
    use std::cell::RefCell;

    struct ScriptedSource {
        calls: RefCell<Vec<String>>,
        fail_save: bool,
        fail_fetch: bool,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                fail_save: false,
                fail_fetch: false,
            }
        }
    }

    impl InsightSource for ScriptedSource {
        async fn ensure_insight(&self, _session_id: &str) -> anyhow::Result<FetchedInsight> {
            self.calls.borrow_mut().push("fetch".to_string());
            if self.fail_fetch {
                anyhow::bail!("backend offline");
            }
            Ok(FetchedInsight::Ready(InsightDocument {
                content: "doc".to_string(),
                bullets: vec![],
                llm_updated_at: None,
                user_edited_at: None,
            }))
        }

        async fn save_document(&self, _session_id: &str, content: &str) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(format!("save:{content}"));
            if self.fail_save {
                anyhow::bail!("backend offline");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn tick_flushes_the_staged_edit_before_polling() {
        let source = ScriptedSource::new();
        let mut poller = Poller::new();
        poller.begin_edit();
        poller.end_edit("my notes".to_string());

        run_tick(&source, "sid", &mut poller).await;

        assert_eq!(
            *source.calls.borrow(),
            vec!["save:my notes".to_string(), "fetch".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_save_keeps_the_edit_staged_and_skips_the_poll() {
        let mut source = ScriptedSource::new();
        source.fail_save = true;
        let mut poller = Poller::new();
        poller.end_edit("my notes".to_string());

        run_tick(&source, "sid", &mut poller).await;

        assert_eq!(*source.calls.borrow(), vec!["save:my notes".to_string()]);
        assert_eq!(poller.take_pending_edit().as_deref(), Some("my notes"));
    }

    #[tokio::test]
    async fn fetch_failures_are_tolerated() {
        let mut source = ScriptedSource::new();
        source.fail_fetch = true;
        let mut poller = Poller::new();

        // Must not panic; the loop simply tries again next tick
        run_tick(&source, "sid", &mut poller).await;
        run_tick(&source, "sid", &mut poller).await;

        assert_eq!(source.calls.borrow().len(), 2);
    }
}
