//! `concierge chat` — Interactive or single-message chat mode.

use concierge_config::AppConfig;
use concierge_core::event::DomainEvent;
use concierge_core::identity::UserId;
use concierge_orchestrator::Orchestrator;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub async fn run(
    user: Option<String>,
    message: Option<String>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  WARNING: No API key configured. Greetings and repeated questions");
        eprintln!("  still work, but new questions will come back as errors.");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GEMINI_API_KEY     (for Gemini, the default provider)");
        eprintln!("    OPENAI_API_KEY     (for OpenAI-compatible providers)");
        eprintln!("    CONCIERGE_API_KEY  (generic)");
        eprintln!();
        eprintln!("  Or add it to {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
    }

    let orchestrator = concierge_gateway::build_orchestrator(&config)?;
    info!(provider = orchestrator.provider_name(), model = orchestrator.model(), "Chat session starting");
    if verbose {
        let _ = spawn_event_logger(orchestrator.event_bus().subscribe());
    }

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let response = orchestrator.respond(user.as_deref(), &msg).await;
        eprint!("\r              \r");
        println!("{response}");
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║       Concierge — Interactive Mode           ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Assistant:       {}", config.prompt.assistant_name);
    println!("  Provider:        {}", config.default_provider);
    println!("  Model:           {}", orchestrator.model());
    println!("  Knowledge base:  {}", config.knowledge_base.url);
    println!("  User:            {}", user.as_deref().unwrap_or("(not logged in)"));
    println!();
    println!("  Type your message and press Enter.");
    println!("  /history shows this session, /reset clears it.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            prompt()?;
            continue;
        }

        match line {
            "exit" | "quit" | "/exit" | "/quit" | ":q" => break,
            "/history" => print_history(&orchestrator, user.as_deref()).await,
            "/reset" => {
                if let Some(id) = UserId::parse(user.as_deref()) {
                    orchestrator.sessions().remove(&id);
                }
                println!("  (session cleared)\n");
            }
            _ => {
                eprint!("  ...");
                let response = orchestrator.respond(user.as_deref(), line).await;
                eprint!("\r     \r");
                println!();
                for line in response.lines() {
                    println!("  {} > {line}", config.prompt.assistant_name);
                }
                println!();
            }
        }

        prompt()?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

/// Log every orchestration outcome until the bus closes.
fn spawn_event_logger(mut events: broadcast::Receiver<Arc<DomainEvent>>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut seen = 0;
        loop {
            match events.recv().await {
                Ok(event) => {
                    seen += 1;
                    match event.as_ref() {
                        DomainEvent::QueryRejected { .. } => debug!("event: query rejected"),
                        DomainEvent::GreetingAnswered { user_id, .. } => {
                            debug!(user_id = %user_id, "event: greeting answered")
                        }
                        DomainEvent::CachedAnswerServed { user_id, query_preview, .. } => {
                            debug!(user_id = %user_id, query = %query_preview, "event: answered from history")
                        }
                        DomainEvent::ResponseGenerated { user_id, model, tokens_used, duration_ms, .. } => {
                            debug!(user_id = %user_id, model = %model, tokens_used, duration_ms, "event: reply generated")
                        }
                        DomainEvent::UpstreamFailed { user_id, service, error_message, .. } => {
                            debug!(user_id = %user_id, service = %service, error = %error_message, "event: upstream failed")
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event logger fell behind"),
                Err(RecvError::Closed) => return seen,
            }
        }
    })
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

async fn print_history(orchestrator: &Orchestrator, user: Option<&str>) {
    let history = match UserId::parse(user) {
        Some(id) => orchestrator.sessions().peek(&id).await,
        None => None,
    };

    match history {
        Some(history) if !history.is_empty() => {
            for (i, turn) in history.turns().enumerate() {
                println!("  {:>2}. You: {}", i + 1, turn.user_query);
                println!("      Bot: {}", turn.bot_response);
            }
            println!();
        }
        _ => println!("  (no conversation yet)\n"),
    }
}
