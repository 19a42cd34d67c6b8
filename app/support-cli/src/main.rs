use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use support_rag::tools::GitHubIssues;
use support_rag::{
    ChatMessage, ConfigResolver, DefaultEngineFactory, EngineCache, EnvDefaults,
    GenerationOrchestrator, SupportConfig, ToolExecutor, UiConfig,
};

const CONFIG_ENV: &str = "SUPPORT_RAG_CONFIG";

fn load_config() -> Result<SupportConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            tracing::info!("Loading config from {:?}", path);
            Ok(SupportConfig::from_file(&path)?)
        }
        None => {
            let config = SupportConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn build_orchestrator(config: &SupportConfig) -> Result<GenerationOrchestrator> {
    let resolver = ConfigResolver::new(EnvDefaults::capture(), config.llm.default_model.clone());
    let cache = Arc::new(EngineCache::new(Arc::new(DefaultEngineFactory::new(
        config.clone(),
    ))));
    let tracker = GitHubIssues::new(config.tickets.api_base.clone())
        .context("Failed to create issue tracker client")?;
    let executor = Arc::new(ToolExecutor::new(
        Arc::new(tracker),
        config.tickets.labels.clone(),
        Duration::from_secs(config.tickets.timeout_secs),
    ));
    Ok(GenerationOrchestrator::new(config, resolver, cache, executor))
}

/// A line typed at the prompt: either a slash command or a question.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Reset,
    Set(Setting, &'a str),
    Query(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setting {
    Model,
    ApiKey,
    TicketToken,
    TicketRepo,
}

fn parse_input(line: &str) -> Input<'_> {
    let (cmd, rest) = line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim()));
    match cmd {
        "/quit" | "/exit" => Input::Quit,
        "/reset" => Input::Reset,
        "/model" => Input::Set(Setting::Model, rest),
        "/key" => Input::Set(Setting::ApiKey, rest),
        "/token" => Input::Set(Setting::TicketToken, rest),
        "/repo" => Input::Set(Setting::TicketRepo, rest),
        _ => Input::Query(line),
    }
}

/// Store or clear a UI setting. The returned confirmation never contains
/// the API key or ticket token.
fn apply_setting(ui: &mut UiConfig, setting: Setting, value: &str) -> String {
    let value = (!value.is_empty()).then(|| value.to_string());
    let state = if value.is_some() { "set" } else { "cleared" };
    match setting {
        Setting::Model => {
            ui.model_name = value;
            format!("Model: {}", ui.model_name.as_deref().unwrap_or("(default)"))
        }
        Setting::ApiKey => {
            ui.google_api_key = value;
            format!("API key {}.", state)
        }
        Setting::TicketToken => {
            ui.ticket_token = value;
            format!("Ticket token {}.", state)
        }
        Setting::TicketRepo => {
            ui.ticket_repo = value;
            format!("Ticket repository: {}", ui.ticket_repo.as_deref().unwrap_or("(from env)"))
        }
    }
}

fn prompt() -> Result<()> {
    print!("\n> ");
    std::io::stdout().flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with the streamed answer
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config()?;
    tracing::info!(
        data_dir = ?config.data_dir,
        index = ?config.resolved_index_path(),
        provider = ?config.llm.provider,
        "Starting support assistant"
    );
    let orchestrator = build_orchestrator(&config)?;

    let mut ui = UiConfig::default();
    let mut history: Vec<ChatMessage> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "{} support assistant. Commands: /model <name>, /key <api key>, /token <github token>, \
         /repo <owner/name>, /reset, /quit. A blank value clears a setting. \
         Ctrl-C cancels an answer.",
        config.company.name
    );
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let query = line.trim();
        if query.is_empty() {
            prompt()?;
            continue;
        }

        match parse_input(query) {
            Input::Quit => break,
            Input::Reset => {
                history.clear();
                println!("History cleared.");
                prompt()?;
                continue;
            }
            Input::Set(setting, value) => {
                println!("{}", apply_setting(&mut ui, setting, value));
                prompt()?;
                continue;
            }
            Input::Query(_) => {}
        }

        let mut stream = orchestrator.respond(query, history.clone(), &ui);
        let mut answer = String::new();
        let mut cancelled = false;
        loop {
            tokio::select! {
                fragment = stream.next() => match fragment {
                    Some(fragment) => {
                        print!("{}", fragment);
                        std::io::stdout().flush()?;
                        answer.push_str(&fragment);
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    cancelled = true;
                    break;
                }
            }
        }
        // Dropping the stream stops generation and skips pending tool calls
        drop(stream);

        if cancelled {
            println!("\n[cancelled]");
        } else {
            println!();
        }
        history.push(ChatMessage::user(query));
        if !answer.is_empty() {
            history.push(ChatMessage::assistant(answer));
        }
        prompt()?;
    }

    Ok(())
}
