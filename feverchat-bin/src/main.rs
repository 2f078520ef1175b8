use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use feverchat_core::{
    config::{Backend, Config},
    prompt::{DISCLAIMER, WELCOME},
    provider_factory::build_provider,
    session::{ChatSession, HealthReport},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Fever-only assistant for a local LLM server", long_about = None)]
struct Cli {
    /// JSON or TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// openai (LM Studio) or ollama
    #[arg(long, global = true)]
    backend: Option<Backend>,

    #[arg(long, global = true)]
    base_url: Option<String>,

    #[arg(long, global = true)]
    model: Option<String>,

    /// Ask for complete answers instead of streamed ones
    #[arg(long, global = true)]
    no_stream: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Check that the server answers and list how many models it has
    Health,
    /// Interactive chat (default)
    Chat,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    if let Some(backend) = cli.backend {
        if cfg.backend != backend && cli.base_url.is_none() {
            cfg.base_url = None;
        }
        cfg.backend = backend;
    }
    if let Some(url) = &cli.base_url {
        cfg.base_url = Some(url.clone());
    }
    if let Some(model) = &cli.model {
        cfg.model = model.clone();
    }
    if cli.no_stream {
        cfg.stream = false;
    }
    Ok(cfg)
}

fn print_delta(delta: &str) {
    print!("{delta}");
    io::stdout().flush().ok();
}

async fn ask(session: &mut ChatSession, question: &str) -> anyhow::Result<()> {
    let reply = session.send(question, print_delta).await?;
    if let Some(notice) = &reply.notice {
        print!("{notice}");
    }
    println!();
    Ok(())
}

async fn health(session: &mut ChatSession) -> bool {
    match session.test_connection().await {
        HealthReport::Connected { .. } => {
            println!("{}", session.status_line());
            true
        }
        HealthReport::Failed { error } => {
            eprintln!("{}: {error}", session.status());
            false
        }
    }
}

async fn repl(session: &mut ChatSession) -> anyhow::Result<()> {
    println!("{WELCOME}");
    println!("{DISCLAIMER}");
    println!("Comandos: /clear /stream /test /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("{}", session.status_line());
            }
            "/stream" => {
                let on = session.toggle_stream();
                println!("Streaming: {}", if on { "activado" } else { "desactivado" });
            }
            "/test" => {
                health(session).await;
            }
            input if session.can_send(input) => ask(session, input).await?,
            _ => {}
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    let provider = build_provider(&cfg)?;
    let mut session = ChatSession::new(cfg, provider);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Ask { question } => ask(&mut session, &question.join(" ")).await?,
        Commands::Health => {
            if !health(&mut session).await {
                std::process::exit(1);
            }
        }
        Commands::Chat => repl(&mut session).await?,
    }

    Ok(())
}
