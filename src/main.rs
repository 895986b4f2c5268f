//! colloquy CLI binary entry point.

use std::io::{BufRead, Write};

use colloquy::chat::Chat;
use colloquy::cli::{render, tools, ChatArgs, Cli, Commands};
use colloquy::config::ColloquyConfig;
use colloquy::types::Message;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("COLLOQUY_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    let result = match cli.command {
        Commands::Chat(chat_args) => handle_chat(chat_args).await,
        Commands::Config => handle_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_chat(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ColloquyConfig::load()?;
    let options = args.chat_options(config.model());

    let mut chat = Chat::new(&config)?
        .with_options(options)
        .with_tools(tools::default_registry())
        .with_event_sink(render::terminal_sink());
    if let Some(system) = args.system {
        chat.append([Message::system(system)]);
    }

    if let Some(prompt) = args.prompt {
        chat.submit([prompt]).await?;
        return Ok(());
    }

    // Interactive: one prompt per line until EOF or an empty line.
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Err(e) = chat.submit([line]).await {
            eprintln!("Error: {e} (suggestion: {:?})", e.recovery_suggestion());
        }
    }
    Ok(())
}

fn handle_config() -> Result<(), Box<dyn std::error::Error>> {
    let path = ColloquyConfig::default_path();
    match &path {
        Some(p) if p.exists() => println!("config file: {}", p.display()),
        Some(p) => println!("config file: {} (not present)", p.display()),
        None => println!("config file: no config directory on this platform"),
    }
    let config = ColloquyConfig::load()?;
    println!("credential: {:?}", config.credential());
    println!(
        "base url: {}",
        config
            .base_url()
            .unwrap_or(colloquy::provider::openai::DEFAULT_BASE_URL)
    );
    println!("model: {}", config.model().unwrap_or(colloquy::models::DEFAULT_MODEL));
    match config.resolve_api_key() {
        Ok(_) => println!("api key: resolved"),
        Err(e) => println!("api key: {e}"),
    }
    Ok(())
}
