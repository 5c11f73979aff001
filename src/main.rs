use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;

use genclient::config::normalize_base_url;
use genclient::repl::{self, Command};
use genclient::{
    ClientConfig, ConfigChange, ConfigError, ConversationStore, CredentialStore, FileCredentialStore, HttpTransport,
    MemoryCredentialStore, Mode, ReqwestTransport, TransportError,
};

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("stdin: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "genclient", about = "Chat and image generation against OpenAI-compatible providers")]
struct Cli {
    /// Provider base URL; overrides GENCLIENT_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Starting mode; overrides GENCLIENT_MODE.
    #[arg(long)]
    mode: Option<Mode>,

    /// Keep the API key in memory only.
    #[arg(long)]
    no_persist: bool,

    /// Log debug output to stderr.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = normalize_base_url(&base_url);
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }

    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(config.timeouts)?);
    let credentials: Arc<dyn CredentialStore> = if cli.no_persist {
        Arc::new(MemoryCredentialStore::default())
    } else {
        Arc::new(FileCredentialStore::new(config.credentials_path.clone()))
    };

    let mut store = ConversationStore::new(&config, transport, credentials);
    store.start();
    tracing::info!(base_url = %config.base_url, mode = %config.mode, "genclient started");
    println!("{}", repl::render_status(&store.snapshot()));
    println!("loading models... (/help for commands)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&mut store, &line).await {
                    break;
                }
            }
            () = store.next_catalog_update() => {
                println!("{}", repl::render_status(&store.snapshot()));
            }
        }
    }
    Ok(())
}

/// Run one input line. Returns `false` to exit.
async fn handle_line(store: &mut ConversationStore, line: &str) -> bool {
    let command = match repl::parse_line(line) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            return true;
        }
    };

    match command {
        Command::Prompt(prompt) => {
            if prompt.trim().is_empty() {
                return true;
            }
            match store.submit(&prompt).await {
                Ok(_) => print_last(store),
                Err(e) => eprintln!("not sent: {e}"),
            }
        }
        Command::Retry(index) => match store.retry(index).await {
            Ok(_) => print_last(store),
            Err(e) => eprintln!("not retried: {e}"),
        },
        Command::Base(url) => apply(store, ConfigChange::BaseUrl(url)),
        Command::Mode(mode) => apply(store, ConfigChange::Mode(mode)),
        Command::Use(id) => apply(store, ConfigChange::Model(id)),
        Command::Key(key) => apply(store, ConfigChange::ApiKey(key)),
        Command::Models(query) => {
            store.search_models(&query);
            println!("{}", repl::render_models(&store.snapshot()));
        }
        Command::Attach(path) => match repl::load_attachment(&path).await {
            Ok(uri) => match store.attach_image(uri) {
                Ok(()) => println!("{} image(s) queued", store.attachments().len()),
                Err(e) => eprintln!("{e}"),
            },
            Err(e) => eprintln!("{e}"),
        },
        Command::Detach(index) => match store.remove_attachment(index) {
            Ok(_) => println!("{} image(s) queued", store.attachments().len()),
            Err(e) => eprintln!("{e}"),
        },
        Command::History => {
            for (index, message) in store.messages().iter().enumerate() {
                println!("{}", repl::render_message(index, message));
            }
        }
        Command::Refresh => {
            // Failures land in the banner shown by the status line.
            let _ = store.refresh_catalog_now().await;
            println!("{}", repl::render_status(&store.snapshot()));
        }
        Command::Clear => match store.clear_history() {
            Ok(()) => println!("cleared"),
            Err(e) => eprintln!("{e}"),
        },
        Command::Help => println!("{}", repl::HELP),
        Command::Quit => return false,
    }
    true
}

fn apply(store: &mut ConversationStore, change: ConfigChange) {
    match store.set_configuration(change) {
        Ok(()) => println!("{}", repl::render_status(&store.snapshot())),
        Err(e) => eprintln!("{e}"),
    }
}

fn print_last(store: &ConversationStore) {
    let messages = store.messages();
    if let Some(last) = messages.last() {
        println!("{}", repl::render_message(messages.len() - 1, last));
    }
}
