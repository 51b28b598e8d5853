use clap::Parser;
use std::sync::Arc;
use tcpgames_client::{Client, ClientConfig, Ended, Terminal};

/// Plays games hosted by a tcpgames server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server to connect to
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = tcpgames::PORT)]
    port: u16,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    const LOG_ENV: &str = "RUST_LOG";
    use std::str::FromStr;
    use tracing::Level;
    use tracing_subscriber::EnvFilter;

    let default_level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = std::env::var(LOG_ENV)
        .map(|env| {
            EnvFilter::from_str(env.as_str())
                .unwrap_or_else(|err| panic!("invalid `{}` environment variable {}", LOG_ENV, err))
        })
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    // The terminal belongs to the game, so logs go to a file.
    let log_file_path = match xdg::BaseDirectories::with_prefix("tcpgames") {
        Ok(dirs) => dirs.get_cache_home().join("client.log"),
        Err(err) => {
            eprintln!("no cache directory for the log file: {}", err);
            return;
        }
    };
    tracing_subscriber::fmt()
        .with_writer(move || {
            if let Some(parent) = log_file_path.parent() {
                if let Err(err) = std::fs::create_dir_all(parent) {
                    eprintln!("failed to create log directory {}: {}", parent.display(), err);
                }
            }
            std::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&log_file_path)
                .map(|file| Box::new(file) as Box<dyn std::io::Write>)
                .unwrap_or_else(|_| Box::new(std::io::sink()) as Box<dyn std::io::Write>)
        })
        .with_ansi(false)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.debug);

    let operator = Arc::new(Terminal::stdout());
    let mut client = Client::new(ClientConfig::new(args.host, args.port), operator);
    if let Err(err) = client.connect().await {
        eprintln!("[ERROR] {}", err);
        return Err(err.into());
    }

    let handle = client.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.disconnect();
        }
    });

    let code = match client.run().await? {
        Ended::ServerBye(_) | Ended::Local => 0,
        Ended::Ungraceful => 1,
    };
    // A prompt may still be blocked on stdin; leaving the runtime would wait
    // for it.
    std::process::exit(code)
}
