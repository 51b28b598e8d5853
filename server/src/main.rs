use clap::Parser;
use tcpgames_server::{games::GuessMyNumber, Server, ServerConfig};

/// Hosts turn-based text games over TCP.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name shown to connecting clients
    #[arg(short, long, default_value = "Bad BBS")]
    name: String,

    /// Port to listen on
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

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.debug);

    let server = Server::bind(ServerConfig::new(args.name, args.port), GuessMyNumber::factory())?;
    let handle = server.handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => handle.shutdown(),
            Err(err) => tracing::error!("failed to listen for Ctrl-C: {}", err),
        }
    });

    tracing::info!("Press Ctrl-C to shutdown the server at any time.");
    server.run().await;
    Ok(())
}
