//! Atelier collaboration relay server.
//!
//! Holds an in-memory registry of rooms and fans events out to every other
//! connection in the same room. Nothing is persisted; a restart drops all
//! rooms.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin atelier-relay
//! cargo run --bin atelier-relay -- --host 0.0.0.0 --port 3000 --allowed-origin https://app.example.com
//! ```

use clap::Parser;

use atelier_relay::{RelayConfig, run_server};
use atelier_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "atelier-relay")]
#[command(about = "Room-scoped fan-out relay for Atelier collaboration", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Origin allowed for cross-origin handshakes (any origin if omitted)
    #[arg(long)]
    allowed_origin: Option<String>,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let config = RelayConfig {
        host: args.host,
        port: args.port,
        allowed_origin: args.allowed_origin,
    };

    if let Err(e) = run_server(config).await {
        tracing::error!("relay error: {e}");
        std::process::exit(1);
    }
}
