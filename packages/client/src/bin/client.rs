//! Demo CLI for the Atelier collaboration relay.
//!
//! Joins a room, shows presence/cursor/editor events from other members,
//! and sends each typed line as an editor change to the selected buffer.
//!
//! Commands:
//! - `/buffer markup|style|script` — switch the target buffer
//! - `/cursor X Y` — send a canvas cursor position
//! - anything else — sent as an editor change `{"insert": <line>}`
//!
//! Run with:
//! ```not_rust
//! cargo run --bin atelier-client -- --group G1 --user-id u1 --user-name Ada
//! ```

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use atelier_client::{ClientConfig, ConnectionManager, SessionEvent, formatter};
use atelier_shared::logger::setup_logger;
use atelier_shared::types::{BufferKind, RoomId, UserId, UserIdentity};

#[derive(Parser, Debug)]
#[command(name = "atelier-client")]
#[command(about = "Demo client for the Atelier collaboration relay", long_about = None)]
struct Args {
    /// Relay WebSocket URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Collaboration group (room) to join
    #[arg(short = 'g', long)]
    group: String,

    /// User id (already authenticated upstream; trusted as-is)
    #[arg(long)]
    user_id: String,

    /// Display name
    #[arg(long)]
    user_name: String,

    /// Email shown to other members
    #[arg(long, default_value = "")]
    user_email: String,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "warn");

    let args = Args::parse();

    let group_id = match RoomId::new(args.group) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("invalid group: {e}");
            std::process::exit(1);
        }
    };
    let identity = UserIdentity {
        user_id: UserId::new(args.user_id),
        user_email: args.user_email,
        user_name: args.user_name,
        user_image: String::new(),
    };

    let config = ClientConfig::new(args.url, group_id, identity);
    let (mut manager, mut events) = ConnectionManager::connect(config);

    // Blocking readline thread feeding the async loop.
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("failed to initialize readline: {e}");
                return;
            }
        };
        loop {
            match rl.readline("> ") {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        rl.add_history_entry(&line).ok();
                        if input_tx.send(line).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("readline error: {e}");
                    break;
                }
            }
        }
    });

    let mut buffer = BufferKind::Script;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                None => break,
                Some(SessionEvent::Connected) => println!("connected"),
                Some(SessionEvent::Disconnected) => println!("disconnected, reconnecting..."),
                Some(SessionEvent::Failed(e)) => {
                    eprintln!("connection failed: {e}");
                    std::process::exit(1);
                }
                Some(SessionEvent::Frame(frame)) => print!("{}", formatter::format_frame(&frame)),
            },
            line = input_rx.recv() => match line {
                None => break,
                Some(line) => handle_line(&mut manager, &mut buffer, &line),
            },
        }
    }

    manager.shutdown().await;
}

fn handle_line(manager: &mut ConnectionManager, buffer: &mut BufferKind, line: &str) {
    if let Some(kind) = line.strip_prefix("/buffer ") {
        match kind.trim().parse::<BufferKind>() {
            Ok(kind) => {
                *buffer = kind;
                println!("editing {kind}");
            }
            Err(e) => eprintln!("{e}"),
        }
        return;
    }

    if let Some(coords) = line.strip_prefix("/cursor ") {
        let mut parts = coords.split_whitespace();
        match (
            parts.next().and_then(|x| x.parse::<f64>().ok()),
            parts.next().and_then(|y| y.parse::<f64>().ok()),
        ) {
            (Some(x), Some(y)) => {
                if !manager.send_canvas_cursor(x, y) {
                    eprintln!("not connected yet");
                }
            }
            _ => eprintln!("usage: /cursor X Y"),
        }
        return;
    }

    let changes = serde_json::json!({ "insert": line });
    match manager.send_editor_change(*buffer, changes) {
        Some(version) => println!("sent to {buffer} as v{version}"),
        None => eprintln!("not connected yet"),
    }
}
