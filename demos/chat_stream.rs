//! Streaming chat example.
//!
//! Run with:
//! ```bash
//! RUST_LOG=chatwire=debug cargo run --example chat_stream -- http://localhost:8080/chat "Hello!"
//! ```

use std::io::Write;

use chatwire::model::ChatMessage;
use chatwire::options::StreamOptions;
use chatwire::stream::{fetch_sse, FnCallbacks};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "http://localhost:8080/chat".to_string());
    let question = args.next().unwrap_or_else(|| "Hello!".to_string());

    let options = StreamOptions::new()
        .with_method(reqwest::Method::POST)
        .with_json(&json!({ "question": question }))?;

    let callbacks = FnCallbacks::new(|msg: ChatMessage| {
        if let Some(errmsg) = msg.errmsg {
            eprintln!("\nServer error: {}", errmsg);
        }
        if let Some(token) = msg.token {
            print!("{}", token);
            // Flush stdout to show text immediately
            let _ = std::io::stdout().flush();
        }
        if !msg.histories.is_null() {
            println!("\n\n=== Session {} complete ===", msg.session_id);
        }
    })
    .with_on_error(|err| eprintln!("\nStream error, reconnecting: {}", err))
    .with_on_close(|| println!("\n\n=== Stream closed by server ==="));

    println!("Streaming response from {}...\n", url);

    fetch_sse(url, options, callbacks).join().await?;
    Ok(())
}
