//! Chat client entry point
//!
//! Run with:
//! ```bash
//! API_BASE_URL=http://localhost:8080/api CURRENT_USER_ID=alice \
//! WATCH_CHANNEL_ID=general cargo run -p chat-client
//! ```
//!
//! Watches the configured channel and/or direct conversation, prints every
//! new message, and keeps the contacts' presence warm until Ctrl-C.

use chat_client::{ClientApp, WatchTargets};
use chat_common::{try_init_tracing_with_config, AppError, ClientConfig, TracingConfig};
use chat_core::Message;
use chat_relay::MessageCallback;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, code = e.error_code(), "Client failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = ClientConfig::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_app(&config.app)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        user_id = %config.session.current_user_id,
        base_url = %config.api.base_url,
        "Configuration loaded"
    );

    let targets = WatchTargets::from_env();
    let app = ClientApp::new(&config)?;

    let on_message: MessageCallback = Arc::new(|message: Message| print_message(&message));

    app.run_until(&targets, on_message, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
        }
    })
    .await
}

fn print_message(message: &Message) {
    match serde_json::to_string(message) {
        Ok(line) => println!("{line}"),
        Err(e) => error!(message_id = %message.id, error = %e, "Failed to encode message"),
    }
}
