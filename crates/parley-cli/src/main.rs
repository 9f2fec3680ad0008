//! # parley
//!
//! Command-line front end: follow the event stream, send one message, or
//! print a channel's recent history.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parley_client::{Client, ClientConfig, Event, HistoryQuery, MessageOptions};
use parley_core::Message;

/// Parley chat client.
#[derive(Parser, Debug)]
#[command(name = "parley", about = "Parley chat client")]
struct Cli {
    /// Account email.
    #[arg(long, env = "PARLEY_EMAIL")]
    email: String,

    /// Account password.
    #[arg(long, env = "PARLEY_PASSWORD", hide_env_values = true)]
    password: String,

    /// Settings file (defaults to `~/.parley/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter, overriding the settings file.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print events until the stream closes or Ctrl-C is pressed.
    Listen,
    /// Send one message.
    Send {
        /// Target channel id.
        #[arg(long)]
        channel: String,
        /// Read the message aloud.
        #[arg(long)]
        tts: bool,
        /// Message text.
        content: String,
    },
    /// Print recent messages, oldest first.
    History {
        /// Channel id.
        #[arg(long)]
        channel: String,
        /// How many messages to fetch.
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

fn print_message(message: &Message) {
    println!(
        "[{}] {}: {}",
        message.channel_id, message.author.name, message.content
    );
}

async fn listen(client: &Client) -> Result<()> {
    client.on("ready", |event: Event| async move {
        let name = event.payload()["user"]["username"]
            .as_str()
            .unwrap_or("unknown user")
            .to_string();
        println!("connected as {name}");
        anyhow::Ok(())
    })?;
    client.on("message_create", |event: Event| async move {
        let message: Message = event.parse()?;
        print_message(&message);
        anyhow::Ok(())
    })?;

    let mut stream = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });

    tokio::select! {
        joined = &mut stream => {
            joined.context("receive loop panicked")?.context("stream failed")?;
            tracing::info!("stream closed by the server");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            tracing::info!("Shutting down...");
            client.close().await;
            stream.await.context("receive loop panicked")??;
        }
    }

    client.wait_for_callbacks().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(parley_settings::settings_path);
    let mut settings = parley_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    if let Some(level) = &cli.log_level {
        settings.logging.level.clone_from(level);
    }
    parley_core::logging::init_subscriber(&settings.logging.level);

    let client = Client::new(ClientConfig::from(&settings));
    client
        .authenticate(&cli.email, &cli.password)
        .await
        .context("Login failed")?;

    match cli.command {
        Command::Listen => listen(&client).await?,
        Command::Send {
            channel,
            tts,
            content,
        } => {
            let options = MessageOptions {
                tts,
                ..MessageOptions::default()
            };
            let message = client
                .send_message(channel.as_str(), &content, options)
                .await
                .context("Failed to send message")?;
            println!("sent message {}", message.id);
        }
        Command::History { channel, limit } => {
            let query = HistoryQuery {
                limit,
                ..HistoryQuery::default()
            };
            let messages = client
                .logs_from(channel.as_str(), &query)
                .await
                .context("Failed to fetch history")?;
            for message in messages.iter().rev() {
                print_message(message);
            }
        }
    }
    Ok(())
}
