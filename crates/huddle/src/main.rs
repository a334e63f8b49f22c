// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use huddle::config::ChatConfig;
use huddle::model::ThreadKey;

/// Realtime chat client.
#[derive(Debug, Parser)]
#[command(name = "huddle", version, about)]
struct Cli {
    #[command(flatten)]
    chat: ChatConfig,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "HUDDLE_LOG_FORMAT")]
    log_format: String,

    /// Log level filter.
    #[arg(long, default_value = "info", env = "HUDDLE_LOG_LEVEL")]
    log_level: String,

    /// Thread to open: `dm:<user>` or `group:<id>`.
    target: ThreadKey,
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Terminal output owns stdout; logs go to stderr.
    match cli.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = huddle::run::run(cli.chat, cli.target).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
