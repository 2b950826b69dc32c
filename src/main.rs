//! CLI entry point for `paperwatch`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use paperwatch::checkpoint::store::CheckpointStore;
use paperwatch::config::{self, Config};
use paperwatch::mailbox::imap::ImapConnector;
use paperwatch::pipeline::MessagePipeline;
use paperwatch::poll::{CancelToken, PollSettings, Watcher};

#[derive(Parser)]
#[command(name = "paperwatch", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE", env = "PAPERWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run a single polling cycle and exit
    #[arg(long)]
    once: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref());

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    config.validate().context("cannot start without an account")?;

    std::fs::create_dir_all(&config.output.dir).with_context(|| {
        format!(
            "cannot create output directory {}",
            config.output.dir.display()
        )
    })?;

    let mut watcher = build_watcher(&config);

    if cli.once {
        let report = watcher.run_once()?;
        tracing::info!(
            unseen = report.unseen,
            new = report.new,
            processed = report.processed.len(),
            failed = report.failed.len(),
            "Single cycle finished"
        );
        return Ok(());
    }

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Interrupt received, shutting down");
        handler_token.cancel();
    })
    .context("cannot install Ctrl-C handler")?;

    watcher.run(&cancel);
    Ok(())
}

fn build_watcher(config: &Config) -> Watcher<ImapConnector> {
    Watcher::new(
        ImapConnector::new(&config.account, &config.poll),
        CheckpointStore::new(config.output.checkpoint_path()),
        MessagePipeline::from_config(&config.output),
        PollSettings::from_config(&config.poll),
    )
}

fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "paperwatch.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}
