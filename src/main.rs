use mediabackup_lib::config::{self, BotConfig};
use mediabackup_lib::logging::{get_log_dir, init_logging, LogConfig};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let config_dir = config::config_dir();
    let log_config = LogConfig::load(&config_dir);
    let _guard = init_logging(&log_config, &get_log_dir(&config_dir));

    match run(&config_dir).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Bot crashed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config_dir: &std::path::Path) -> anyhow::Result<()> {
    let config = BotConfig::load(config_dir)?;
    let bot = mediabackup_lib::build_bot(config)?;

    tracing::info!("Starting bot...");
    bot.run_polling().await
}
