use nudge_common::config::AppConfig;
use nudge_common::recipients::CsvRecipientSource;
use nudge_notifier::dispatcher::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "nudge_notifier=info,nudge_engine=info,nudge_common=info".into()
            }),
        )
        .json()
        .init();

    tracing::info!("Nudge reminder dispatcher starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    let source = CsvRecipientSource::new(&config.recipients_path);
    let dispatcher = Dispatcher::from_config(&config)?;

    // Ctrl+C abandons whatever is still waiting; the run itself has no timeout
    tokio::select! {
        result = dispatcher.dispatch(&source) => {
            match result {
                Ok(summary) => {
                    tracing::info!(
                        launched = summary.launched,
                        failed = summary.failed,
                        "Processes are done"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Reminder run aborted");
                    return Err(e.into());
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Received shutdown signal, abandoning pending reminders");
        }
    }

    Ok(())
}
