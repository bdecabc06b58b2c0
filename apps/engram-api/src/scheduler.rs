use std::time::Duration;

use engram_service::ProcessRequest;

use crate::state::AppState;

/// Drives the tweet processor on a fixed wall-clock interval, starting with
/// an immediate run. A failed run is logged and the next tick proceeds;
/// nothing here is fatal to the process.
pub async fn run(state: AppState) {
	let interval = Duration::from_secs(state.service.cfg.processor.interval_secs);

	loop {
		match state.service.process_tweets(ProcessRequest::default()).await {
			Ok(report) => {
				tracing::info!(
					processed = report.processed_count,
					failed = report.failed_count,
					"Scheduled tweet batch finished."
				);
			},
			Err(err) => {
				tracing::error!(error = %err, "Scheduled tweet batch failed.");
			},
		}

		tokio::time::sleep(interval).await;
	}
}
