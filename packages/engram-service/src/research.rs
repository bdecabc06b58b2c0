use engram_providers::research::{Insight, extract_insights};

use crate::{EngramService, ServiceResult};

impl EngramService {
	/// Asks the research model a question and extracts the insights that
	/// clear the configured confidence floor.
	pub(crate) async fn conduct_research(&self, question: &str) -> ServiceResult<Vec<Insight>> {
		let answer =
			self.providers.research.query(&self.cfg.providers.research, question).await?;
		let insights = extract_insights(
			&answer,
			self.cfg.research.max_insights as usize,
			self.cfg.research.min_confidence,
		);

		tracing::debug!(count = insights.len(), "Extracted research insights.");

		Ok(insights)
	}
}
