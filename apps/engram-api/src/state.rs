use std::sync::Arc;

use engram_service::EngramService;
use engram_storage::{db::Db, qdrant::MemoryIndex};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<EngramService>,
}
impl AppState {
	pub async fn new(config: engram_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let index = MemoryIndex::new(&config.storage.qdrant, &config.retry)?;

		index.ensure_collection().await?;

		let service = EngramService::new(config, db, index);

		Ok(Self { service: Arc::new(service) })
	}
}
