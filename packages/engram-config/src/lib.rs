mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, Memory, Persona, Postgres, Processor,
	Providers, Qdrant, Research, Retry, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.memory.min_alignment_score) {
		return Err(Error::Validation {
			message: "memory.min_alignment_score must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.memory.fallback_alignment_score) {
		return Err(Error::Validation {
			message: "memory.fallback_alignment_score must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.memory.default_agent_id.trim().is_empty() {
		return Err(Error::Validation {
			message: "memory.default_agent_id must be non-empty.".to_string(),
		});
	}
	if cfg.memory.max_page_limit == 0 {
		return Err(Error::Validation {
			message: "memory.max_page_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.memory.default_search_limit == 0
		|| cfg.memory.default_search_limit > cfg.memory.max_page_limit
	{
		return Err(Error::Validation {
			message: "memory.default_search_limit must be between 1 and memory.max_page_limit."
				.to_string(),
		});
	}
	if cfg.persona.profile_id.trim().is_empty() {
		return Err(Error::Validation {
			message: "persona.profile_id must be non-empty.".to_string(),
		});
	}
	if cfg.persona.refresh_ttl_secs <= 0 {
		return Err(Error::Validation {
			message: "persona.refresh_ttl_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.research.max_insights == 0 {
		return Err(Error::Validation {
			message: "research.max_insights must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.research.min_confidence) {
		return Err(Error::Validation {
			message: "research.min_confidence must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.processor.interval_secs == 0 {
		return Err(Error::Validation {
			message: "processor.interval_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.processor.batch_limit == 0 {
		return Err(Error::Validation {
			message: "processor.batch_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.processor.min_engagement < 0.0 {
		return Err(Error::Validation {
			message: "processor.min_engagement must be zero or greater.".to_string(),
		});
	}
	if cfg.retry.max_attempts == 0 {
		return Err(Error::Validation {
			message: "retry.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.retry.base_delay_ms == 0 {
		return Err(Error::Validation {
			message: "retry.base_delay_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.retry.max_delay_ms < cfg.retry.base_delay_ms {
		return Err(Error::Validation {
			message: "retry.max_delay_ms must not be less than retry.base_delay_ms.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("alignment", &cfg.providers.alignment.api_key),
		("research", &cfg.providers.research.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for api_base in [
		&mut cfg.providers.embedding.api_base,
		&mut cfg.providers.alignment.api_base,
		&mut cfg.providers.research.api_base,
	] {
		while api_base.ends_with('/') {
			api_base.pop();
		}
	}

	cfg.storage.qdrant.collection = cfg.storage.qdrant.collection.trim().to_string();
}
