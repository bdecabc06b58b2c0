use std::sync::Mutex;

use time::OffsetDateTime;
use uuid::Uuid;

use engram_storage::{db::Db, models::PersonaProfile, queries};

struct CachedPersona {
	profile: PersonaProfile,
	fingerprint: blake3::Hash,
	fetched_at: OffsetDateTime,
}

/// Read-through TTL cache over the persona profile row. The lock is held
/// only around the lookup and the swap, never across the database fetch.
/// On fetch failure the stale copy keeps being served.
pub struct PersonaCache {
	inner: Mutex<Option<CachedPersona>>,
}
impl PersonaCache {
	pub fn new() -> Self {
		Self { inner: Mutex::new(None) }
	}

	pub async fn current(&self, db: &Db, cfg: &engram_config::Persona) -> Option<PersonaProfile> {
		let now = OffsetDateTime::now_utc();
		let ttl = time::Duration::seconds(cfg.refresh_ttl_secs);
		let (stale, previous_fingerprint) = {
			let cached = self.inner.lock().unwrap_or_else(|err| err.into_inner());

			match cached.as_ref() {
				Some(entry) if now - entry.fetched_at < ttl =>
					return Some(entry.profile.clone()),
				Some(entry) => (Some(entry.profile.clone()), Some(entry.fingerprint)),
				None => (None, None),
			}
		};

		let profile_id = match Uuid::parse_str(&cfg.profile_id) {
			Ok(id) => id,
			Err(err) => {
				tracing::warn!(error = %err, "persona.profile_id is not a UUID.");

				return stale;
			},
		};

		match queries::fetch_persona(db, profile_id).await {
			Ok(Some(profile)) => {
				let fingerprint = profile_fingerprint(&profile);

				if let Some(previous) = previous_fingerprint
					&& previous != fingerprint
				{
					tracing::info!(
						version = profile.version,
						"Persona profile update detected."
					);
				}

				let mut cached = self.inner.lock().unwrap_or_else(|err| err.into_inner());

				*cached = Some(CachedPersona {
					profile: profile.clone(),
					fingerprint,
					fetched_at: now,
				});

				Some(profile)
			},
			Ok(None) => {
				tracing::warn!(profile_id = %profile_id, "Persona profile not found.");

				stale
			},
			Err(err) => {
				tracing::warn!(error = %err, "Persona fetch failed. Serving stale profile.");

				stale
			},
		}
	}
}
impl Default for PersonaCache {
	fn default() -> Self {
		Self::new()
	}
}

fn profile_fingerprint(profile: &PersonaProfile) -> blake3::Hash {
	let mut hasher = blake3::Hasher::new();

	hasher.update(profile.name.as_bytes());
	hasher.update(profile.topics.to_string().as_bytes());
	hasher.update(profile.style.to_string().as_bytes());
	hasher.update(&profile.version.to_le_bytes());

	hasher.finalize()
}
