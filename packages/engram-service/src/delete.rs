use uuid::Uuid;

use crate::{EngramService, ServiceResult};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DeleteRequest {
	pub id: Uuid,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DeleteResponse {
	pub id: Uuid,
	pub status: String,
}

impl EngramService {
	/// Deletes one memory. A missing id surfaces as `ServiceError::NotFound`,
	/// distinct from transport failures.
	pub async fn delete(&self, req: DeleteRequest) -> ServiceResult<DeleteResponse> {
		self.index.delete(req.id).await?;

		Ok(DeleteResponse { id: req.id, status: "deleted".to_string() })
	}
}
