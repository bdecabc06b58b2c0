use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use engram_service::{
	BatchReport, CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ListRequest,
	ListResponse, ProcessRequest, SearchRequest, SearchResponse, ServiceError,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/memories/", get(list_memories).post(create_memory))
		.route("/memories/search", get(search_memories))
		.route("/memories/{id}", delete(delete_memory))
		.route("/tweets/process", post(process_tweets))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct ListParams {
	page: Option<u32>,
	limit: Option<u32>,
	memory_type: Option<String>,
	min_alignment: Option<f32>,
	tags: Option<String>,
}

async fn list_memories(
	State(state): State<AppState>,
	Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
	let page = params
		.page
		.ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "invalid_request", "page is required."))?;
	let limit = params.limit.ok_or_else(|| {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", "limit is required.")
	})?;
	let request = ListRequest {
		page,
		limit,
		memory_type: params.memory_type,
		min_alignment: params.min_alignment,
		tags: split_tags(params.tags.as_deref()),
	};
	let response = state.service.list(request).await?;

	Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
	query: String,
	limit: Option<u32>,
	memory_type: Option<String>,
	min_alignment: Option<f32>,
	tags: Option<String>,
}

async fn search_memories(
	State(state): State<AppState>,
	Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
	let request = SearchRequest {
		query: params.query,
		limit: params.limit,
		memory_type: params.memory_type,
		min_alignment: params.min_alignment,
		tags: split_tags(params.tags.as_deref()),
	};
	let response = state.service.search(request).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct CreatedBody {
	id: Uuid,
}

#[derive(Debug, Serialize)]
struct RejectedBody {
	error_code: &'static str,
	score: f32,
	explanation: String,
}

async fn create_memory(
	State(state): State<AppState>,
	Json(payload): Json<CreateRequest>,
) -> Result<Response, ApiError> {
	match state.service.create(payload).await? {
		CreateResponse::Stored { id } => Ok(Json(CreatedBody { id }).into_response()),
		CreateResponse::Rejected { score, explanation } => Ok((
			StatusCode::UNPROCESSABLE_ENTITY,
			Json(RejectedBody {
				error_code: "below_alignment_threshold",
				score,
				explanation,
			}),
		)
			.into_response()),
	}
}

async fn delete_memory(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
	let response = state.service.delete(DeleteRequest { id }).await?;

	Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ProcessParams {
	limit: Option<u32>,
	min_engagement: Option<f32>,
}

async fn process_tweets(
	State(state): State<AppState>,
	Query(params): Query<ProcessParams>,
) -> Result<Json<BatchReport>, ApiError> {
	let request =
		ProcessRequest { limit: params.limit, min_engagement: params.min_engagement };
	let response = state.service.process_tweets(request).await?;

	Ok(Json(response))
}

fn split_tags(raw: Option<&str>) -> Vec<String> {
	let Some(raw) = raw else {
		return Vec::new();
	};

	raw.split(',').map(str::trim).filter(|tag| !tag.is_empty()).map(str::to_string).collect()
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError { status, error_code: code.to_string(), message: message.into() }
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			ServiceError::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "not_found", message),
			ServiceError::Provider { message } =>
				json_error(StatusCode::BAD_GATEWAY, "provider_error", message),
			ServiceError::Storage { message } =>
				json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
