//! HTTP surface over the core: JSON envelopes, error mapping and routing

use axum::{
	extract::State,
	http::{HeaderValue, StatusCode},
	response::{IntoResponse, Response},
	routing::get,
	Json, Router,
};
use chrono::{DateTime, Utc};
use roster_core::{infra::sync::Pagination, Core, Error};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use tracing::{error, warn};

mod auth;
mod contacts;
mod devices;
mod extract;
mod sync;

pub use extract::{ApiJson, ApiQuery, AuthenticatedAgent};

#[derive(Clone)]
pub struct AppState {
	pub core: Arc<Core>,
	started_at: Instant,
}

impl AppState {
	pub fn new(core: Arc<Core>) -> Self {
		Self {
			core,
			started_at: Instant::now(),
		}
	}
}

pub fn router(state: AppState) -> Router {
	let cors = cors_layer(&state.core.config().server.cors_origin);

	Router::new()
		.route("/health", get(health))
		.route("/ws", get(crate::ws::upgrade))
		.nest("/api/auth", auth::routes())
		.nest("/api/contacts", contacts::routes())
		.nest("/api/bulk", contacts::bulk_routes())
		.nest("/api/sync", sync::routes())
		.nest("/api/devices", devices::routes())
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors),
		)
		.with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
	if origin == "*" {
		return CorsLayer::permissive();
	}
	match origin.parse::<HeaderValue>() {
		Ok(origin) => CorsLayer::new()
			.allow_origin(origin)
			.allow_methods(Any)
			.allow_headers(Any),
		Err(_) => {
			warn!(%origin, "Invalid CORS origin, allowing any");
			CorsLayer::permissive()
		}
	}
}

/// Envelope shared by every JSON endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pagination: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
	pub fn data(data: T) -> Self {
		Self {
			success: true,
			data: Some(data),
			message: None,
			pagination: None,
		}
	}

	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}

	pub fn with_pagination(mut self, pagination: Pagination) -> Self {
		self.pagination = Some(pagination);
		self
	}
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
	fn into_response(self) -> Response {
		Json(self).into_response()
	}
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Maps engine errors onto status codes and the error envelope
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
	fn from(error: Error) -> Self {
		Self(error)
	}
}

impl ApiError {
	fn status(&self) -> StatusCode {
		match &self.0 {
			Error::Validation(_) => StatusCode::BAD_REQUEST,
			Error::NotFound { .. } => StatusCode::NOT_FOUND,
			Error::Authentication(_) => StatusCode::UNAUTHORIZED,
			Error::AgentInactive(_) => StatusCode::FORBIDDEN,
			Error::Conflict(_) => StatusCode::CONFLICT,
			Error::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
			Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();
		let body = match &self.0 {
			Error::Validation(details) => json!({
				"success": false,
				"error": "Validation failed",
				"details": details,
			}),
			Error::Storage(e) => {
				error!(error = %e, "Storage failure while serving request");
				json!({ "success": false, "error": "Storage unavailable, retry later" })
			}
			other => json!({ "success": false, "error": other.to_string() }),
		};
		(status, Json(body)).into_response()
	}
}

#[derive(Debug, Serialize)]
struct HealthReport {
	status: &'static str,
	timestamp: DateTime<Utc>,
	uptime_secs: u64,
	current_version: Option<i64>,
	connections: usize,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
	let reachable = state.core.database().ping().await.is_ok();
	let current_version = state.core.current_version().await.ok();
	let healthy = reachable && current_version.is_some();

	let report = HealthReport {
		status: if healthy { "healthy" } else { "unhealthy" },
		timestamp: Utc::now(),
		uptime_secs: state.started_at.elapsed().as_secs(),
		current_version,
		connections: state.core.registry().len(),
	};
	let status = if healthy {
		StatusCode::OK
	} else {
		StatusCode::SERVICE_UNAVAILABLE
	};
	(status, Json(report))
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;
	use axum::body::{to_bytes, Body};
	use axum::http::Request;
	use roster_core::{domain::RegisteredAgent, AppConfig};
	use serde_json::Value;
	use tempfile::TempDir;
	use tower::ServiceExt;

	pub struct TestApp {
		pub state: AppState,
		_dir: TempDir,
	}

	impl TestApp {
		pub async fn new() -> Self {
			let dir = TempDir::new().unwrap();
			let config = AppConfig::default_with_dir(dir.path().to_path_buf());
			let core = Core::with_config(config).await.unwrap();
			Self {
				state: AppState::new(core),
				_dir: dir,
			}
		}

		pub async fn agent(&self, code: &str) -> RegisteredAgent {
			self.state
				.core
				.agents()
				.register(code, &format!("Agent {code}"))
				.await
				.unwrap()
		}

		pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
			let response = router(self.state.clone()).oneshot(request).await.unwrap();
			let status = response.status();
			let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
			let body = if bytes.is_empty() {
				Value::Null
			} else {
				serde_json::from_slice(&bytes).unwrap()
			};
			(status, body)
		}
	}

	pub fn get(uri: &str, api_key: Option<&str>) -> Request<Body> {
		let mut builder = Request::get(uri);
		if let Some(key) = api_key {
			builder = builder.header("x-api-key", key);
		}
		builder.body(Body::empty()).unwrap()
	}

	pub fn send_json(method: &str, uri: &str, api_key: Option<&str>, body: Value) -> Request<Body> {
		let mut builder = Request::builder()
			.method(method)
			.uri(uri)
			.header("content-type", "application/json");
		if let Some(key) = api_key {
			builder = builder.header("authorization", format!("Bearer {key}"));
		}
		builder.body(Body::from(body.to_string())).unwrap()
	}
}
