use super::{ApiQuery, ApiResponse, ApiResult, AppState, AuthenticatedAgent};
use axum::{
	extract::State,
	http::HeaderMap,
	routing::get,
	Router,
};
use roster_core::{
	infra::sync::{SyncRequest, SyncResponse},
	Error,
};
use serde::Deserialize;

pub const DEVICE_ID_HEADER: &str = "x-device-id";

pub fn routes() -> Router<AppState> {
	Router::new().route("/delta", get(delta))
}

#[derive(Debug, Deserialize)]
struct DeltaParams {
	device_id: Option<String>,
	#[serde(default)]
	version: i64,
}

/// Pull everything after `version` for the calling agent's device. The
/// device comes from the query string, falling back to `X-Device-Id`.
async fn delta(
	State(state): State<AppState>,
	AuthenticatedAgent(agent): AuthenticatedAgent,
	headers: HeaderMap,
	ApiQuery(params): ApiQuery<DeltaParams>,
) -> ApiResult<ApiResponse<SyncResponse>> {
	let device_id = params
		.device_id
		.or_else(|| {
			headers
				.get(DEVICE_ID_HEADER)
				.and_then(|value| value.to_str().ok())
				.map(str::to_string)
		})
		.filter(|id| !id.trim().is_empty())
		.ok_or_else(|| Error::validation("device_id is required"))?;

	let response = state
		.core
		.delta()
		.resolve(&SyncRequest {
			device_id,
			agent_code: agent.agent_code,
			last_known_version: params.version,
		})
		.await?;
	Ok(ApiResponse::data(response))
}

#[cfg(test)]
mod tests {
	use super::super::test_support::*;
	use axum::body::Body;
	use axum::http::{Request, StatusCode};
	use roster_core::{domain::NewContact, service::MutationOrigin};

	#[tokio::test]
	async fn test_delta_over_http_records_the_pull() {
		let app = TestApp::new().await;
		let key = app.agent("AG001").await.api_key;
		let contacts = app.state.core.contacts();
		let origin = MutationOrigin::agent("AG001");
		let jane = contacts.create(NewContact::new("Jane", "Doe"), &origin).await.unwrap();
		contacts.delete(jane.id, &origin).await.unwrap();

		let (status, body) = app
			.send(get("/api/sync/delta?device_id=phone-1&version=0", Some(&key)))
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["data"]["current_version"], 2);
		assert_eq!(body["data"]["has_more"], false);
		assert_eq!(body["data"]["changes"][0]["action"], "DELETE");

		let entry = app
			.state
			.core
			.ledger()
			.get("phone-1", "AG001")
			.await
			.unwrap()
			.unwrap();
		assert_eq!(entry.last_sync_version, 2);
	}

	#[tokio::test]
	async fn test_device_id_header_and_missing_device() {
		let app = TestApp::new().await;
		let key = app.agent("AG001").await.api_key;

		let request = Request::get("/api/sync/delta?version=0")
			.header("x-api-key", key.as_str())
			.header("x-device-id", "tablet-9")
			.body(Body::empty())
			.unwrap();
		let (status, _) = app.send(request).await;
		assert_eq!(status, StatusCode::OK);
		assert!(app
			.state
			.core
			.ledger()
			.get("tablet-9", "AG001")
			.await
			.unwrap()
			.is_some());

		let (status, _) = app.send(get("/api/sync/delta?version=0", Some(&key))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let (status, _) = app
			.send(get("/api/sync/delta?device_id=d&version=-1", Some(&key)))
			.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}
}
