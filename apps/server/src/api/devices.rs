use super::{ApiQuery, ApiResponse, ApiResult, AppState};
use axum::{
	extract::{Path, State},
	routing::get,
	Router,
};
use roster_core::domain::{DeviceStatus, HealthSummary, SyncStatistics};
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/", get(all))
		.route("/agent/:agent_code", get(by_agent))
		.route("/outdated", get(outdated))
		.route("/health", get(health))
		.route("/stats", get(stats))
}

#[derive(Debug, Deserialize)]
struct ThresholdParams {
	threshold: Option<i64>,
}

async fn all(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<DeviceStatus>>> {
	Ok(ApiResponse::data(state.core.devices().all_device_status().await?))
}

async fn by_agent(
	State(state): State<AppState>,
	Path(agent_code): Path<String>,
) -> ApiResult<ApiResponse<Vec<DeviceStatus>>> {
	Ok(ApiResponse::data(
		state.core.devices().device_status_by_agent(&agent_code).await?,
	))
}

async fn outdated(
	State(state): State<AppState>,
	ApiQuery(params): ApiQuery<ThresholdParams>,
) -> ApiResult<ApiResponse<Vec<DeviceStatus>>> {
	Ok(ApiResponse::data(
		state.core.devices().outdated_devices(params.threshold).await?,
	))
}

async fn health(
	State(state): State<AppState>,
	ApiQuery(params): ApiQuery<ThresholdParams>,
) -> ApiResult<ApiResponse<HealthSummary>> {
	Ok(ApiResponse::data(
		state.core.devices().health_summary(params.threshold).await?,
	))
}

async fn stats(State(state): State<AppState>) -> ApiResult<ApiResponse<SyncStatistics>> {
	Ok(ApiResponse::data(state.core.devices().sync_statistics().await?))
}

#[cfg(test)]
mod tests {
	use super::super::test_support::*;
	use axum::http::StatusCode;
	use roster_core::{domain::NewContact, infra::sync::SyncRequest, service::MutationOrigin};

	#[tokio::test]
	async fn test_device_views_over_http() {
		let app = TestApp::new().await;
		app.agent("AG001").await;
		let core = &app.state.core;

		core.delta()
			.resolve(&SyncRequest {
				device_id: "phone-1".into(),
				agent_code: "AG001".into(),
				last_known_version: 0,
			})
			.await
			.unwrap();
		for i in 0..3 {
			core.contacts()
				.create(
					NewContact::new(format!("Row{i}"), "Seed"),
					&MutationOrigin::agent("AG001"),
				)
				.await
				.unwrap();
		}

		let (status, body) = app.send(get("/api/devices", None)).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["data"][0]["versions_behind"], 3);

		let (_, body) = app.send(get("/api/devices/agent/AG001", None)).await;
		assert_eq!(body["data"].as_array().unwrap().len(), 1);

		let (_, body) = app.send(get("/api/devices/outdated?threshold=2", None)).await;
		assert_eq!(body["data"].as_array().unwrap().len(), 1);
		let (_, body) = app.send(get("/api/devices/outdated?threshold=3", None)).await;
		assert!(body["data"].as_array().unwrap().is_empty());

		let (_, body) = app.send(get("/api/devices/health?threshold=2", None)).await;
		assert_eq!(body["data"]["outdated"], 1);
		assert_eq!(body["data"]["total_devices"], 1);

		let (_, body) = app.send(get("/api/devices/stats", None)).await;
		assert_eq!(body["data"]["current_version"], 3);
	}
}
