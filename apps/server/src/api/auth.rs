use super::{ApiJson, ApiResponse, ApiResult, AppState, AuthenticatedAgent};
use axum::{
	extract::State,
	http::StatusCode,
	routing::{get, post},
	Router,
};
use roster_core::domain::{Agent, RegisteredAgent};
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/register", post(register))
		.route("/verify", get(verify))
		.route("/agents", get(agents))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
	#[serde(default)]
	agent_code: String,
	#[serde(default)]
	agent_name: String,
}

async fn register(
	State(state): State<AppState>,
	ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, ApiResponse<RegisteredAgent>)> {
	let registered = state
		.core
		.agents()
		.register(&request.agent_code, &request.agent_name)
		.await?;

	Ok((
		StatusCode::CREATED,
		ApiResponse::data(registered)
			.with_message("Agent registered successfully. Save your API key securely."),
	))
}

async fn verify(AuthenticatedAgent(agent): AuthenticatedAgent) -> ApiResponse<Agent> {
	ApiResponse::data(agent).with_message("API key is valid")
}

async fn agents(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<Agent>>> {
	Ok(ApiResponse::data(state.core.agents().list().await?))
}
