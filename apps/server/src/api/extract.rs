use super::{ApiError, AppState};
use axum::{
	async_trait,
	extract::{FromRequest, FromRequestParts, Query, Request},
	http::{header::AUTHORIZATION, request::Parts},
	Json,
};
use roster_core::{domain::Agent, Error};
use serde::de::DeserializeOwned;

pub const API_KEY_HEADER: &str = "x-api-key";

/// An active agent resolved from `X-API-Key` or `Authorization: Bearer`
#[derive(Debug, Clone)]
pub struct AuthenticatedAgent(pub Agent);

fn presented_key(parts: &Parts) -> Option<&str> {
	if let Some(key) = parts
		.headers
		.get(API_KEY_HEADER)
		.and_then(|value| value.to_str().ok())
	{
		return Some(key);
	}
	parts
		.headers
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedAgent {
	type Rejection = ApiError;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
		let key = presented_key(parts)
			.ok_or_else(|| Error::Authentication("API key required".to_string()))?;
		let agent = state.core.agents().authenticate(key).await?;
		Ok(Self(agent))
	}
}

/// `Query` whose rejection uses the JSON error envelope
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
	T: DeserializeOwned,
	S: Send + Sync,
{
	type Rejection = ApiError;

	async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
		let Query(value) = Query::<T>::from_request_parts(parts, state)
			.await
			.map_err(|rejection| Error::validation(rejection.body_text()))?;
		Ok(Self(value))
	}
}

/// `Json` whose rejection uses the JSON error envelope
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
	T: DeserializeOwned,
	S: Send + Sync,
{
	type Rejection = ApiError;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		let Json(value) = Json::<T>::from_request(req, state)
			.await
			.map_err(|rejection| Error::validation(rejection.body_text()))?;
		Ok(Self(value))
	}
}
