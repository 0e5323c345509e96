use super::{ApiJson, ApiQuery, ApiResponse, ApiResult, AppState, AuthenticatedAgent};
use axum::{
	extract::{Path, State},
	http::{header, StatusCode},
	response::{IntoResponse, Response},
	routing::{get, post},
	Json, Router,
};
use chrono::{DateTime, Utc};
use roster_core::{
	domain::{Contact, ContactPatch, NewContact},
	infra::sync::{ContactQuery, ContactStats},
	service::{BulkImportReport, MutationOrigin},
	Error,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/", get(list).post(create))
		.route("/stats", get(stats))
		.route("/:id", get(fetch).put(update).delete(remove))
}

pub fn bulk_routes() -> Router<AppState> {
	Router::new()
		.route("/import", post(bulk_import))
		.route("/export", get(bulk_export))
}

async fn list(
	State(state): State<AppState>,
	_agent: AuthenticatedAgent,
	ApiQuery(query): ApiQuery<ContactQuery>,
) -> ApiResult<ApiResponse<Vec<Contact>>> {
	let page = state.core.contacts().search(&query).await?;
	Ok(ApiResponse::data(page.data).with_pagination(page.pagination))
}

async fn stats(
	State(state): State<AppState>,
	_agent: AuthenticatedAgent,
) -> ApiResult<ApiResponse<ContactStats>> {
	Ok(ApiResponse::data(state.core.contacts().stats().await?))
}

async fn fetch(
	State(state): State<AppState>,
	_agent: AuthenticatedAgent,
	Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Contact>> {
	Ok(ApiResponse::data(state.core.contacts().get(id).await?))
}

async fn create(
	State(state): State<AppState>,
	AuthenticatedAgent(agent): AuthenticatedAgent,
	ApiJson(fields): ApiJson<NewContact>,
) -> ApiResult<(StatusCode, ApiResponse<Contact>)> {
	let contact = state
		.core
		.contacts()
		.create(fields, &MutationOrigin::agent(agent.agent_code))
		.await?;
	Ok((
		StatusCode::CREATED,
		ApiResponse::data(contact).with_message("Contact created successfully"),
	))
}

async fn update(
	State(state): State<AppState>,
	AuthenticatedAgent(agent): AuthenticatedAgent,
	Path(id): Path<Uuid>,
	ApiJson(patch): ApiJson<ContactPatch>,
) -> ApiResult<ApiResponse<Contact>> {
	let contact = state
		.core
		.contacts()
		.update(id, patch, &MutationOrigin::agent(agent.agent_code))
		.await?;
	Ok(ApiResponse::data(contact).with_message("Contact updated successfully"))
}

#[derive(Debug, Serialize)]
struct Deleted {
	id: Uuid,
	version: i64,
}

async fn remove(
	State(state): State<AppState>,
	AuthenticatedAgent(agent): AuthenticatedAgent,
	Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Deleted>> {
	let tombstone = state
		.core
		.contacts()
		.delete(id, &MutationOrigin::agent(agent.agent_code))
		.await?;
	Ok(ApiResponse::data(Deleted {
		id: tombstone.id,
		version: tombstone.version,
	})
	.with_message("Contact deleted successfully"))
}

/// Either `{"contacts": [...]}` or a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BulkImportBody {
	Wrapped { contacts: Vec<NewContact> },
	Rows(Vec<NewContact>),
}

async fn bulk_import(
	State(state): State<AppState>,
	AuthenticatedAgent(agent): AuthenticatedAgent,
	ApiJson(body): ApiJson<BulkImportBody>,
) -> ApiResult<ApiResponse<BulkImportReport>> {
	let rows = match body {
		BulkImportBody::Wrapped { contacts } => contacts,
		BulkImportBody::Rows(rows) => rows,
	};
	let report = state
		.core
		.contacts()
		.bulk_import(rows, &MutationOrigin::agent(agent.agent_code))
		.await?;
	let message = format!(
		"Bulk import completed. {} successful, {} failed",
		report.success, report.failed
	);
	Ok(ApiResponse::data(report).with_message(message))
}

/// Search filters plus the output format; paging does not apply
#[derive(Debug, Deserialize)]
struct ExportParams {
	format: Option<String>,
	query: Option<String>,
	agent_code: Option<String>,
	created_after: Option<DateTime<Utc>>,
	created_before: Option<DateTime<Utc>>,
}

impl ExportParams {
	fn filters(self) -> ContactQuery {
		ContactQuery {
			query: self.query,
			agent_code: self.agent_code,
			created_after: self.created_after,
			created_before: self.created_before,
			..Default::default()
		}
	}
}

async fn bulk_export(
	State(state): State<AppState>,
	_agent: AuthenticatedAgent,
	ApiQuery(params): ApiQuery<ExportParams>,
) -> ApiResult<Response> {
	match params.format.as_deref() {
		None | Some("json") => {}
		Some(other) => {
			return Err(Error::validation(format!("Unsupported export format '{other}'")).into())
		}
	}

	let contacts = state.core.contacts().export(&params.filters()).await?;
	let body = json!({
		"success": true,
		"total": contacts.len(),
		"data": contacts,
	});
	Ok((
		[(
			header::CONTENT_DISPOSITION,
			"attachment; filename=contacts.json",
		)],
		Json(body),
	)
		.into_response())
}

#[cfg(test)]
mod tests {
	use super::super::test_support::*;
	use axum::http::StatusCode;
	use serde_json::json;

	#[tokio::test]
	async fn test_contact_lifecycle_over_http() {
		let app = TestApp::new().await;
		let key = app.agent("AG001").await.api_key;

		let (status, created) = app
			.send(send_json(
				"POST",
				"/api/contacts",
				Some(&key),
				json!({ "first_name": "Jane", "last_name": "Doe", "phone_primary": "555-123-4567" }),
			))
			.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(created["data"]["version"], 1);
		assert_eq!(created["data"]["created_by"], "AG001");
		let id = created["data"]["id"].as_str().unwrap().to_string();

		let (status, updated) = app
			.send(send_json(
				"PUT",
				&format!("/api/contacts/{id}"),
				Some(&key),
				json!({ "phone_primary": null }),
			))
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(updated["data"]["version"], 2);
		assert!(updated["data"]["phone_primary"].is_null());

		let (status, deleted) = app
			.send(send_json("DELETE", &format!("/api/contacts/{id}"), Some(&key), json!({})))
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(deleted["data"]["version"], 3);

		let (status, _) = app.send(get(&format!("/api/contacts/{id}"), Some(&key))).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_invalid_contact_is_400_with_details() {
		let app = TestApp::new().await;
		let key = app.agent("AG001").await.api_key;

		let (status, body) = app
			.send(send_json(
				"POST",
				"/api/contacts",
				Some(&key),
				json!({ "first_name": "", "last_name": "Doe", "phone_primary": "12" }),
			))
			.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["details"].as_array().unwrap().len(), 2);
		assert_eq!(app.state.core.current_version().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_list_paginates_and_bulk_round_trip() {
		let app = TestApp::new().await;
		let key = app.agent("AG001").await.api_key;

		let (status, imported) = app
			.send(send_json(
				"POST",
				"/api/bulk/import",
				Some(&key),
				json!({ "contacts": [
					{ "first_name": "Jane", "last_name": "Doe" },
					{ "first_name": "", "last_name": "Broken" },
					{ "first_name": "John", "last_name": "Roe" },
				]}),
			))
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(imported["data"]["success"], 2);
		assert_eq!(imported["data"]["failed"], 1);
		assert_eq!(imported["message"], "Bulk import completed. 2 successful, 1 failed");

		let (status, page) = app
			.send(get("/api/contacts?limit=1&page=2&sort_by=version&sort_order=asc", Some(&key)))
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(page["data"][0]["first_name"], "John");
		assert_eq!(page["pagination"]["total"], 2);
		assert_eq!(page["pagination"]["total_pages"], 2);

		let (status, export) = app.send(get("/api/bulk/export", Some(&key))).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(export["total"], 2);

		let (status, export) = app
			.send(get("/api/bulk/export?format=json&query=roe", Some(&key)))
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(export["total"], 1);
		assert_eq!(export["data"][0]["first_name"], "John");

		let (status, body) = app
			.send(get("/api/contacts?page=18446744073709551615", Some(&key)))
			.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["success"], false);

		let (status, _) = app.send(get("/api/bulk/export?format=xml", Some(&key))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}
}
