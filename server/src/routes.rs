//! JSON API

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

use warden::lapi_adapter::{ConnectionHealth, HealthStatus};
use warden_core::{CaptchaSubmission, Resolution, Warden};

use crate::error::ApiResult;
use crate::prelude::*;

pub struct AppState {
	pub warden: Warden,
}

pub type App = Arc<AppState>;

/// Challenge as shown to a client, without its answer
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptchaView {
	pub remediation: Remediation,
	pub inline_image: Box<str>,
	pub resolution_failed: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
	#[serde(default)]
	pub phrase: String,
	#[serde(default, deserialize_with = "deserialize_flag")]
	pub refresh: bool,
	#[serde(default)]
	pub origin: Option<String>,
}

/// Accepts `true`/`false` as well as the form-style `"1"`/`"0"`
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Flag {
		Bool(bool),
		Int(u8),
		Str(String),
	}

	Ok(match Flag::deserialize(deserializer)? {
		Flag::Bool(flag) => flag,
		Flag::Int(n) => n != 0,
		Flag::Str(s) => matches!(s.as_str(), "1" | "true"),
	})
}

async fn get_remediation(State(app): State<App>, Path(ip): Path<String>) -> ApiResult<Json<Resolution>> {
	Ok(Json(app.warden.get_ip_remediation(&ip).await?))
}

async fn post_captcha_refresh(
	State(app): State<App>,
	Path(ip): Path<String>,
) -> ApiResult<Json<CaptchaView>> {
	let flow = app.warden.refresh_captcha_flow(&ip).await?;
	Ok(Json(CaptchaView {
		remediation: Remediation::Captcha,
		inline_image: flow.inline_image,
		resolution_failed: flow.resolution_failed,
	}))
}

async fn post_captcha_submit(
	State(app): State<App>,
	Path(ip): Path<String>,
	Json(req): Json<SubmitRequest>,
) -> ApiResult<Json<CaptchaView>> {
	let submission = CaptchaSubmission {
		ip: ip.into(),
		origin: req.origin.unwrap_or_default().into(),
		user_phrase: req.phrase.into(),
		refresh: req.refresh,
	};
	let outcome = app.warden.handle_captcha_submission(&submission).await?;
	let resolution_failed = outcome.remediation == Remediation::Captcha && !req.refresh;

	Ok(Json(CaptchaView {
		remediation: outcome.remediation,
		inline_image: outcome.inline_image,
		resolution_failed,
	}))
}

async fn get_health(State(app): State<App>) -> (StatusCode, Json<ConnectionHealth>) {
	let health = app.warden.check_connection_health().await;
	let status = match health.status {
		HealthStatus::Ok => StatusCode::OK,
		HealthStatus::Error => StatusCode::SERVICE_UNAVAILABLE,
	};
	(status, Json(health))
}

pub fn init(app: App) -> Router {
	Router::new()
		.route("/v1/remediation/{ip}", get(get_remediation))
		.route("/v1/captcha/{ip}/refresh", post(post_captcha_refresh))
		.route("/v1/captcha/{ip}/submit", post(post_captcha_submit))
		.route("/v1/health", get(get_health))
		.with_state(app)
}

// vim: ts=4
