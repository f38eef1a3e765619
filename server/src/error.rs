//! JSON error responses

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::prelude::*;

/// Engine error rendered as an API response
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		Self(err)
	}
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (status, code) = match &self.0 {
			Error::InvalidIp(_) => (StatusCode::BAD_REQUEST, "E-INVALID-IP"),
			Error::ValidationError(_) | Error::InvalidDuration(_) => {
				(StatusCode::BAD_REQUEST, "E-VALIDATION")
			}
			e if e.is_upstream() => (StatusCode::BAD_GATEWAY, "E-UPSTREAM"),
			_ => (StatusCode::INTERNAL_SERVER_ERROR, "E-INTERNAL"),
		};

		let message = if status.is_server_error() {
			error!(error = %self.0, "Request failed");
			"Internal error".to_string()
		} else {
			self.0.to_string()
		};

		let body = serde_json::json!({
			"error": {
				"code": code,
				"message": message,
			}
		});
		(status, Json(body)).into_response()
	}
}

// vim: ts=4
