//! HTTP error responses for the asset routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::service::AssetError;

/// JSON body returned on error.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
}

impl IntoResponse for AssetError {
    fn into_response(self) -> Response {
        let status = match &self {
            AssetError::NotFound(_) => StatusCode::NOT_FOUND,
            AssetError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AssetError::SettingsWriteFailed | AssetError::Io { .. } | AssetError::Task(_) => {
                error!("❌ {self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            error: self.to_string(),
            code: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}
