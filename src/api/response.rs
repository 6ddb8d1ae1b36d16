//! Success envelope and shared query types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::db::Page;

/// `{statusCode, data, message, success}` with the HTTP status mirrored in
/// the body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: status.as_u16() < 400,
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CREATED, data, message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Empty `data` object for responses that carry nothing.
#[derive(Debug, Serialize)]
pub struct Empty {}

/// `?page=&limit=` query parameters. Missing values fall back to page 1 and
/// the default limit.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(Page::DEFAULT_LIMIT),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_fields() {
        let response = ApiResponse::created(serde_json::json!({"a": 1}), "Created");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["statusCode"], 201);
        assert_eq!(json["data"]["a"], 1);
        assert_eq!(json["message"], "Created");
        assert_eq!(json["success"], true);
    }

    #[test]
    fn test_page_query_defaults() {
        assert_eq!(PageQuery::default().page(), Page::new(1, 10));
        let query = PageQuery {
            page: Some(0),
            limit: Some(5),
        };
        assert_eq!(query.page(), Page::new(1, 5));
    }
}
