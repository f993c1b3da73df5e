//! JSON envelope, error mapping and request extractors

use crate::error::ImaginariumError;
use crate::tracing_config::events;
use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Header the identity layer sets to the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// `{success, message?, data?}` body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }
}

/// 200 with data
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

/// 201 with data
pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::ok(data))).into_response()
}

/// Error response carrying an HTTP status
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthenticated() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            format!("missing {USER_ID_HEADER} header"),
        )
    }
}

/// HTTP status for each error kind
#[must_use]
pub fn status_for(error: &ImaginariumError) -> StatusCode {
    match error {
        ImaginariumError::InvalidDimensions(_)
        | ImaginariumError::InvalidRequest(_)
        | ImaginariumError::Serialization(_) => StatusCode::BAD_REQUEST,
        ImaginariumError::Unauthorized(_) => StatusCode::FORBIDDEN,
        ImaginariumError::NotFound(_) => StatusCode::NOT_FOUND,
        ImaginariumError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
        ImaginariumError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
        ImaginariumError::InvalidConfig(_)
        | ImaginariumError::Io(_)
        | ImaginariumError::Image(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ImaginariumError> for ApiError {
    fn from(error: ImaginariumError) -> Self {
        let status = status_for(&error);
        if status.is_server_error() {
            events::upstream_failure(&error, "request handler");
        }
        Self::new(status, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            message: Some(self.message),
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Handler result
pub type ApiResult = std::result::Result<Response, ApiError>;

/// JSON body whose rejections use the error envelope
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

/// Authenticated user id taken from [`USER_ID_HEADER`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Self(id.to_string()))
            .ok_or_else(ApiError::unauthenticated)
    }
}
