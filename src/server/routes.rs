//! HTTP handlers

use crate::billing::PLANS;
use crate::error::ImaginariumError;
use crate::server::response::{created, ok, ApiError, ApiJson, ApiResult, UserId};
use crate::server::state::AppState;
use crate::services::preview::PreviewSession;
use crate::store::{ImageData, UserRecord};
use crate::transformations::{TransformationConfig, TransformationKind};
use crate::types::{CompositionInputs, ImageAsset, MIN_BLUR};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

fn default_scale() -> f64 {
    1.0
}

fn default_blur() -> u32 {
    MIN_BLUR
}

/// Background-replacement preview request
#[derive(Debug, Deserialize)]
pub struct ComposeRequest {
    pub background: ImageAsset,
    pub subject: ImageAsset,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset_x: i32,
    #[serde(default)]
    pub offset_y: i32,
    #[serde(default)]
    pub subject_brightness: i32,
    #[serde(default)]
    pub background_brightness: i32,
    #[serde(default = "default_blur")]
    pub background_blur: u32,
}

impl ComposeRequest {
    fn into_inputs(self) -> crate::Result<CompositionInputs> {
        CompositionInputs::builder(self.background, self.subject)
            .scale(self.scale)
            .offset(self.offset_x, self.offset_y)
            .subject_brightness(self.subject_brightness)
            .background_brightness(self.background_brightness)
            .background_blur(self.background_blur)
            .build()
    }
}

pub async fn compose(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ComposeRequest>,
) -> ApiResult {
    let inputs = request.into_inputs()?;
    let session = PreviewSession::new(Arc::clone(&state.hosting), Arc::clone(&state.notifier), inputs);
    let preview = session
        .refresh()
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::CONFLICT, "superseded"))?;
    Ok(ok(preview))
}

#[derive(Debug, Deserialize)]
pub struct RemoveBackgroundRequest {
    pub image: ImageAsset,
}

pub async fn remove_background(
    State(state): State<AppState>,
    _user: UserId,
    ApiJson(request): ApiJson<RemoveBackgroundRequest>,
) -> ApiResult {
    let transparent = state.images.remove_background(&request.image).await?;
    Ok(ok(transparent))
}

/// Price as sent by checkout clients: a JSON number or string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Number(f64),
    Text(String),
}

impl Price {
    fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub order_price: Option<Price>,
    pub user_id: Option<String>,
}

pub async fn create_order(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> ApiResult {
    let (Some(price), Some(user_id)) = (
        request.order_price.as_ref().map(Price::as_text),
        request.user_id.filter(|id| !id.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Please provide order_price and user_id"));
    };
    let order = state.billing.create_order(&price, &user_id).await?;
    Ok(ok(serde_json::json!({ "order": order })))
}

#[derive(Debug, Deserialize)]
pub struct CaptureOrderRequest {
    #[serde(rename = "orderID")]
    pub order_id: Option<String>,
}

/// Credits go to the authenticated caller only
pub async fn capture_order(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    ApiJson(request): ApiJson<CaptureOrderRequest>,
) -> ApiResult {
    let Some(order_id) = request.order_id.filter(|id| !id.is_empty()) else {
        return Err(ApiError::bad_request("Please provide orderID"));
    };
    let outcome = state.billing.capture_order(&order_id, &user_id).await?;
    Ok(ok(outcome))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
}

pub async fn list_images(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ApiResult {
    let page = state
        .images
        .get_all_images(query.page.unwrap_or(1), query.limit, query.search.as_deref())
        .await?;
    Ok(ok(page))
}

pub async fn create_image(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    ApiJson(data): ApiJson<ImageData>,
) -> ApiResult {
    let created_image = state.images.add_image(&user_id, data).await?;
    Ok(created(created_image))
}

fn parse_image_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ImaginariumError::invalid_request(format!("'{raw}' is not an image id")).into())
}

pub async fn get_image(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let image = state.images.get_image_by_id(parse_image_id(&id)?).await?;
    Ok(ok(image))
}

pub async fn update_image(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    ApiJson(data): ApiJson<ImageData>,
) -> ApiResult {
    let image = state
        .images
        .update_image(&user_id, parse_image_id(&id)?, data)
        .await?;
    Ok(ok(image))
}

pub async fn delete_image(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> ApiResult {
    let image = state.images.delete_image(&user_id, parse_image_id(&id)?).await?;
    Ok(ok(image))
}

pub async fn user_images(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult {
    let page = state
        .images
        .get_user_images(&user_id, query.page.unwrap_or(1), query.limit)
        .await?;
    Ok(ok(page))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Called by the identity layer when an account is created
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterUserRequest>,
) -> ApiResult {
    if request.id.trim().is_empty() {
        return Err(ApiError::bad_request("id is required"));
    }
    if let Some(existing) = state.store.get_user(&request.id).await? {
        return Ok(ok(existing));
    }
    let user = state
        .store
        .put_user(UserRecord::new(request.id, request.first_name, request.last_name))
        .await?;
    tracing::info!(user_id = %user.id, "User registered");
    Ok(created(user))
}

pub async fn get_user(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult {
    let user = state
        .store
        .get_user(&user_id)
        .await?
        .ok_or_else(|| ImaginariumError::not_found(format!("user {user_id}")))?;
    Ok(ok(user))
}

pub async fn plans() -> ApiResult {
    Ok(ok(PLANS))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationInfo {
    #[serde(rename = "type")]
    pub kind: TransformationKind,
    pub title: &'static str,
    pub sub_title: &'static str,
    pub credit_cost: u32,
    pub config: TransformationConfig,
}

pub async fn transformations() -> ApiResult {
    let catalogue: Vec<TransformationInfo> = TransformationKind::ALL
        .iter()
        .map(|kind| TransformationInfo {
            kind: *kind,
            title: kind.title(),
            sub_title: kind.subtitle(),
            credit_cost: kind.credit_cost(),
            config: kind.default_config(),
        })
        .collect();
    Ok(ok(catalogue))
}
