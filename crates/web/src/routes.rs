//! HTTP API routes
//!
//! Two surfaces share one router:
//! - Device-facing endpoints, authenticated per-request by the device
//!   credential (no session).
//! - Operator endpoints. Password/session handling lives in a fronting auth
//!   layer; it forwards the authenticated username in
//!   `x-authenticated-operator` and, when configured, proves itself with a
//!   shared gateway secret.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use esignage_common::{Database, Device, Error, GlobalDefaults, Operator, MAX_MESSAGE_LEN};

use crate::config::ServerConfig;
use crate::configuration::ConfigurationService;
use crate::image::ImageBuilder;
use crate::provision::ProvisioningService;

/// Shared API state
pub struct AppState {
    pub db: Database,
    pub provisioning: ProvisioningService,
    pub configuration: ConfigurationService,
    pub images: ImageBuilder,
    pub gateway_token: Option<String>,
    pub seed_defaults: GlobalDefaults,
}

impl AppState {
    pub fn new(db: Database, cfg: &ServerConfig) -> Self {
        Self {
            provisioning: ProvisioningService::new(db.clone(), cfg.seed_defaults.clone()),
            configuration: ConfigurationService::new(db.clone(), cfg.seed_defaults.clone()),
            images: ImageBuilder::new(cfg.image.clone()),
            gateway_token: cfg.gateway_token.clone(),
            seed_defaults: cfg.seed_defaults.clone(),
            db,
        }
    }
}

/// Build the API router
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Device-facing
        .route("/api/config/:device_id", get(device_config_handler))
        .route("/api/setup/confirm", post(confirm_registration_handler))
        // Operator-facing
        .route("/api/setup", get(setup_handler))
        .route("/esp-web/config.bin", get(config_image_handler))
        .route(
            "/api/devices",
            get(list_devices_handler).post(create_device_handler),
        )
        .route(
            "/api/devices/:device_id",
            put(update_device_handler).delete(delete_device_handler),
        )
        .route("/api/devices/:device_id/messages", post(add_message_handler))
        .route(
            "/api/devices/:device_id/messages/:message_id",
            delete(delete_message_handler),
        )
        .route(
            "/api/settings",
            get(get_settings_handler).put(update_settings_handler),
        )
        .route("/healthz", get(health_handler))
        .with_state(state)
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmRegistrationRequest {
    registration_token: String,
}

#[derive(Debug, Deserialize)]
struct CreateDeviceRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateDeviceRequest {
    name: String,
    update_interval_seconds: u32,
    rotate_interval_seconds: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMessageRequest {
    text: String,
    #[serde(default = "default_font_size")]
    font_size: i32,
    #[serde(default)]
    scroll: bool,
}

fn default_font_size() -> i32 {
    1
}

// ============================================================================
// Helpers
// ============================================================================

fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Unauthorized => StatusCode::UNAUTHORIZED,
        Error::ValidationFailed(_) => StatusCode::BAD_REQUEST,
        Error::ImageBuildFailed(_) | Error::Timeout { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", err);
    }
    error_json(status, &err.to_string())
}

/// The username the fronting auth layer injected, after checking the gateway
/// secret when one is configured.
fn authenticated_username(state: &AppState, headers: &HeaderMap) -> Result<String, Response> {
    if let Some(expected) = &state.gateway_token {
        let presented = headers
            .get("x-esignage-gateway-token")
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return Err(error_json(StatusCode::UNAUTHORIZED, "Unauthorized"));
        }
    }

    headers
        .get("x-authenticated-operator")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| error_json(StatusCode::UNAUTHORIZED, "Unauthorized"))
}

/// Resolve the injected username to an operator record.
fn require_operator(state: &AppState, headers: &HeaderMap) -> Result<Operator, Response> {
    let username = authenticated_username(state, headers)?;
    match state.db.operator_by_username(&username) {
        Ok(Some(op)) => Ok(op),
        Ok(None) => Err(error_json(
            StatusCode::NOT_FOUND,
            &format!("Operator not found: {}", username),
        )),
        Err(e) => Err(error_response(e)),
    }
}

/// Look up a device and verify the operator owns it.
fn owned_device(state: &AppState, operator: &Operator, device_id: i64) -> Result<Device, Response> {
    match state.db.device(device_id) {
        Ok(Some(d)) if d.owner_id == operator.id => Ok(d),
        Ok(Some(_)) => Err(error_json(StatusCode::FORBIDDEN, "Access denied")),
        Ok(None) => Err(error_json(StatusCode::NOT_FOUND, "Device not found")),
        Err(e) => Err(error_response(e)),
    }
}

// ============================================================================
// Core handlers
// ============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "esignage-web",
        "version": esignage_common::VERSION,
    }))
}

async fn setup_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let username = match authenticated_username(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match state.provisioning.provision(&username) {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn device_config_handler(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let presented = headers
        .get("x-device-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let payload = match state.configuration.configuration(device_id, presented) {
        Ok(p) => p,
        Err(e) => return error_response(e),
    };

    let body = match serde_json::to_vec(&payload) {
        Ok(b) => b,
        Err(e) => return error_response(e.into()),
    };

    // Served as a named attachment so a browser download drops straight
    // into the flasher workflow.
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"esignagep32-config.json\"",
        )
        .body(Body::from(body))
        .unwrap()
        .into_response()
}

async fn confirm_registration_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfirmRegistrationRequest>,
) -> Response {
    match state
        .provisioning
        .confirm_registration(&req.registration_token)
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "registered" })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn config_image_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let username = match authenticated_username(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let payload = match state.provisioning.provision(&username) {
        Ok(p) => p,
        Err(e) => return error_response(e),
    };

    match state.images.build(&payload).await {
        Ok(bytes) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"config.bin\"",
            )
            .body(Body::from(bytes))
            .unwrap()
            .into_response(),
        Err(e) => {
            error!("Image build for device {} failed: {}", payload.device_id, e);
            error_response(e)
        }
    }
}

// ============================================================================
// Operator CRUD handlers
// ============================================================================

async fn list_devices_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let operator = match require_operator(&state, &headers) {
        Ok(op) => op,
        Err(resp) => return resp,
    };

    match state.db.devices_for_operator(operator.id) {
        Ok(devices) => (
            StatusCode::OK,
            Json(serde_json::json!({ "devices": devices })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_device_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateDeviceRequest>,
) -> Response {
    let operator = match require_operator(&state, &headers) {
        Ok(op) => op,
        Err(resp) => return resp,
    };

    if req.name.trim().is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "Name is required");
    }

    match state.db.create_device(
        operator.id,
        req.name.trim(),
        &esignage_common::token::new_opaque_token(),
    ) {
        Ok(device) => (StatusCode::CREATED, Json(device)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn update_device_handler(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<UpdateDeviceRequest>,
) -> Response {
    let operator = match require_operator(&state, &headers) {
        Ok(op) => op,
        Err(resp) => return resp,
    };
    let device = match owned_device(&state, &operator, device_id) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    if req.name.trim().is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "Name is required");
    }
    if req.update_interval_seconds == 0 || req.rotate_interval_seconds == 0 {
        return error_response(Error::ValidationFailed(
            "intervals must be positive".to_string(),
        ));
    }

    match state.db.update_device_settings(
        device.id,
        req.name.trim(),
        req.update_interval_seconds,
        req.rotate_interval_seconds,
    ) {
        Ok(true) => match state.db.device(device.id) {
            Ok(Some(updated)) => (StatusCode::OK, Json(updated)).into_response(),
            Ok(None) => error_json(StatusCode::NOT_FOUND, "Device not found"),
            Err(e) => error_response(e),
        },
        Ok(false) => error_json(StatusCode::NOT_FOUND, "Device not found"),
        Err(e) => error_response(e),
    }
}

async fn delete_device_handler(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let operator = match require_operator(&state, &headers) {
        Ok(op) => op,
        Err(resp) => return resp,
    };
    let device = match owned_device(&state, &operator, device_id) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    match state.db.delete_device(device.id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_json(StatusCode::NOT_FOUND, "Device not found"),
        Err(e) => error_response(e),
    }
}

async fn add_message_handler(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<AddMessageRequest>,
) -> Response {
    let operator = match require_operator(&state, &headers) {
        Ok(op) => op,
        Err(resp) => return resp,
    };
    let device = match owned_device(&state, &operator, device_id) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    if req.text.chars().count() > MAX_MESSAGE_LEN {
        return error_response(Error::ValidationFailed(format!(
            "message text exceeds {} characters",
            MAX_MESSAGE_LEN
        )));
    }

    match state
        .db
        .add_message(device.id, &req.text, req.font_size, req.scroll)
    {
        Ok(message) => (StatusCode::CREATED, Json(message)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_message_handler(
    State(state): State<Arc<AppState>>,
    Path((device_id, message_id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Response {
    let operator = match require_operator(&state, &headers) {
        Ok(op) => op,
        Err(resp) => return resp,
    };
    let device = match owned_device(&state, &operator, device_id) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    match state.db.delete_message(device.id, message_id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_json(StatusCode::NOT_FOUND, "Message not found"),
        Err(e) => error_response(e),
    }
}

async fn get_settings_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(resp) = require_operator(&state, &headers) {
        return resp;
    }

    match state.db.global_defaults(&state.seed_defaults) {
        Ok(defaults) => (StatusCode::OK, Json(defaults)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(defaults): Json<GlobalDefaults>,
) -> Response {
    if let Err(resp) = require_operator(&state, &headers) {
        return resp;
    }

    match state.db.update_global_defaults(&defaults) {
        Ok(()) => (StatusCode::OK, Json(defaults)).into_response(),
        Err(e) => error_response(e),
    }
}
