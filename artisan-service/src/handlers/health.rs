use crate::startup::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use service_core::error::AppError;

pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "message": "Artisan catalog API is running",
        "gemini_loaded": state.storyteller.is_configured(),
        "static_mounted": true,
        "backend_origin": state.config.public.backend_origin,
    }))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, label) = match state.catalog.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (
        status,
        Json(json!({
            "status": label,
            "service": "artisan-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

pub async fn readiness_check(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state
        .catalog
        .health_check()
        .await
        .map_err(|_| AppError::ServiceUnavailable)?;
    Ok(Json(json!({ "status": "ready" })))
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        service_core::observability::render_metrics(),
    )
}

/// Reports whether a GenAI key is configured and the provider accepts it.
pub async fn check_gemini(State(state): State<AppState>) -> impl IntoResponse {
    let key_present = state.config.genai.key_present();

    let (client_init_ok, client_error) = match state.storyteller.provider() {
        Some(provider) => match provider.health_check().await {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        },
        None if key_present => (false, Some("GenAI client not initialized".to_string())),
        None => (false, None),
    };

    Json(json!({
        "key_present": key_present,
        "client_init_ok": client_init_ok,
        "client_error": client_error,
    }))
}
