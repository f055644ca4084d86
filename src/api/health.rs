use axum::Json;

const SERVICE: &str = env!("CARGO_PKG_NAME");

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "service": SERVICE}))
}

pub async fn ready() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ready", "service": SERVICE}))
}
