//! Local HTTP front end exposing the same `POST /generate` route that API
//! Gateway provides in production.

use crate::{
    error::GenError,
    event::ApiResponse,
    handler::GenerateHandler,
};
use actix_web::{http::StatusCode, web, App, HttpResponse, HttpServer};
use serde_json::{json, Value};

pub async fn run(handler: GenerateHandler, port: u16) -> std::io::Result<()> {
    let handler = web::Data::new(handler);
    log::info!("🌐 Listening on http://0.0.0.0:{}", port);

    HttpServer::new(move || App::new().app_data(handler.clone()).configure(configure))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/generate", web::post().to(generate))
        .route("/health", web::get().to(health));
}

async fn generate(handler: web::Data<GenerateHandler>, body: web::Bytes) -> HttpResponse {
    let response = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => handler.handle_payload(payload).await,
        Err(_) => ApiResponse::from_error(&GenError::InvalidRequest(
            "Invalid JSON in request body".into(),
        )),
    };
    into_http_response(response)
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

fn into_http_response(response: ApiResponse) -> HttpResponse {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status)
        .insert_header(("Access-Control-Allow-Origin", "*"))
        .json(response.body)
}
