use std::sync::{Arc, RwLock, RwLockReadGuard};

use actix_web::{HttpResponse, Responder, get, web};

use crate::domain::models::PublishedState;

#[derive(Clone)]
pub struct ApiState {
    pub published: Arc<RwLock<PublishedState>>,
}

impl ApiState {
    fn read(&self) -> Result<RwLockReadGuard<'_, PublishedState>, HttpResponse> {
        self.published.read().map_err(|_| {
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "state lock poisoned"
            }))
        })
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(get_device_endpoint)
        .service(list_sensors_endpoint)
        .service(get_sensor_endpoint)
        .service(get_diagnostics_endpoint);
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/device")]
async fn get_device_endpoint(state: web::Data<ApiState>) -> HttpResponse {
    match state.read() {
        Ok(published) => HttpResponse::Ok().json(&published.device),
        Err(response) => response,
    }
}

#[get("/sensors")]
async fn list_sensors_endpoint(state: web::Data<ApiState>) -> HttpResponse {
    match state.read() {
        Ok(published) => HttpResponse::Ok().json(&published.sensors),
        Err(response) => response,
    }
}

#[get("/sensors/{key}")]
async fn get_sensor_endpoint(state: web::Data<ApiState>, key: web::Path<String>) -> HttpResponse {
    let published = match state.read() {
        Ok(published) => published,
        Err(response) => return response,
    };

    match published.sensors.iter().find(|sensor| sensor.key == *key) {
        Some(sensor) => HttpResponse::Ok().json(sensor),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("unknown sensor: {key}")
        })),
    }
}

#[get("/diagnostics")]
async fn get_diagnostics_endpoint(state: web::Data<ApiState>) -> HttpResponse {
    match state.read() {
        Ok(published) => HttpResponse::Ok().json(&published.diagnostics),
        Err(response) => response,
    }
}
