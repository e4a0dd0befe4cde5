use crate::error::ApiError;
use crate::labels::LabelMap;
use crate::predictor::Predictor;
use crate::store::ModelStatus;
use actix_multipart::Multipart;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use futures_util::future::{ready, Either};
use futures_util::StreamExt;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const INDEX_HTML: &str = include_str!("../static/index.html");

pub struct AppState {
    pub predictor: Arc<Predictor>,
    pub max_upload_bytes: usize,
}

#[derive(Serialize)]
struct DebugReport<'a> {
    #[serde(flatten)]
    model: ModelStatus,
    labels: &'a LabelMap,
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/_model_debug").route(web::get().to(model_debug)))
        .service(
            web::resource("/predict")
                .route(web::post().to(predict))
                .wrap_fn(|req, srv| {
                    let limit = req
                        .app_data::<web::Data<AppState>>()
                        .map(|state| state.max_upload_bytes);
                    match (limit, content_length(&req)) {
                        (Some(limit), Some(len)) if len > limit => {
                            warn!("rejecting {} byte upload (limit {})", len, limit);
                            let res = req.error_response(ApiError::PayloadTooLarge { limit });
                            Either::Left(ready(Ok(res.map_into_right_body())))
                        }
                        _ => {
                            let fut = srv.call(req);
                            Either::Right(async move {
                                fut.await.map(ServiceResponse::map_into_left_body)
                            })
                        }
                    }
                }),
        );
}

fn content_length(req: &ServiceRequest) -> Option<usize> {
    req.headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

pub async fn predict(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let request_id = Uuid::new_v4();
    let started = Instant::now();

    let bytes = read_upload(&mut payload, state.max_upload_bytes)
        .await
        .map_err(|e| {
            warn!("[{}] rejected upload: {}", request_id, e);
            e
        })?;
    debug!("[{}] received {} bytes", request_id, bytes.len());

    // decoding and inference block, keep them off the async workers
    let predictor = Arc::clone(&state.predictor);
    let prediction = web::block(move || predictor.predict_bytes(&bytes))
        .await
        .map_err(|e| ApiError::Inference(e.to_string()))?
        .map_err(|e| {
            warn!("[{}] prediction failed: {} ({})", request_id, e, e.details());
            e
        })?;

    info!(
        "[{}] predicted {} ({:.4}) in {:?}",
        request_id,
        prediction.label,
        prediction.confidence,
        started.elapsed()
    );
    Ok(HttpResponse::Ok().json(prediction))
}

pub async fn model_debug(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(DebugReport {
        model: state.predictor.store.status(),
        labels: &state.predictor.labels,
    })
}

/// Returns the contents of the `file` field, draining any other fields.
async fn read_upload(payload: &mut Multipart, limit: usize) -> Result<Vec<u8>, ApiError> {
    let mut total = 0usize;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| ApiError::Multipart(e.to_string()))?;
        let is_file = field.content_disposition().get_name() == Some("file");

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::Multipart(e.to_string()))?;
            total += chunk.len();
            if total > limit {
                return Err(ApiError::PayloadTooLarge { limit });
            }
            if is_file {
                data.extend_from_slice(&chunk);
            }
        }

        if is_file {
            return Ok(data);
        }
    }

    Err(ApiError::MissingFile)
}
