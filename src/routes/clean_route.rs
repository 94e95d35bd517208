use actix_web::{post, web, HttpResponse};
use serde_json::json;

use crate::services::{OpenaiClient, Pipeline, RunTimestamp};

#[post("/raw/{timestamp}/clean")]
pub async fn clean_raw(
    path: web::Path<String>,
    pipeline: web::Data<Pipeline<OpenaiClient>>,
) -> HttpResponse {
    let Some(timestamp) = RunTimestamp::parse(&path) else {
        return HttpResponse::BadRequest()
            .json(json!({ "error": format!("invalid run timestamp \"{}\"", path) }));
    };

    let sink = pipeline.sink();
    let raw_path = sink.raw_path(&timestamp);
    if !raw_path.exists() {
        return HttpResponse::NotFound()
            .json(json!({ "error": format!("no raw data for run {}", timestamp) }));
    }

    match sink.strip_urls(&raw_path) {
        Ok((cleaned_path, cleaned)) => HttpResponse::Ok().json(json!({
            "path": cleaned_path,
            "text": cleaned,
        })),
        Err(e) => {
            log::error!("Failed to clean {}: {}", raw_path.display(), e);
            HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
        }
    }
}
