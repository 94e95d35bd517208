use actix_web::{http::StatusCode, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{
    configuration::{ExtractionSettings, WebDriverSettings},
    domain::{
        pricing::PricingTable,
        schema::FieldSpec,
        site::{ResolvedSite, SiteError, SiteRegistry},
    },
    services::{CostError, Droid, OpenaiClient, Pipeline, PipelineError, PipelineRequest},
};

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeBody {
    site_key: Option<String>,
    url: Option<String>,
    fields: Option<Vec<String>>,
    model: Option<String>,
}

#[post("/scrape")]
pub async fn scrape(
    body: web::Json<ScrapeBody>,
    pipeline: web::Data<Pipeline<OpenaiClient>>,
    registry: web::Data<SiteRegistry>,
    webdriver: web::Data<WebDriverSettings>,
    extraction: web::Data<ExtractionSettings>,
) -> HttpResponse {
    let request = match build_request(
        body.into_inner(),
        &registry,
        &extraction.default_model,
        pipeline.accountant().pricing(),
    ) {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    let droid = match Droid::new(&webdriver).await {
        Ok(droid) => droid,
        Err(e) => return error_response(&PipelineError::Session(e.to_string())),
    };

    match pipeline.run(droid, &request).await {
        Ok(output) => HttpResponse::Ok().json(output),
        Err(e) => {
            log::error!("Scrape of {} failed: {}", request.site.key, e);
            error_response(&e)
        }
    }
}

/// Everything that can be rejected without a browser is rejected here.
fn build_request(
    body: ScrapeBody,
    registry: &SiteRegistry,
    default_model: &str,
    pricing: &PricingTable,
) -> Result<PipelineRequest, PipelineError> {
    let site = match (body.site_key, body.url) {
        (Some(key), _) => registry.resolve(&key)?,
        (None, Some(url)) => ResolvedSite::custom(&url)?,
        (None, None) => return Err(SiteError::MissingUrl("custom".to_string()).into()),
    };

    let fields = body.fields.unwrap_or_else(|| site.default_fields.clone());
    FieldSpec::new(fields.iter())?;

    let model = body.model.unwrap_or_else(|| default_model.to_string());
    if pricing.get(&model).is_none() {
        return Err(CostError::UnknownModel { model }.into());
    }

    Ok(PipelineRequest {
        site,
        fields,
        model,
    })
}

fn status_of(e: &PipelineError) -> StatusCode {
    match e {
        PipelineError::Site(_)
        | PipelineError::Schema(_)
        | PipelineError::Cost(CostError::UnknownModel { .. }) => StatusCode::BAD_REQUEST,
        PipelineError::Session(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: &PipelineError) -> HttpResponse {
    HttpResponse::build(status_of(e)).json(json!({ "error": e.to_string() }))
}
