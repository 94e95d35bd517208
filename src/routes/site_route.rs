use actix_web::{get, web, HttpResponse};
use serde::Serialize;

use crate::domain::site::SiteRegistry;

#[derive(Debug, Serialize, PartialEq)]
struct SiteSummary<'a> {
    key: &'a str,
    url: &'a str,
    fields: &'a [String],
    adapter: &'static str,
}

fn summarize(registry: &SiteRegistry) -> Vec<SiteSummary<'_>> {
    registry
        .list()
        .map(|(key, entry)| SiteSummary {
            key,
            url: &entry.url,
            fields: &entry.fields,
            adapter: entry.adapter.kind(),
        })
        .collect()
}

#[get("/sites")]
pub async fn list_sites(registry: web::Data<SiteRegistry>) -> HttpResponse {
    HttpResponse::Ok().json(summarize(&registry))
}
