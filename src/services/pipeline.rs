use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::domain::{
    listing::{HarvestBatch, HarvestSummary},
    pricing::UsageReport,
    schema::{build_container_schema, build_record_schema, ExtractionResult, SchemaError},
    site::{ResolvedSite, SiteError},
};

use super::{
    normalize, CostAccountant, CostError, ExtractionError, Harvest, HarvestError, Page,
    PersistenceError, ResultSink, RunTimestamp, SiteAdapter, StructuredArtifacts,
    StructuredCompletion, StructuredExtractor,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Site(#[from] SiteError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("failed to start browser session: {0}")]
    Session(String),
    #[error(transparent)]
    Harvest(#[from] HarvestError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Cost(#[from] CostError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug)]
pub struct PipelineRequest {
    pub site: ResolvedSite,
    pub fields: Vec<String>,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct Artifacts {
    pub raw: PathBuf,
    #[serde(flatten)]
    pub structured: StructuredArtifacts,
}

#[derive(Debug, Serialize)]
pub struct PipelineOutput {
    pub timestamp: RunTimestamp,
    pub records: ExtractionResult,
    pub normalized_text: String,
    pub usage: UsageReport,
    pub harvest: HarvestSummary,
    pub artifacts: Artifacts,
}

pub struct Pipeline<C> {
    extractor: StructuredExtractor<C>,
    accountant: CostAccountant,
    sink: ResultSink,
}

impl<C: StructuredCompletion> Pipeline<C> {
    pub fn new(extractor: StructuredExtractor<C>, accountant: CostAccountant, sink: ResultSink) -> Self {
        Pipeline {
            extractor,
            accountant,
            sink,
        }
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    pub fn accountant(&self) -> &CostAccountant {
        &self.accountant
    }

    /// Harvests the site with `page`, which is always released, then
    /// normalizes, extracts, prices and persists the batch.
    pub async fn run<P: Page>(
        &self,
        page: P,
        request: &PipelineRequest,
    ) -> Result<PipelineOutput, PipelineError> {
        let timestamp = RunTimestamp::now();
        log::info!(
            "Run {}: harvesting {} ({}) with {}",
            timestamp,
            request.site.key,
            request.site.url,
            request.site.adapter.kind()
        );

        let batch = harvest_and_release(page, &request.site).await?;

        let normalized_text = normalize(&batch.concatenate());
        let (timestamp, raw) = self.sink.save_raw(&normalized_text, &timestamp)?;

        let record_schema = build_record_schema(request.fields.iter().cloned())?;
        let container = build_container_schema(&record_schema);

        let extraction = self
            .extractor
            .extract(&normalized_text, &container, &request.model)
            .await?;

        let usage = self.accountant.estimate_cost(
            &extraction.input_text,
            &extraction.output_text,
            &request.model,
        )?;
        log::info!(
            "Run {}: {} input tokens, {} output tokens, total cost ${}",
            timestamp,
            usage.input_token_count,
            usage.output_token_count,
            usage.total_cost
        );

        let structured = self
            .sink
            .save_structured(&extraction.result, &record_schema, &timestamp)?;

        Ok(PipelineOutput {
            timestamp,
            records: extraction.result,
            normalized_text,
            usage,
            harvest: batch.summary(),
            artifacts: Artifacts { raw, structured },
        })
    }
}

async fn harvest_and_release<P: Page>(
    page: P,
    site: &ResolvedSite,
) -> Result<HarvestBatch, HarvestError> {
    let adapter = SiteAdapter::from_spec(&site.adapter, site.pacing);
    let outcome = adapter.harvest(&page, &site.url).await;

    if let Err(e) = page.quit().await {
        log::error!("Failed to close browser session: {}", e);
    }

    outcome
}
