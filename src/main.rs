use std::net::TcpListener;

use dealer_harvest::{
    configuration::get_configuration,
    services::{CostAccountant, OpenaiClient, Pipeline, ResultSink, StructuredExtractor},
    startup::run,
};
use env_logger::Env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration()?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    std::fs::create_dir_all(&configuration.application.output_dir)?;

    let openai_client = OpenaiClient::new(configuration.api_keys.openai.clone());
    let pipeline = Pipeline::new(
        StructuredExtractor::new(openai_client, configuration.extraction.token_budget),
        CostAccountant::new(configuration.pricing_table()),
        ResultSink::new(&configuration.application.output_dir),
    );
    log::info!(
        "Serving {} sites on {}, default model {}",
        configuration.sites.len(),
        address,
        configuration.extraction.default_model
    );

    run(
        listener,
        pipeline,
        configuration.site_registry(),
        configuration.webdriver,
        configuration.extraction,
    )?
    .await?;

    Ok(())
}
