use std::net::TcpListener;

use actix_files::Files;
use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};

use crate::{
    configuration::{ExtractionSettings, WebDriverSettings},
    domain::site::SiteRegistry,
    routes::{clean_route, default_route, scrape_route, site_route},
    services::{OpenaiClient, Pipeline},
};

pub fn run(
    listener: TcpListener,
    pipeline: Pipeline<OpenaiClient>,
    registry: SiteRegistry,
    webdriver: WebDriverSettings,
    extraction: ExtractionSettings,
) -> Result<Server, std::io::Error> {
    let output_dir = pipeline.sink().output_dir().to_path_buf();
    let pipeline = web::Data::new(pipeline);
    let registry = web::Data::new(registry);
    let webdriver = web::Data::new(webdriver);
    let extraction = web::Data::new(extraction);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(Files::new("/output", &output_dir).prefer_utf8(true))
            .service(default_route::default)
            .service(site_route::list_sites)
            .service(scrape_route::scrape)
            .service(clean_route::clean_raw)
            .app_data(pipeline.clone())
            .app_data(registry.clone())
            .app_data(webdriver.clone())
            .app_data(extraction.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
