pub mod clean_route;
pub mod default_route;
pub mod scrape_route;
pub mod site_route;
