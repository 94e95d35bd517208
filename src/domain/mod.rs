pub mod listing;
pub mod pricing;
pub mod schema;
pub mod site;
