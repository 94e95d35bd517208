use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::{
    domain::{
        pricing::{PriceSettings, PricingTable},
        site::{SiteEntry, SiteRegistry},
    },
    services::DEFAULT_TOKEN_BUDGET,
};

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub api_keys: ApiKeys,
    pub webdriver: WebDriverSettings,
    pub extraction: ExtractionSettings,
    #[serde(default)]
    pub pricing: HashMap<String, PriceSettings>,
    #[serde(default)]
    pub sites: BTreeMap<String, SiteEntry>,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub output_dir: String,
}

#[derive(Deserialize, Clone)]
pub struct ApiKeys {
    pub openai: String,
}

#[derive(Deserialize, Clone)]
pub struct WebDriverSettings {
    pub url: String,
    pub headless: bool,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub window_width: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub window_height: u32,
}

#[derive(Deserialize, Clone)]
pub struct ExtractionSettings {
    pub default_model: String,
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
}

fn default_token_budget() -> usize {
    DEFAULT_TOKEN_BUDGET
}

impl Settings {
    pub fn pricing_table(&self) -> PricingTable {
        PricingTable::default().with_overrides(&self.pricing)
    }

    pub fn site_registry(&self) -> SiteRegistry {
        SiteRegistry::new(self.sites.clone())
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment = Environment::try_from(
        std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "local".into()),
    )
    .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // e.g. `APP_API_KEYS__OPENAI=sk-...` sets `Settings.api_keys.openai`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}
