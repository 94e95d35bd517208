use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const PER_MILLION: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingEntry {
    pub input_per_token: Decimal,
    pub output_per_token: Decimal,
}

impl PricingEntry {
    pub fn per_million(input: Decimal, output: Decimal) -> Self {
        PricingEntry {
            input_per_token: input / Decimal::from(PER_MILLION),
            output_per_token: output / Decimal::from(PER_MILLION),
        }
    }
}

/// Prices as they appear in configuration, in dollars per million tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceSettings {
    pub input_per_million: Decimal,
    pub output_per_million: Decimal,
}

#[derive(Debug, Clone)]
pub struct PricingTable {
    entries: HashMap<String, PricingEntry>,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "gpt-4o-mini".to_string(),
            PricingEntry::per_million(Decimal::new(150, 3), Decimal::new(600, 3)),
        );
        entries.insert(
            "gpt-4o-2024-08-06".to_string(),
            PricingEntry::per_million(Decimal::new(25, 1), Decimal::from(10)),
        );
        PricingTable { entries }
    }
}

impl PricingTable {
    pub fn empty() -> Self {
        PricingTable {
            entries: HashMap::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: &HashMap<String, PriceSettings>) -> Self {
        for (model, price) in overrides {
            self.insert(
                model,
                PricingEntry::per_million(price.input_per_million, price.output_per_million),
            );
        }
        self
    }

    pub fn insert(&mut self, model: &str, entry: PricingEntry) {
        self.entries.insert(model.to_string(), entry);
    }

    pub fn get(&self, model: &str) -> Option<&PricingEntry> {
        self.entries.get(model)
    }

    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        models.sort_unstable();
        models
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub input_token_count: usize,
    pub output_token_count: usize,
    pub total_cost: Decimal,
}
