use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::pricing::{PricingEntry, PricingTable, UsageReport};

use super::{TiktokenTokenizer, Tokenizer, TokenizerError};

#[derive(Debug, Error, PartialEq)]
pub enum CostError {
    #[error("no pricing entry for model \"{model}\"")]
    UnknownModel { model: String },
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
}

pub struct CostAccountant {
    pricing: PricingTable,
}

impl CostAccountant {
    pub fn new(pricing: PricingTable) -> Self {
        CostAccountant { pricing }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Prices a call to `model` using that model's own tokenizer.
    pub fn estimate_cost(
        &self,
        input_text: &str,
        output_text: &str,
        model: &str,
    ) -> Result<UsageReport, CostError> {
        self.ensure_priced(model)?;
        let tokenizer = TiktokenTokenizer::for_model(model)?;
        self.estimate_cost_with(&tokenizer, input_text, output_text, model)
    }

    pub fn estimate_cost_with(
        &self,
        tokenizer: &dyn Tokenizer,
        input_text: &str,
        output_text: &str,
        model: &str,
    ) -> Result<UsageReport, CostError> {
        let entry = self.ensure_priced(model)?;

        let input_token_count = tokenizer.count(input_text);
        let output_token_count = tokenizer.count(output_text);
        let total_cost = Decimal::from(input_token_count) * entry.input_per_token
            + Decimal::from(output_token_count) * entry.output_per_token;

        Ok(UsageReport {
            input_token_count,
            output_token_count,
            total_cost,
        })
    }

    fn ensure_priced(&self, model: &str) -> Result<&PricingEntry, CostError> {
        self.pricing.get(model).ok_or_else(|| CostError::UnknownModel {
            model: model.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::CharTokenizer;

    fn accountant() -> CostAccountant {
        let mut pricing = PricingTable::empty();
        pricing.insert(
            "test-model",
            PricingEntry {
                input_per_token: Decimal::new(2, 0),
                output_per_token: Decimal::new(5, 0),
            },
        );
        CostAccountant::new(pricing)
    }

    #[test]
    fn total_is_input_plus_output_cost() {
        let report = accountant()
            .estimate_cost_with(&CharTokenizer, "abcd", "xy", "test-model")
            .unwrap();
        assert_eq!(
            report,
            UsageReport {
                input_token_count: 4,
                output_token_count: 2,
                total_cost: Decimal::from(18),
            }
        );
    }

    #[test]
    fn input_cost_is_additive_over_concatenation() {
        let accountant = accountant();
        let first = "MSRP $31,990";
        let second = "Lease $299/mo for 36 months";

        let cost = |input: &str| {
            accountant
                .estimate_cost_with(&CharTokenizer, input, "", "test-model")
                .unwrap()
                .total_cost
        };

        assert_eq!(
            cost(&format!("{}{}", first, second)),
            cost(first) + cost(second)
        );
    }

    #[test]
    fn unknown_model_is_an_error_never_zero() {
        let result = accountant().estimate_cost_with(&CharTokenizer, "abc", "", "gpt-9");
        assert_eq!(
            result,
            Err(CostError::UnknownModel {
                model: "gpt-9".to_string()
            })
        );

        let result = CostAccountant::new(PricingTable::default()).estimate_cost("abc", "", "gpt-9");
        assert!(matches!(result, Err(CostError::UnknownModel { .. })));
    }

    #[test]
    fn prices_gpt_4o_mini_with_its_tokenizer() {
        let accountant = CostAccountant::new(PricingTable::default());
        let report = accountant
            .estimate_cost("Lease a RAV4 for $299/mo.", "{\"listings\":[]}", "gpt-4o-mini")
            .unwrap();

        assert!(report.input_token_count > 0);
        assert!(report.output_token_count > 0);
        let expected = Decimal::from(report.input_token_count) * Decimal::new(15, 8)
            + Decimal::from(report.output_token_count) * Decimal::new(6, 7);
        assert_eq!(report.total_cost, expected);
    }
}
