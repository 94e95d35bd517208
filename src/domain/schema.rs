use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

const CONTAINER_KEY: &str = "listings";

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("invalid schema: at least one field name is required")]
    NoFields,
    #[error("invalid schema: field names must not be empty")]
    EmptyFieldName,
}

/// Operator-chosen field names, deduplicated with first-seen order kept for display.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    names: Vec<String>,
}

impl FieldSpec {
    pub fn new<I, S>(names: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(|n| n.into().trim().to_string())
            .collect();

        if names.is_empty() {
            return Err(SchemaError::NoFields);
        }
        if names.iter().any(|n| n.is_empty()) {
            return Err(SchemaError::EmptyFieldName);
        }

        Ok(FieldSpec {
            names: names.into_iter().unique().collect(),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// One required string attribute per field name.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    fields: Vec<String>,
}

/// Wraps a record schema as `{ "listings": [record, ...] }`.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSchema {
    record: RecordSchema,
}

pub fn build_record_schema<I, S>(field_names: I) -> Result<RecordSchema, SchemaError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let spec = FieldSpec::new(field_names)?;
    Ok(RecordSchema::from_spec(&spec))
}

pub fn build_container_schema(record: &RecordSchema) -> CollectionSchema {
    CollectionSchema {
        record: record.clone(),
    }
}

impl RecordSchema {
    pub fn from_spec(spec: &FieldSpec) -> Self {
        RecordSchema {
            fields: spec.names().to_vec(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// JSON schema in the shape OpenAI strict structured outputs accept:
    /// every property required, no additional properties.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.clone(), json!({ "type": "string" })))
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.fields,
            "additionalProperties": false,
        })
    }

    /// Checks that every required key is present with a string value.
    /// Extra string-valued keys are kept.
    pub fn validate(&self, value: &Value) -> Result<Record, String> {
        let object = value
            .as_object()
            .ok_or_else(|| format!("expected an object, got {}", value))?;

        if let Some(missing) = self.fields.iter().find(|f| !object.contains_key(*f)) {
            return Err(format!("missing required field \"{}\"", missing));
        }

        object
            .iter()
            .map(|(key, v)| match v {
                Value::String(s) => Ok((key.clone(), s.clone())),
                other => Err(format!("field \"{}\" is not a string: {}", key, other)),
            })
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(Record)
    }
}

impl CollectionSchema {
    pub fn record(&self) -> &RecordSchema {
        &self.record
    }

    pub fn name(&self) -> &'static str {
        "dynamic_listings_container"
    }

    pub fn to_json_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                CONTAINER_KEY: {
                    "type": "array",
                    "items": self.record.to_json_schema(),
                }
            },
            "required": [CONTAINER_KEY],
            "additionalProperties": false,
        })
    }

    /// Parses a model response and validates every record in it.
    pub fn parse(&self, raw: &str) -> Result<ExtractionResult, String> {
        let value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        let listings = value
            .get(CONTAINER_KEY)
            .and_then(Value::as_array)
            .ok_or_else(|| format!("response has no \"{}\" array", CONTAINER_KEY))?;

        let records = listings
            .iter()
            .enumerate()
            .map(|(i, item)| {
                self.record
                    .validate(item)
                    .map_err(|e| format!("record {}: {}", i, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ExtractionResult { listings: records })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub BTreeMap<String, String>);

impl Record {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub listings: Vec<Record>,
}

impl ExtractionResult {
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_field_set_is_rejected() {
        let result = build_record_schema(Vec::<String>::new());
        assert_eq!(result, Err(SchemaError::NoFields));
    }

    #[test]
    fn blank_field_name_is_rejected() {
        let result = build_record_schema(["MSRP", "  "]);
        assert_eq!(result, Err(SchemaError::EmptyFieldName));
    }

    #[test]
    fn one_required_string_attribute_per_unique_name() {
        let schema = build_record_schema(["MSRP", "Model", "MSRP", "Lease Term"]).unwrap();
        assert_eq!(schema.fields(), ["MSRP", "Model", "Lease Term"]);

        let json = schema.to_json_schema();
        assert_eq!(json["required"], json!(["MSRP", "Model", "Lease Term"]));
        assert_eq!(json["additionalProperties"], json!(false));
        for field in schema.fields() {
            assert_eq!(json["properties"][field]["type"], "string");
        }
        assert_eq!(json["properties"].as_object().unwrap().len(), 3);
    }

    #[test]
    fn building_is_idempotent() {
        let first = build_record_schema(["MSRP", "Model"]).unwrap();
        let second = build_record_schema(["MSRP", "Model"]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_json_schema(), second.to_json_schema());
    }

    #[test]
    fn container_wraps_records_in_listings_array() {
        let record = build_record_schema(["MSRP"]).unwrap();
        let container = build_container_schema(&record).to_json_schema();
        assert_eq!(container["required"], json!(["listings"]));
        assert_eq!(container["properties"]["listings"]["type"], "array");
        assert_eq!(
            container["properties"]["listings"]["items"],
            record.to_json_schema()
        );
    }

    #[test]
    fn parse_accepts_conforming_output() {
        let container = build_container_schema(&build_record_schema(["MSRP"]).unwrap());
        let result = container
            .parse(r#"{"listings":[{"MSRP":"$31,990"},{"MSRP":""}]}"#)
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.listings[0].get("MSRP"), Some("$31,990"));
        assert_eq!(result.listings[1].get("MSRP"), Some(""));
    }

    #[test]
    fn parse_keeps_extra_point_fields() {
        let container = build_container_schema(&build_record_schema(["MSRP"]).unwrap());
        let result = container
            .parse(r#"{"listings":[{"MSRP":"1","Disclaimer point 1":"Plus tax"}]}"#)
            .unwrap();
        assert_eq!(result.listings[0].get("Disclaimer point 1"), Some("Plus tax"));
    }

    #[test]
    fn parse_rejects_missing_key_and_non_string_values() {
        let container = build_container_schema(&build_record_schema(["MSRP", "Model"]).unwrap());
        assert!(container.parse(r#"{"listings":[{"MSRP":"1"}]}"#).is_err());
        assert!(container
            .parse(r#"{"listings":[{"MSRP":1,"Model":"RAV4"}]}"#)
            .is_err());
        assert!(container.parse(r#"{"items":[]}"#).is_err());
        assert!(container.parse("not json").is_err());
    }
}
