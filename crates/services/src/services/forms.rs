//! Server-side validation of forms built with the template builder.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use models::form_template::{FieldKind, FieldReport, FieldSpec, FormTemplate, FormValidationReport};
use serde::Serialize;
use tracing::debug;
use ts_rs::TS;
use utils::{
    decode::{
        DateFromIsoString, DateTimeFromIsoString, Decoder, DecoderExt, Errors, IntFromString,
        NonEmptyString, NumberFromString, OneOf, TrimmedString,
    },
    form_field::FormField,
};

pub const REQUIRED_MESSAGE: &str = "This field is required";

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Empty,
    Text(String),
    Number(f64),
    Integer(i64),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Choice(String),
}

/// Decoder for one template field, derived from its [`FieldSpec`].
pub struct FieldDecoder<'a> {
    spec: &'a FieldSpec,
}

impl<'a> FieldDecoder<'a> {
    pub fn new(spec: &'a FieldSpec) -> Self {
        Self { spec }
    }

    fn in_range(&self, n: f64) -> bool {
        self.spec.min.is_none_or(|min| n >= min) && self.spec.max.is_none_or(|max| n <= max)
    }

    fn range_message(&self) -> String {
        match (self.spec.min, self.spec.max) {
            (Some(min), Some(max)) => format!("must be between {min} and {max}"),
            (Some(min), None) => format!("must be at least {min}"),
            (None, Some(max)) => format!("must be at most {max}"),
            (None, None) => String::new(),
        }
    }

    fn decode_present(&self, raw: &String) -> Result<FieldValue, Errors> {
        match self.spec.kind {
            FieldKind::Text => TrimmedString.decode(raw).map(FieldValue::Text),
            FieldKind::Number => NumberFromString
                .refine(|n| self.in_range(*n), self.range_message())
                .decode(raw)
                .map(FieldValue::Number),
            FieldKind::Integer => IntFromString
                .refine(|n| self.in_range(*n as f64), self.range_message())
                .decode(raw)
                .map(FieldValue::Integer),
            FieldKind::Date => DateFromIsoString.decode(raw).map(FieldValue::Date),
            FieldKind::DateTime => DateTimeFromIsoString.decode(raw).map(FieldValue::DateTime),
            FieldKind::Choice => OneOf::new(self.spec.options.iter().cloned())
                .decode(raw)
                .map(FieldValue::Choice),
        }
    }
}

impl Decoder<String> for FieldDecoder<'_> {
    type Value = FieldValue;
    type Error = Errors;

    fn decode(&self, raw: &String) -> Result<FieldValue, Errors> {
        let result = if raw.trim().is_empty() {
            if self.spec.required {
                NonEmptyString
                    .with_message(REQUIRED_MESSAGE)
                    .decode(raw)
                    .map(FieldValue::Text)
            } else {
                Ok(FieldValue::Empty)
            }
        } else {
            self.decode_present(raw)
        };

        result.map_err(|errors| {
            errors
                .into_iter()
                .map(|e| e.at(self.spec.id.clone()))
                .collect()
        })
    }
}

/// Validate a submitted form. Every field counts as touched, so all errors
/// are reported.
pub fn validate_submission(
    template: &FormTemplate,
    values: &BTreeMap<String, String>,
) -> FormValidationReport {
    let fields: Vec<FieldReport> = template
        .fields
        .iter()
        .map(|spec| {
            let decoder = FieldDecoder::new(spec);
            let field: FormField<Errors, String, FieldValue> = match values.get(&spec.id) {
                Some(raw) => FormField::update(&decoder, raw.clone()),
                None => FormField::init(&decoder, String::new()).touch(),
            };
            FieldReport {
                id: spec.id.clone(),
                valid: field.is_valid(),
                errors: field
                    .visible_errors()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                raw: field.raw,
            }
        })
        .collect();

    let unknown_fields: Vec<String> = values
        .keys()
        .filter(|key| !template.fields.iter().any(|f| &f.id == *key))
        .cloned()
        .collect();

    let valid = fields.iter().all(|f| f.valid);
    debug!(
        template_id = %template.id,
        valid,
        invalid = fields.iter().filter(|f| !f.valid).count(),
        unknown = unknown_fields.len(),
        "Validated form submission"
    );

    FormValidationReport {
        valid,
        fields,
        unknown_fields,
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn spec(id: &str, kind: FieldKind, required: bool) -> FieldSpec {
        FieldSpec {
            id: id.to_string(),
            label: id.to_string(),
            kind,
            required,
            options: vec![],
            min: None,
            max: None,
        }
    }

    fn template(fields: Vec<FieldSpec>) -> FormTemplate {
        FormTemplate {
            id: Uuid::new_v4(),
            name: "Pre-job briefing".to_string(),
            fields,
        }
    }

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_required_field_reports_required_message() {
        let report = validate_submission(
            &template(vec![spec("supervisor", FieldKind::Text, true)]),
            &values(&[("supervisor", "  ")]),
        );
        assert!(!report.valid);
        assert_eq!(report.fields[0].errors, vec![REQUIRED_MESSAGE.to_string()]);
        assert_eq!(report.fields[0].raw, "  ");
    }

    #[test]
    fn test_missing_required_value_is_reported() {
        let report = validate_submission(
            &template(vec![spec("supervisor", FieldKind::Text, true)]),
            &BTreeMap::new(),
        );
        assert_eq!(report.fields[0].errors, vec![REQUIRED_MESSAGE.to_string()]);
    }

    #[test]
    fn test_optional_blank_is_empty() {
        let decoder_spec = spec("notes", FieldKind::Number, false);
        assert_eq!(
            FieldDecoder::new(&decoder_spec).decode(&String::new()),
            Ok(FieldValue::Empty)
        );
    }

    #[test]
    fn test_number_range() {
        let mut crew_size = spec("crewSize", FieldKind::Integer, true);
        crew_size.min = Some(1.0);
        crew_size.max = Some(50.0);
        let decoder = FieldDecoder::new(&crew_size);

        assert_eq!(decoder.decode(&"12".to_string()), Ok(FieldValue::Integer(12)));
        let errors = decoder.decode(&"0".to_string()).unwrap_err();
        assert_eq!(errors[0].message, "must be between 1 and 50");
        assert_eq!(errors[0].path, vec!["crewSize".to_string()]);
        let errors = decoder.decode(&"1.5".to_string()).unwrap_err();
        assert_eq!(errors[0].message, "must be a whole number");
    }

    #[test]
    fn test_choice_and_dates() {
        let mut weather = spec("weather", FieldKind::Choice, false);
        weather.options = vec!["Clear".to_string(), "Rain".to_string()];
        assert_eq!(
            FieldDecoder::new(&weather).decode(&" Rain ".to_string()),
            Ok(FieldValue::Choice("Rain".to_string()))
        );
        assert!(FieldDecoder::new(&weather).decode(&"Snow".to_string()).is_err());

        let date = spec("date", FieldKind::Date, true);
        assert_eq!(
            FieldDecoder::new(&date).decode(&"2024-05-02".to_string()),
            Ok(FieldValue::Date(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()))
        );
    }

    #[test]
    fn test_unknown_fields_are_listed_but_do_not_invalidate() {
        let report = validate_submission(
            &template(vec![spec("supervisor", FieldKind::Text, true)]),
            &values(&[("supervisor", "Jordan"), ("extra", "x")]),
        );
        assert!(report.valid);
        assert_eq!(report.unknown_fields, vec!["extra".to_string()]);
        assert!(report.fields[0].errors.is_empty());
    }

    #[test]
    fn test_field_value_serialization() {
        assert_eq!(
            serde_json::to_value(FieldValue::Integer(3)).unwrap(),
            serde_json::json!({ "kind": "integer", "value": 3 })
        );
        assert_eq!(
            serde_json::to_value(FieldValue::Empty).unwrap(),
            serde_json::json!({ "kind": "empty" })
        );
    }
}
