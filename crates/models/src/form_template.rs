use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Integer,
    Date,
    DateTime,
    Choice,
}

/// One input of a form built in the template builder.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub id: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Allowed values for `Choice` fields.
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct FormTemplate {
    pub id: Uuid,
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

/// Request body for validating a filled-in form.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ValidateFormRequest {
    pub template: FormTemplate,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct FieldReport {
    pub id: String,
    pub raw: String,
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct FormValidationReport {
    pub valid: bool,
    pub fields: Vec<FieldReport>,
    /// Submitted keys that match no field in the template.
    pub unknown_fields: Vec<String>,
}
