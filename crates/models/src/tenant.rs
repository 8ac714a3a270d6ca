use std::{collections::BTreeMap, sync::LazyLock};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;

/// Generic domain concepts that tenants may relabel.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    EnumIter,
    Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum EntityKey {
    WorkPackage,
    Location,
    Activity,
    Task,
    SiteCondition,
    Hazard,
    Control,
    DailyReport,
    Incident,
    FormList,
    TemplateForm,
}

/// A field of an entity with tenant-specific presentation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct EntityAttribute {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub label_plural: String,
    #[serde(default)]
    pub default_label: String,
    #[serde(default)]
    pub default_label_plural: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub filterable: bool,
    /// Required by the platform; tenants cannot hide or make it optional.
    #[serde(default)]
    pub mandatory: bool,
    /// Raw value -> tenant labels. The first label is the display label.
    #[serde(default)]
    pub mappings: Option<BTreeMap<String, Vec<String>>>,
}

fn default_true() -> bool {
    true
}

impl EntityAttribute {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            label_plural: label.to_string(),
            default_label: label.to_string(),
            default_label_plural: label.to_string(),
            visible: true,
            required: false,
            filterable: false,
            mandatory: false,
            mappings: None,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self.mandatory = true;
        self
    }

    fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    fn mapped(mut self, pairs: &[(&str, &str)]) -> Self {
        self.mappings = Some(
            pairs
                .iter()
                .map(|(raw, label)| (raw.to_string(), vec![label.to_string()]))
                .collect(),
        );
        self
    }

    /// Tenant label, or the default when the tenant left it blank.
    pub fn resolved_label(&self) -> Option<&str> {
        non_blank(&self.label).or_else(|| non_blank(&self.default_label))
    }

    pub fn resolved_label_plural(&self) -> Option<&str> {
        non_blank(&self.label_plural).or_else(|| non_blank(&self.default_label_plural))
    }

    /// Tenant label for a raw value, if this attribute maps it.
    pub fn mapping(&self, raw: &str) -> Option<&str> {
        self.mappings
            .as_ref()?
            .get(raw)?
            .iter()
            .find_map(|label| non_blank(label))
    }
}

fn non_blank(s: &str) -> Option<&str> {
    if s.trim().is_empty() { None } else { Some(s) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct TenantEntity {
    pub key: EntityKey,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub label_plural: String,
    #[serde(default)]
    pub default_label: String,
    #[serde(default)]
    pub default_label_plural: String,
    #[serde(default)]
    pub attributes: Vec<EntityAttribute>,
}

impl TenantEntity {
    pub fn attribute(&self, key: &str) -> Option<&EntityAttribute> {
        self.attributes.iter().find(|a| a.key == key)
    }

    pub fn resolved_label(&self) -> Option<&str> {
        non_blank(&self.label).or_else(|| non_blank(&self.default_label))
    }

    pub fn resolved_label_plural(&self) -> Option<&str> {
        non_blank(&self.label_plural).or_else(|| non_blank(&self.default_label_plural))
    }
}

/// One element of a tenant's entity list. Elements that do not parse as a
/// [`TenantEntity`] (for example a key outside [`EntityKey`]) are kept as
/// raw JSON so the rest of the tenant still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
pub enum EntityEntry {
    Known(TenantEntity),
    Unrecognized(serde_json::Value),
}

impl EntityEntry {
    /// The `key` field of an unrecognized entry, for logging.
    pub fn raw_key(&self) -> Option<&str> {
        match self {
            EntityEntry::Known(_) => None,
            EntityEntry::Unrecognized(value) => value.get("key")?.as_str(),
        }
    }
}

impl From<TenantEntity> for EntityEntry {
    fn from(entity: TenantEntity) -> Self {
        EntityEntry::Known(entity)
    }
}

/// Tenant settings as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct TenantDefinition {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub entities: Vec<EntityEntry>,
}

impl EntityKey {
    /// The built-in English definition for this entity.
    pub fn default_entity(self) -> &'static TenantEntity {
        // Every key is inserted by `build_defaults`.
        &DEFAULT_ENTITIES[&self]
    }
}

static DEFAULT_ENTITIES: LazyLock<BTreeMap<EntityKey, TenantEntity>> =
    LazyLock::new(build_defaults);

fn entity(
    key: EntityKey,
    label: &str,
    label_plural: &str,
    attributes: Vec<EntityAttribute>,
) -> TenantEntity {
    TenantEntity {
        key,
        label: label.to_string(),
        label_plural: label_plural.to_string(),
        default_label: label.to_string(),
        default_label_plural: label_plural.to_string(),
        attributes,
    }
}

fn build_defaults() -> BTreeMap<EntityKey, TenantEntity> {
    use EntityAttribute as A;

    let status = |values: &[(&str, &str)]| A::new("status", "Status").filterable().mapped(values);

    let entities = vec![
        entity(
            EntityKey::WorkPackage,
            "Work Package",
            "Work Packages",
            vec![
                A::new("name", "Name").required(),
                A::new("externalKey", "Project Number").required(),
                A::new("workPackageType", "Work Package Type").filterable(),
                status(&[
                    ("PENDING", "Pending"),
                    ("ACTIVE", "Active"),
                    ("COMPLETED", "Completed"),
                ]),
                A::new("startDate", "Start Date").required(),
                A::new("endDate", "End Date").required(),
                A::new("region", "Region").filterable(),
                A::new("division", "Division").filterable(),
                A::new("assetType", "Asset Type"),
                A::new("primeContractor", "Prime Contractor"),
                A::new("address", "Address"),
                A::new("description", "Description"),
            ],
        ),
        entity(
            EntityKey::Location,
            "Location",
            "Locations",
            vec![
                A::new("name", "Name").required(),
                A::new("supervisor", "Supervisor").filterable(),
                A::new("additionalSupervisor", "Additional Supervisor"),
                A::new("contractor", "Contractor"),
            ],
        ),
        entity(
            EntityKey::Activity,
            "Activity",
            "Activities",
            vec![
                A::new("name", "Name").required(),
                A::new("startDate", "Start Date"),
                A::new("endDate", "End Date"),
                status(&[
                    ("NOT_STARTED", "Not Started"),
                    ("IN_PROGRESS", "In Progress"),
                    ("COMPLETE", "Complete"),
                    ("NOT_COMPLETED", "Not Completed"),
                ]),
                A::new("criticalActivity", "Critical Activity"),
            ],
        ),
        entity(
            EntityKey::Task,
            "Task",
            "Tasks",
            vec![
                A::new("name", "Name").required(),
                A::new("category", "Category").filterable(),
                A::new("riskLevel", "Risk Level").filterable().mapped(&[
                    ("LOW", "Low"),
                    ("MEDIUM", "Medium"),
                    ("HIGH", "High"),
                    ("RECALCULATING", "Recalculating"),
                    ("UNKNOWN", "Unknown"),
                ]),
            ],
        ),
        entity(
            EntityKey::SiteCondition,
            "Site Condition",
            "Site Conditions",
            vec![A::new("name", "Name").required()],
        ),
        entity(
            EntityKey::Hazard,
            "Hazard",
            "Hazards",
            vec![
                A::new("name", "Name").required(),
                A::new("isApplicable", "Applicable"),
            ],
        ),
        entity(
            EntityKey::Control,
            "Control",
            "Controls",
            vec![
                A::new("name", "Name").required(),
                A::new("implemented", "Implemented"),
                A::new("notImplementedReason", "Reason Not Implemented"),
            ],
        ),
        entity(
            EntityKey::DailyReport,
            "Daily Inspection Report",
            "Daily Inspection Reports",
            vec![
                status(&[("IN_PROGRESS", "In Progress"), ("COMPLETE", "Complete")]),
                A::new("createdBy", "Created By"),
                A::new("createdAt", "Created On"),
                A::new("completedAt", "Completed On"),
                A::new("workSchedule", "Work Schedule"),
                A::new("startDatetime", "Start"),
                A::new("endDatetime", "End"),
                A::new("jobHazardAnalysis", "Job Hazard Analysis"),
                A::new("crew", "Crew"),
                A::new("crewMemberName", "Name"),
                A::new("crewMemberRole", "Role"),
                A::new("additionalInformation", "Additional Information"),
                A::new("attachments", "Attachments"),
            ],
        ),
        entity(
            EntityKey::Incident,
            "Incident",
            "Incidents",
            vec![
                A::new("incidentType", "Type").required().filterable(),
                A::new("severity", "Severity").filterable().mapped(&[
                    ("NOT_APPLICABLE", "Not Applicable"),
                    ("FIRST_AID_ONLY", "First Aid Only"),
                    ("REPORT_PURPOSES_ONLY", "Report Purposes Only"),
                    ("RECORDABLE", "Recordable"),
                    ("LOST_TIME", "Lost Time"),
                ]),
                A::new("description", "Description"),
            ],
        ),
        entity(
            EntityKey::FormList,
            "Form",
            "Forms",
            vec![
                A::new("formName", "Form Name").required(),
                status(&[
                    ("IN_PROGRESS", "In Progress"),
                    ("COMPLETE", "Complete"),
                ]),
                A::new("createdBy", "Created By").filterable(),
                A::new("createdOn", "Created On"),
            ],
        ),
        entity(
            EntityKey::TemplateForm,
            "Template Form",
            "Template Forms",
            vec![
                A::new("name", "Name").required(),
                status(&[("DRAFT", "Draft"), ("PUBLISHED", "Published")]),
            ],
        ),
    ];

    entities.into_iter().map(|e| (e.key, e)).collect()
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_every_key_has_a_default_entity() {
        for key in EntityKey::iter() {
            let entity = key.default_entity();
            assert_eq!(entity.key, key);
            assert!(entity.resolved_label().is_some());
            assert!(entity.resolved_label_plural().is_some());
        }
    }

    #[test]
    fn test_entity_key_uses_camel_case() {
        assert_eq!(EntityKey::WorkPackage.to_string(), "workPackage");
        assert_eq!("siteCondition".parse::<EntityKey>().unwrap(), EntityKey::SiteCondition);
        assert_eq!(
            serde_json::to_string(&EntityKey::DailyReport).unwrap(),
            "\"dailyReport\""
        );
    }

    #[test]
    fn test_blank_label_falls_back_to_default() {
        let mut attribute = EntityAttribute::new("region", "Region");
        attribute.label = "  ".to_string();
        assert_eq!(attribute.resolved_label(), Some("Region"));
        attribute.label = "Territory".to_string();
        assert_eq!(attribute.resolved_label(), Some("Territory"));
    }

    #[test]
    fn test_mapping_skips_blank_labels() {
        let mut attribute = EntityAttribute::new("riskLevel", "Risk Level");
        attribute.mappings = Some(BTreeMap::from([(
            "HIGH".to_string(),
            vec![String::new(), "Critical".to_string()],
        )]));
        assert_eq!(attribute.mapping("HIGH"), Some("Critical"));
        assert_eq!(attribute.mapping("LOW"), None);
    }

    #[test]
    fn test_definition_parses_backend_payload() {
        let json = serde_json::json!({
            "name": "acme-utilities",
            "displayName": "Acme Utilities",
            "entities": [{
                "key": "workPackage",
                "label": "Project",
                "labelPlural": "Projects",
                "defaultLabel": "Work Package",
                "defaultLabelPlural": "Work Packages",
                "attributes": [{
                    "key": "region",
                    "label": "Territory",
                    "defaultLabel": "Region",
                    "filterable": true,
                    "mappings": { "north": ["Northern Territory"] }
                }]
            }]
        });
        let definition: TenantDefinition = serde_json::from_value(json).unwrap();
        let EntityEntry::Known(entity) = &definition.entities[0] else {
            panic!("workPackage should parse as a known entity");
        };
        assert_eq!(entity.key, EntityKey::WorkPackage);
        let region = entity.attribute("region").unwrap();
        assert!(region.visible);
        assert!(!region.required);
        assert_eq!(region.mapping("north"), Some("Northern Territory"));
    }

    #[test]
    fn test_unknown_entity_key_does_not_reject_definition() {
        let json = serde_json::json!({
            "name": "acme",
            "entities": [
                { "key": "workPackage", "label": "Project" },
                { "key": "jsb", "label": "Job Safety Briefing" }
            ]
        });
        let definition: TenantDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(definition.entities.len(), 2);
        assert!(matches!(
            &definition.entities[0],
            EntityEntry::Known(entity) if entity.key == EntityKey::WorkPackage
        ));
        assert_eq!(definition.entities[0].raw_key(), None);
        assert_eq!(definition.entities[1].raw_key(), Some("jsb"));
    }
}
