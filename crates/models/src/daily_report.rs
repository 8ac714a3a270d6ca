use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use crate::attachment::AttachmentRef;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DailyReportStatus {
    #[default]
    InProgress,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct WorkPackageSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub external_key: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct LocationSummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct WorkSchedule {
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ControlAnalysis {
    pub name: String,
    pub implemented: bool,
    #[serde(default)]
    pub not_implemented_reason: Option<String>,
    #[serde(default)]
    pub further_explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct HazardAnalysis {
    pub name: String,
    pub is_applicable: bool,
    #[serde(default)]
    pub controls: Vec<ControlAnalysis>,
}

/// Job hazard analysis for one task performed that day.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct TaskAnalysis {
    pub name: String,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub hazards: Vec<HazardAnalysis>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SiteConditionAnalysis {
    pub name: String,
    pub is_applicable: bool,
    #[serde(default)]
    pub hazards: Vec<HazardAnalysis>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CrewMember {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportSections {
    #[serde(default)]
    pub work_schedule: Option<WorkSchedule>,
    #[serde(default)]
    pub job_hazard_analysis: Vec<TaskAnalysis>,
    #[serde(default)]
    pub site_conditions: Vec<SiteConditionAnalysis>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
    #[serde(default)]
    pub additional_information: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub id: Uuid,
    pub status: DailyReportStatus,
    pub work_package: WorkPackageSummary,
    #[serde(default)]
    pub location: Option<LocationSummary>,
    #[serde(default)]
    pub created_by: Option<UserRef>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sections: DailyReportSections,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

impl DailyReport {
    /// Date the report describes: completion date, else creation date.
    pub fn report_date(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.created_at)
    }

    /// `daily-report-<work-package>-<yyyy-mm-dd>`, without extension.
    pub fn file_stem(&self) -> String {
        format!(
            "daily-report-{}-{}",
            slugify(&self.work_package.name),
            self.report_date().format("%Y-%m-%d")
        )
    }

    pub fn pdf_file_name(&self) -> String {
        format!("{}.pdf", self.file_stem())
    }
}

fn slugify(name: &str) -> String {
    let slug = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "id": "6f1c2d1e-3b0a-4b59-9a55-2f5b7d6c9e10",
            "status": "COMPLETE",
            "workPackage": {
                "id": "0b5e8f44-8f0e-4a51-8c43-9f2a8e0b6c11",
                "name": "Main St. Gas Line (Phase 2)"
            },
            "createdAt": "2024-05-02T12:00:00Z",
            "completedAt": "2024-05-03T21:15:00Z",
            "sections": {
                "jobHazardAnalysis": [{
                    "name": "Excavation",
                    "hazards": [{
                        "name": "Cave-in",
                        "isApplicable": true,
                        "controls": [{ "name": "Shoring", "implemented": true }]
                    }]
                }]
            }
        })
    }

    #[test]
    fn test_parses_backend_payload_with_missing_sections() {
        let report: DailyReport = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(report.status, DailyReportStatus::Complete);
        assert!(report.location.is_none());
        assert!(report.sections.crew.is_empty());
        let task = &report.sections.job_hazard_analysis[0];
        assert!(task.hazards[0].controls[0].implemented);
    }

    #[test]
    fn test_pdf_file_name_uses_slug_and_completion_date() {
        let report: DailyReport = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(
            report.pdf_file_name(),
            "daily-report-main-st-gas-line-phase-2-2024-05-03.pdf"
        );
    }

    #[test]
    fn test_status_displays_as_backend_value() {
        assert_eq!(DailyReportStatus::InProgress.to_string(), "IN_PROGRESS");
    }
}
