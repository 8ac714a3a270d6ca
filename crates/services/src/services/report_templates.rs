//! Daily inspection report templates: the page body plus the header and
//! footer fragments printed on every page.

use chrono::{DateTime, Utc};
use models::{
    daily_report::{DailyReport, HazardAnalysis},
    tenant::EntityKey,
};

use super::{
    render::{Component, Markup},
    tenant_store::TenantConfig,
};

pub const REPORT_CSS: &str = r#"
div.report { font-family: Helvetica, Arial, sans-serif; font-size: 11px; color: #1f2933 }
h1 { font-size: 20px; margin: 0 0 12px 0 }
h2 { font-size: 14px; margin: 18px 0 6px 0; padding-bottom: 4px; border-bottom: 1px solid #cbd2d9 }
h3 { font-size: 12px; margin: 10px 0 4px 0 }
table { width: 100%; border-collapse: collapse }
th { text-align: left; font-weight: bold; background-color: #f5f7fa; padding: 4px 6px; border: 1px solid #e4e7eb }
td { padding: 4px 6px; border: 1px solid #e4e7eb; vertical-align: top }
td.label { width: 30%; font-weight: bold; color: #52606d }
p.empty { color: #7b8794; font-style: italic }
p.notes { margin: 4px 0 }
span.risk { font-weight: bold }
span.not-applicable { color: #7b8794 }
ul.attachments { margin: 0; padding-left: 16px }
"#;

pub const HEADER_CSS: &str = r#"
div.header { width: 100%; font-family: Helvetica, Arial, sans-serif; font-size: 9px; color: #52606d; margin: 0 36px; display: flex; justify-content: space-between }
span.title { font-weight: bold }
"#;

pub const FOOTER_CSS: &str = r#"
div.footer { width: 100%; font-family: Helvetica, Arial, sans-serif; font-size: 9px; color: #7b8794; text-align: center }
"#;

fn format_date(value: DateTime<Utc>) -> String {
    value.format("%b %-d, %Y").to_string()
}

fn format_datetime(value: DateTime<Utc>) -> String {
    value.format("%b %-d, %Y %-I:%M %p UTC").to_string()
}

/// Two-column table of label/value pairs.
fn summary_table(out: &mut Markup, rows: &[(&str, String)]) {
    out.element("table", &[("class", "summary")], |m| {
        for (label, value) in rows {
            m.element("tr", &[], |m| {
                m.text_element("td", &[("class", "label")], label)
                    .text_element("td", &[], value);
            });
        }
    });
}

fn empty(out: &mut Markup, text: &str) {
    out.text_element("p", &[("class", "empty")], text);
}

pub struct DailyReportDocument<'a> {
    report: &'a DailyReport,
    tenant: &'a TenantConfig,
}

impl<'a> DailyReportDocument<'a> {
    pub fn new(report: &'a DailyReport, tenant: &'a TenantConfig) -> Self {
        Self { report, tenant }
    }

    fn visible(&self, attribute: &str) -> bool {
        self.tenant
            .is_attribute_visible(EntityKey::DailyReport, attribute)
    }

    fn label(&self, attribute: &'static str) -> &str {
        self.tenant.attribute_label(EntityKey::DailyReport, attribute)
    }

    fn summary(&self, out: &mut Markup) {
        let t = self.tenant;
        let report = self.report;
        let status = report.status.to_string();

        let mut rows = vec![(
            t.entity_label(EntityKey::WorkPackage),
            report.work_package.name.clone(),
        )];
        if let Some(key) = &report.work_package.external_key {
            rows.push((t.attribute_label(EntityKey::WorkPackage, "externalKey"), key.clone()));
        }
        if let Some(address) = &report.work_package.address {
            if t.is_attribute_visible(EntityKey::WorkPackage, "address") {
                rows.push((t.attribute_label(EntityKey::WorkPackage, "address"), address.clone()));
            }
        }
        if let Some(location) = &report.location {
            rows.push((t.entity_label(EntityKey::Location), location.name.clone()));
        }
        rows.push((
            t.attribute_label(EntityKey::DailyReport, "status"),
            t.get_mapping_value(EntityKey::DailyReport, "status", &status)
                .to_string(),
        ));
        if self.visible("createdBy") {
            if let Some(author) = &report.created_by {
                rows.push((t.attribute_label(EntityKey::DailyReport, "createdBy"), author.name.clone()));
            }
        }
        rows.push((self.label("createdAt"), format_datetime(report.created_at)));
        if self.visible("completedAt") {
            if let Some(completed_at) = report.completed_at {
                rows.push((
                    t.attribute_label(EntityKey::DailyReport, "completedAt"),
                    format_datetime(completed_at),
                ));
            }
        }

        summary_table(out, &rows);
    }

    fn work_schedule(&self, out: &mut Markup) {
        if !self.visible("workSchedule") {
            return;
        }
        out.text_element("h2", &[], self.label("workSchedule"));
        match &self.report.sections.work_schedule {
            Some(schedule) => summary_table(
                out,
                &[
                    (self.label("startDatetime"), format_datetime(schedule.start_datetime)),
                    (self.label("endDatetime"), format_datetime(schedule.end_datetime)),
                ],
            ),
            None => empty(out, "No work schedule recorded."),
        }
    }

    fn hazards_table(&self, out: &mut Markup, hazards: &[HazardAnalysis]) {
        let t = self.tenant;
        let applicable: Vec<_> = hazards.iter().filter(|h| h.is_applicable).collect();
        if applicable.is_empty() {
            empty(out, "No applicable hazards.");
            return;
        }

        out.element("table", &[("class", "hazards")], |m| {
            m.element("tr", &[], |m| {
                m.text_element("th", &[], t.entity_label(EntityKey::Hazard))
                    .text_element("th", &[], t.entity_label(EntityKey::Control))
                    .text_element("th", &[], t.attribute_label(EntityKey::Control, "implemented"))
                    .text_element(
                        "th",
                        &[],
                        t.attribute_label(EntityKey::Control, "notImplementedReason"),
                    );
            });

            for hazard in applicable {
                if hazard.controls.is_empty() {
                    m.element("tr", &[], |m| {
                        m.text_element("td", &[], &hazard.name)
                            .text_element("td", &[], "None")
                            .text_element("td", &[], "")
                            .text_element("td", &[], "");
                    });
                    continue;
                }
                for control in &hazard.controls {
                    let reason = [&control.not_implemented_reason, &control.further_explanation]
                        .into_iter()
                        .flatten()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join(" - ");
                    m.element("tr", &[], |m| {
                        m.text_element("td", &[], &hazard.name)
                            .text_element("td", &[], &control.name)
                            .text_element("td", &[], if control.implemented { "Yes" } else { "No" })
                            .text_element("td", &[], &reason);
                    });
                }
            }
        });
    }

    fn job_hazard_analysis(&self, out: &mut Markup) {
        let t = self.tenant;
        out.text_element("h2", &[], self.label("jobHazardAnalysis"));
        let tasks = &self.report.sections.job_hazard_analysis;
        if tasks.is_empty() {
            empty(out, &format!("No {} analysed.", t.entity_label_plural(EntityKey::Task).to_lowercase()));
            return;
        }

        for task in tasks {
            out.text_element("h3", &[], &task.name);
            if let Some(risk) = &task.risk_level {
                out.element("p", &[("class", "notes")], |m| {
                    m.text(&format!("{}: ", t.attribute_label(EntityKey::Task, "riskLevel")))
                        .text_element(
                            "span",
                            &[("class", "risk")],
                            t.get_mapping_value(EntityKey::Task, "riskLevel", risk),
                        );
                });
            }
            if let Some(notes) = &task.notes {
                out.text_element("p", &[("class", "notes")], notes);
            }
            self.hazards_table(out, &task.hazards);
        }
    }

    fn site_conditions(&self, out: &mut Markup) {
        let t = self.tenant;
        out.text_element("h2", &[], t.entity_label_plural(EntityKey::SiteCondition));
        let conditions = &self.report.sections.site_conditions;
        if conditions.is_empty() {
            empty(out, "None recorded.");
            return;
        }

        for condition in conditions {
            if condition.is_applicable {
                out.text_element("h3", &[], &condition.name);
                self.hazards_table(out, &condition.hazards);
            } else {
                out.element("h3", &[], |m| {
                    m.text(&condition.name).text(" ").text_element(
                        "span",
                        &[("class", "not-applicable")],
                        "(not applicable)",
                    );
                });
            }
        }
    }

    fn crew(&self, out: &mut Markup) {
        if !self.visible("crew") {
            return;
        }
        let crew = &self.report.sections.crew;
        out.text_element("h2", &[], self.label("crew"));
        if crew.is_empty() {
            empty(out, "No crew recorded.");
            return;
        }
        out.element("table", &[("class", "crew")], |m| {
            m.element("tr", &[], |m| {
                m.text_element("th", &[], self.label("crewMemberName"))
                    .text_element("th", &[], self.label("crewMemberRole"));
            });
            for member in crew {
                m.element("tr", &[], |m| {
                    m.text_element("td", &[], &member.name)
                        .text_element("td", &[], member.role.as_deref().unwrap_or(""));
                });
            }
        });
    }

    fn additional_information(&self, out: &mut Markup) {
        if !self.visible("additionalInformation") {
            return;
        }
        if let Some(info) = self.report.sections.additional_information.as_deref() {
            if info.trim().is_empty() {
                return;
            }
            out.text_element("h2", &[], self.label("additionalInformation"));
            for paragraph in info.lines().filter(|l| !l.trim().is_empty()) {
                out.text_element("p", &[("class", "notes")], paragraph);
            }
        }
    }

    fn attachments(&self, out: &mut Markup) {
        let attachments = &self.report.attachments;
        if attachments.is_empty() || !self.visible("attachments") {
            return;
        }
        out.text_element("h2", &[], self.label("attachments"));
        out.element("ul", &[("class", "attachments")], |m| {
            for attachment in attachments {
                m.text_element("li", &[], &format!("{} ({})", attachment.name, attachment.kind));
            }
        });
    }
}

impl Component for DailyReportDocument<'_> {
    fn render(&self, out: &mut Markup) {
        let title = format!(
            "{} - {}",
            self.tenant.entity_label(EntityKey::DailyReport),
            self.report.work_package.name
        );

        out.raw("<!DOCTYPE html>").element("html", &[], |m| {
            m.element("head", &[], |m| {
                m.void("meta", &[("charset", "utf-8")])
                    .text_element("title", &[], &title);
            })
            .element("body", &[], |m| {
                m.element("div", &[("class", "report")], |m| {
                    m.text_element("h1", &[], &title);
                    self.summary(m);
                    self.work_schedule(m);
                    self.job_hazard_analysis(m);
                    self.site_conditions(m);
                    self.crew(m);
                    self.additional_information(m);
                    self.attachments(m);
                });
            });
        });
    }
}

/// Header fragment repeated on every page.
pub struct ReportHeader<'a> {
    report: &'a DailyReport,
    tenant: &'a TenantConfig,
}

impl<'a> ReportHeader<'a> {
    pub fn new(report: &'a DailyReport, tenant: &'a TenantConfig) -> Self {
        Self { report, tenant }
    }
}

impl Component for ReportHeader<'_> {
    fn render(&self, out: &mut Markup) {
        let tenant_name = self
            .tenant
            .display_name
            .as_deref()
            .unwrap_or(&self.tenant.name);
        out.element("div", &[("class", "header")], |m| {
            m.text_element(
                "span",
                &[("class", "title")],
                &format!(
                    "{} | {}",
                    tenant_name,
                    self.tenant.entity_label(EntityKey::DailyReport)
                ),
            )
            .text_element(
                "span",
                &[("class", "meta")],
                &format!(
                    "{} | {}",
                    self.report.work_package.name,
                    format_date(self.report.report_date())
                ),
            );
        });
    }
}

/// Footer fragment. The PDF service fills the `pageNumber` and
/// `totalPages` spans.
pub struct ReportFooter;

impl Component for ReportFooter {
    fn render(&self, out: &mut Markup) {
        out.element("div", &[("class", "footer")], |m| {
            m.text("Page ")
                .element("span", &[("class", "pageNumber")], |_| {})
                .text(" of ")
                .element("span", &[("class", "totalPages")], |_| {});
        });
    }
}
