use std::{env, fs, path::PathBuf};

use anyhow::{Context, bail};
use ts_rs::TS;

fn generate_types_content() -> String {
    let decls = [
        utils::response::ApiResponse::<(), ()>::decl(),
        utils::decode::ValidationError::decl(),
        models::tenant::EntityKey::decl(),
        models::tenant::EntityAttribute::decl(),
        models::tenant::TenantEntity::decl(),
        models::tenant::EntityEntry::decl(),
        models::tenant::TenantDefinition::decl(),
        services::services::tenant_store::TenantConfig::decl(),
        models::attachment::AttachmentKind::decl(),
        models::attachment::AttachmentRef::decl(),
        models::daily_report::DailyReportStatus::decl(),
        models::daily_report::WorkPackageSummary::decl(),
        models::daily_report::LocationSummary::decl(),
        models::daily_report::UserRef::decl(),
        models::daily_report::WorkSchedule::decl(),
        models::daily_report::ControlAnalysis::decl(),
        models::daily_report::HazardAnalysis::decl(),
        models::daily_report::TaskAnalysis::decl(),
        models::daily_report::SiteConditionAnalysis::decl(),
        models::daily_report::CrewMember::decl(),
        models::daily_report::DailyReportSections::decl(),
        models::daily_report::DailyReport::decl(),
        models::form_template::FieldKind::decl(),
        models::form_template::FieldSpec::decl(),
        models::form_template::FormTemplate::decl(),
        models::form_template::ValidateFormRequest::decl(),
        models::form_template::FieldReport::decl(),
        models::form_template::FormValidationReport::decl(),
        services::services::forms::FieldValue::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| format!("export {}", decl.trim_start()))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `cargo run --bin generate_types`. Do not edit it by hand.\n\n{}\n",
        body
    )
}

fn main() -> anyhow::Result<()> {
    let check = env::args().skip(1).any(|arg| arg == "--check");
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared/types.ts");
    let generated = generate_types_content();

    if check {
        let current = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        if current != generated {
            bail!("{} is out of date, run generate_types", path.display());
        }
        println!("{} is up to date", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(&path, generated).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
