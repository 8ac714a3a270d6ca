pub mod attachment;
pub mod daily_report;
pub mod form_template;
pub mod tenant;
