pub mod attachments;
pub mod auth;
pub mod backend;
pub mod config;
pub mod forms;
pub mod inline_css;
pub mod pdf;
pub mod render;
pub mod report_templates;
pub mod tenant_store;
