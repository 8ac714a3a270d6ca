use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "snake_case")]
pub enum AttachmentKind {
    Photo,
    Document,
}

/// A file attached to a report, stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub name: String,
    pub url: String,
    pub kind: AttachmentKind,
    #[serde(default)]
    pub size: Option<u64>,
}

/// A downloaded attachment, held only for the duration of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadableMetadata {
    pub file: String,
    pub content: Bytes,
}

impl DownloadableMetadata {
    pub fn new(file: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file: file.into(),
            content: content.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
