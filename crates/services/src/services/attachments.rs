use std::{collections::HashSet, io::Write, sync::Arc};

use flate2::{Compression, write::GzEncoder};
use models::{attachment::DownloadableMetadata, daily_report::DailyReport};
use thiserror::Error;
use tracing::{debug, info};

use super::backend::{BackendError, ReportBackend};

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("failed to build archive: {0}")]
    Archive(#[from] std::io::Error),
    #[error("report has no attachments")]
    NoAttachments,
}

/// Strip path separators and control characters so a backend-supplied
/// name cannot escape the archive root.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim();
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `photo.jpg`, `photo (1).jpg`, `photo (2).jpg`, ...
fn unique_file_name(name: &str, taken: &mut HashSet<String>) -> String {
    let name = sanitize_file_name(name);
    if taken.insert(name.clone()) {
        return name;
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name.as_str(), ""),
    };
    let mut n = 1;
    loop {
        let candidate = format!("{stem} ({n}){extension}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[derive(Clone)]
pub struct AttachmentService {
    backend: Arc<dyn ReportBackend>,
}

impl AttachmentService {
    pub fn new(backend: Arc<dyn ReportBackend>) -> Self {
        Self { backend }
    }

    /// Download every attachment of `report` with the caller's token.
    pub async fn fetch_all(
        &self,
        report: &DailyReport,
        token: &str,
    ) -> Result<Vec<DownloadableMetadata>, AttachmentError> {
        if report.attachments.is_empty() {
            return Err(AttachmentError::NoAttachments);
        }

        let mut taken = HashSet::new();
        let mut files = Vec::with_capacity(report.attachments.len());
        for attachment in &report.attachments {
            let content = self.backend.download_attachment(&attachment.url, token).await?;
            let file = unique_file_name(&attachment.name, &mut taken);
            debug!(report_id = %report.id, file = %file, bytes = content.len(), "Downloaded attachment");
            files.push(DownloadableMetadata::new(file, content));
        }

        info!(report_id = %report.id, count = files.len(), "Fetched report attachments");
        Ok(files)
    }
}

/// Gzip-compressed tar archive of `files`.
pub fn bundle(files: &[DownloadableMetadata]) -> Result<Vec<u8>, AttachmentError> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut archive = tar::Builder::new(encoder);

    for file in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(file.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        archive.append_data(&mut header, &file.file, file.content.as_ref())?;
    }

    let mut encoder = archive.into_inner()?;
    encoder.flush()?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use async_trait::async_trait;
    use bytes::Bytes;
    use flate2::read::GzDecoder;
    use models::tenant::TenantDefinition;
    use uuid::Uuid;

    use super::*;
    use crate::services::report_templates::tests::sample_report;

    struct FakeBackend;

    #[async_trait]
    impl ReportBackend for FakeBackend {
        async fn fetch_tenant(&self, _token: &str) -> Result<TenantDefinition, BackendError> {
            Err(BackendError::NotFound)
        }

        async fn fetch_daily_report(
            &self,
            _id: Uuid,
            _token: &str,
        ) -> Result<Option<DailyReport>, BackendError> {
            Ok(None)
        }

        async fn download_attachment(&self, url: &str, token: &str) -> Result<Bytes, BackendError> {
            if token != "token" {
                return Err(BackendError::Unauthorized);
            }
            if url.ends_with("/missing") {
                return Err(BackendError::NotFound);
            }
            Ok(Bytes::from(format!("content of {url}")))
        }
    }

    fn report_with(names: &[(&str, &str)]) -> DailyReport {
        let mut report = sample_report();
        report.attachments = names
            .iter()
            .map(|(name, url)| {
                serde_json::from_value(serde_json::json!({
                    "name": name, "url": url, "kind": "DOCUMENT"
                }))
                .unwrap()
            })
            .collect();
        report
    }

    #[test]
    fn test_unique_file_names() {
        let mut taken = HashSet::new();
        assert_eq!(unique_file_name("photo.jpg", &mut taken), "photo.jpg");
        assert_eq!(unique_file_name("photo.jpg", &mut taken), "photo (1).jpg");
        assert_eq!(unique_file_name("photo.jpg", &mut taken), "photo (2).jpg");
        assert_eq!(unique_file_name("notes", &mut taken), "notes");
        assert_eq!(unique_file_name("notes", &mut taken), "notes (1)");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_file_name("  "), "attachment");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
    }

    #[tokio::test]
    async fn test_fetch_all_deduplicates_names() {
        let service = AttachmentService::new(Arc::new(FakeBackend));
        let report = report_with(&[("a.pdf", "https://f/1"), ("a.pdf", "https://f/2")]);
        let files = service.fetch_all(&report, "token").await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.file.as_str()).collect();
        assert_eq!(names, ["a.pdf", "a (1).pdf"]);
        assert_eq!(files[1].content, Bytes::from("content of https://f/2"));
    }

    #[tokio::test]
    async fn test_fetch_all_errors() {
        let service = AttachmentService::new(Arc::new(FakeBackend));
        let report = report_with(&[]);
        assert!(matches!(
            service.fetch_all(&report, "token").await,
            Err(AttachmentError::NoAttachments)
        ));

        let report = report_with(&[("a.pdf", "https://f/missing")]);
        assert!(matches!(
            service.fetch_all(&report, "token").await,
            Err(AttachmentError::Backend(BackendError::NotFound))
        ));
        let report = report_with(&[("a.pdf", "https://f/1")]);
        assert!(matches!(
            service.fetch_all(&report, "other").await,
            Err(AttachmentError::Backend(BackendError::Unauthorized))
        ));
    }

    #[test]
    fn test_bundle_is_a_readable_tar_gz() {
        let files = vec![
            DownloadableMetadata::new("photo.jpg", Bytes::from_static(b"jpeg")),
            DownloadableMetadata::new("photo (1).jpg", Bytes::from_static(b"more jpeg")),
        ];
        let archive = bundle(&files).unwrap();
        assert_eq!(&archive[..2], &[0x1f, 0x8b]);

        let mut reader = tar::Archive::new(GzDecoder::new(archive.as_slice()));
        let mut entries = Vec::new();
        for entry in reader.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().display().to_string();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            entries.push((path, content));
        }
        assert_eq!(
            entries,
            vec![
                ("photo.jpg".to_string(), "jpeg".to_string()),
                ("photo (1).jpg".to_string(), "more jpeg".to_string()),
            ]
        );
    }
}
