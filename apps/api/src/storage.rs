use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;

/// Résumé files in S3 (or MinIO when `S3_ENDPOINT` is set).
#[derive(Clone)]
pub struct ResumeStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

/// `resumes/<candidate>/<uuid>.<ext>`, keeping only a safe lowercase extension.
pub fn resume_key(candidate_id: Uuid, file_name: &str) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string());
    format!("resumes/{candidate_id}/{}.{ext}", Uuid::new_v4().simple())
}

impl ResumeStore {
    /// `None` when no bucket is configured; résumé upload is then unavailable.
    pub async fn from_config(config: &Config) -> Option<Self> {
        let bucket = config.s3_bucket.clone()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.agent.aws_region.clone()));
        if let Some(endpoint) = &config.s3_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.s3_endpoint.is_some())
            .build();

        info!("Résumé storage using bucket {bucket}");
        Some(Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket,
        })
    }

    pub async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("upload of {key} failed: {e}")))?;
        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }

    pub async fn download(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("download of {key} failed: {e}")))?;
        let data = object
            .body
            .collect()
            .await
            .map_err(|e| AppError::S3(format!("reading {key} failed: {e}")))?;
        Ok(data.into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_key_keeps_safe_extension() {
        let id = Uuid::new_v4();
        let key = resume_key(id, "My CV.PDF");
        assert!(key.starts_with(&format!("resumes/{id}/")));
        assert!(key.ends_with(".pdf"));
    }

    #[test]
    fn test_resume_key_rejects_odd_extensions() {
        let id = Uuid::new_v4();
        assert!(resume_key(id, "noext").ends_with(".bin"));
        assert!(resume_key(id, "evil.p/df").ends_with(".bin"));
    }
}
