//! Storage service implementation using Apache OpenDAL.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use clinipay_shared::config::StorageProvider;
use clinipay_shared::types::{PaymentId, RefundId};
use opendal::{Operator, services};
use tracing::debug;

use super::config::StorageConfig;
use super::error::StorageError;
use super::proof::{PresignedUrl, ProofStore};

/// Storage service for refund proof documents.
pub struct StorageService {
    operator: Operator,
    config: StorageConfig,
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("provider", &self.config.provider.name())
            .field("max_file_size", &self.config.limits.max_file_size)
            .finish_non_exhaustive()
    }
}

impl StorageService {
    /// Create a new storage service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&config.provider)?;
        Ok(Self { operator, config })
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        let operator = match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            StorageProvider::AzureBlob {
                account,
                access_key,
                container,
            } => {
                let builder = services::Azblob::default()
                    .account_name(account)
                    .account_key(access_key)
                    .container(container);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
        };

        Ok(operator)
    }

    /// Validate an upload against config constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if file size or MIME type is invalid.
    pub fn validate_upload(&self, content_type: &str, size: u64) -> Result<(), StorageError> {
        self.config.limits.validate(content_type, size)
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

#[async_trait]
impl ProofStore for StorageService {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError> {
        let size = bytes.len();
        self.operator
            .write_with(key, bytes)
            .content_type(content_type)
            .await?;
        debug!(key, size, provider = self.config.provider.name(), "Stored object");
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Bytes, StorageError> {
        let buffer = self.operator.read(key).await?;
        Ok(buffer.to_bytes())
    }

    async fn presign_read(&self, key: &str, ttl: Duration) -> Result<PresignedUrl, StorageError> {
        let lifetime =
            chrono::Duration::from_std(ttl).map_err(|e| StorageError::configuration(e.to_string()))?;
        let presigned = self.operator.presign_read(key, ttl).await?;

        Ok(PresignedUrl {
            url: presigned.uri().to_string(),
            method: presigned.method().to_string(),
            expires_at: Utc::now() + lifetime,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.operator.delete(key).await?;
        Ok(())
    }
}

/// Storage key for a refund proof.
///
/// Format: `refunds/{payment_id}/{refund_id}/{sanitized_filename}`
#[must_use]
pub fn proof_key(payment_id: PaymentId, refund_id: RefundId, filename: &str) -> String {
    let mut name = sanitize_filename(filename);
    if name.trim_matches(['.', '_']).is_empty() {
        name = "proof".to_string();
    }
    format!("refunds/{payment_id}/{refund_id}/{name}")
}

/// Sanitize filename for storage key.
///
/// Only allows ASCII alphanumeric characters, dots, hyphens, and underscores.
/// Path separators become underscores.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_service(root: &std::path::Path) -> StorageService {
        let config = StorageConfig::new(StorageProvider::LocalFs {
            root: root.to_path_buf(),
        })
        .with_max_file_size(1024);
        StorageService::from_config(config).expect("should create service")
    }

    fn scratch_dir() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("clinipay-storage-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("invoice.pdf"), "invoice.pdf");
        assert_eq!(sanitize_filename("my file (1).pdf"), "my_file__1_.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("日本語.pdf"), "___.pdf");
    }

    #[test]
    fn test_proof_key() {
        let payment_id = PaymentId::new();
        let refund_id = RefundId::new();

        let key = proof_key(payment_id, refund_id, "bank transfer.pdf");
        assert_eq!(
            key,
            format!("refunds/{payment_id}/{refund_id}/bank_transfer.pdf")
        );

        let key = proof_key(payment_id, refund_id, "");
        assert!(key.ends_with("/proof"));
    }

    #[test]
    fn test_validate_upload() {
        let service = local_service(&scratch_dir());

        assert!(service.validate_upload("application/pdf", 512).is_ok());
        assert!(matches!(
            service.validate_upload("application/pdf", 2048),
            Err(StorageError::FileTooLarge { .. })
        ));
        assert!(matches!(
            service.validate_upload("application/pdf", 0),
            Err(StorageError::EmptyFile)
        ));
        assert!(matches!(
            service.validate_upload("application/x-executable", 10),
            Err(StorageError::InvalidMimeType { .. })
        ));
    }

    #[tokio::test]
    async fn test_put_read_delete_on_local_fs() {
        let root = scratch_dir();
        let service = local_service(&root);
        let key = "refunds/p/r/proof.pdf";

        service
            .put(key, Bytes::from_static(b"%PDF-1.7"), "application/pdf")
            .await
            .unwrap();
        assert_eq!(service.read(key).await.unwrap(), Bytes::from_static(b"%PDF-1.7"));

        service.delete(key).await.unwrap();
        assert!(matches!(
            service.read(key).await,
            Err(StorageError::NotFound { .. })
        ));

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_local_fs_cannot_presign() {
        let service = local_service(&scratch_dir());
        let result = service
            .presign_read("refunds/p/r/proof.pdf", Duration::from_secs(300))
            .await;
        assert!(matches!(result, Err(StorageError::PresignNotSupported)));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn service(max_size: u64) -> StorageService {
        let config = StorageConfig::new(StorageProvider::LocalFs {
            root: "./test".into(),
        })
        .with_max_file_size(max_size);
        StorageService::from_config(config).expect("should create service")
    }

    // MIME Type Validation
    // Only MIME types in the allowed list are accepted.
    proptest! {
        #[test]
        fn prop_mime_type_validation(mime_type in "[a-z]+/[a-z0-9-]+") {
            let service = service(StorageConfig::DEFAULT_MAX_FILE_SIZE);

            let result = service.validate_upload(&mime_type, 1024);
            let is_allowed = service.config().limits.is_mime_type_allowed(&mime_type);

            if is_allowed {
                prop_assert!(result.is_ok(), "Expected Ok for allowed MIME type");
            } else {
                let is_invalid_mime = matches!(result, Err(StorageError::InvalidMimeType { .. }));
                prop_assert!(is_invalid_mime, "Expected InvalidMimeType error");
            }
        }
    }

    // File Size Validation
    // Uploads above the configured limit are rejected.
    proptest! {
        #[test]
        fn prop_file_size_validation(
            max_size in 1024u64..10_000_000,
            file_size in 1u64..20_000_000,
        ) {
            let result = service(max_size).validate_upload("application/pdf", file_size);

            if file_size <= max_size {
                prop_assert!(result.is_ok(), "Expected Ok for valid file size");
            } else {
                let is_too_large = matches!(result, Err(StorageError::FileTooLarge { .. }));
                prop_assert!(is_too_large, "Expected FileTooLarge error");
            }
        }
    }

    // Proof keys always have four segments and never escape their prefix.
    proptest! {
        #[test]
        fn prop_proof_key_format(filename in ".*") {
            let payment_id = PaymentId::new();
            let refund_id = RefundId::new();

            let key = proof_key(payment_id, refund_id, &filename);
            let parts: Vec<&str> = key.split('/').collect();

            prop_assert_eq!(parts.len(), 4);
            prop_assert_eq!(parts[0], "refunds");
            prop_assert_eq!(parts[1], payment_id.to_string());
            prop_assert_eq!(parts[2], refund_id.to_string());
            prop_assert!(parts[3] != "." && parts[3] != "..");
        }
    }

    // Sanitized filename only contains safe characters
    proptest! {
        #[test]
        fn prop_sanitized_filename_safe_chars(filename in ".*") {
            let sanitized = sanitize_filename(&filename);

            for c in sanitized.chars() {
                let is_safe = c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_';
                prop_assert!(is_safe, "Unexpected character in sanitized filename: {}", c);
            }
        }
    }
}
