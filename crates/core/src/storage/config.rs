//! Storage configuration types.

use clinipay_shared::config::{StorageProvider, StorageSettings};

use super::error::StorageError;

/// Size and type limits for uploaded documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    /// Maximum file size in bytes.
    pub max_file_size: u64,
    /// Allowed MIME types for upload.
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: StorageConfig::DEFAULT_MAX_FILE_SIZE,
            allowed_mime_types: StorageConfig::default_mime_types(),
        }
    }
}

impl UploadLimits {
    /// Check if a MIME type is allowed. Parameters such as `; charset=` are
    /// ignored.
    #[must_use]
    pub fn is_mime_type_allowed(&self, mime_type: &str) -> bool {
        let essence = mime_type.split(';').next().unwrap_or_default().trim();
        self.allowed_mime_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(essence))
    }

    /// Validate an upload.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is empty, too large or of a disallowed type.
    pub fn validate(&self, content_type: &str, size: u64) -> Result<(), StorageError> {
        if size == 0 {
            return Err(StorageError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(StorageError::file_too_large(size, self.max_file_size));
        }

        if !self.is_mime_type_allowed(content_type) {
            return Err(StorageError::invalid_mime_type(content_type));
        }

        Ok(())
    }
}

/// Storage service configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage provider configuration.
    pub provider: StorageProvider,
    /// Upload limits.
    pub limits: UploadLimits,
}

impl StorageConfig {
    /// Default max file size: 10MB.
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

    /// Create a new storage config with default settings.
    #[must_use]
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            limits: UploadLimits::default(),
        }
    }

    /// Build from application settings.
    #[must_use]
    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self {
            provider: settings.provider.clone(),
            limits: UploadLimits {
                max_file_size: settings.max_file_size,
                allowed_mime_types: settings.allowed_mime_types.clone(),
            },
        }
    }

    /// Set maximum file size.
    #[must_use]
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.limits.max_file_size = size;
        self
    }

    /// Set allowed MIME types.
    #[must_use]
    pub fn with_allowed_mime_types(mut self, types: Vec<String>) -> Self {
        self.limits.allowed_mime_types = types;
        self
    }

    /// Default allowed MIME types for refund proofs.
    #[must_use]
    pub fn default_mime_types() -> Vec<String> {
        vec![
            "application/pdf".to_string(),
            "image/png".to_string(),
            "image/jpeg".to_string(),
            "image/webp".to_string(),
        ]
    }
}
