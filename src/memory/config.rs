//! Configuration for memory-mapped struct storage

use crate::config::DEFAULT_FILE_PERMISSIONS;

/// Options applied to file-backed mappings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmapConfig {
    /// Unix permissions used when the backing file is created
    pub permissions: u32,
    /// Delete the backing file when the mapping is released
    pub remove_on_free: bool,
    /// Flush dirty pages to the file before unmapping
    pub flush_on_free: bool,
}

impl Default for MmapConfig {
    fn default() -> Self {
        Self {
            permissions: DEFAULT_FILE_PERMISSIONS,
            remove_on_free: false,
            flush_on_free: true,
        }
    }
}

impl MmapConfig {
    /// Create a configuration with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set file permissions
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Delete the file when the mapping is released
    pub fn with_remove_on_free(mut self, remove: bool) -> Self {
        self.remove_on_free = remove;
        self
    }

    /// Flush before unmapping
    pub fn with_flush_on_free(mut self, flush: bool) -> Self {
        self.flush_on_free = flush;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::StructError;

        if self.permissions > 0o7777 {
            return Err(StructError::invalid_argument(
                "permissions",
                format!("{:#o} is not a valid permission mode", self.permissions),
            ));
        }

        // Mappings are always read/write
        if self.permissions & 0o600 != 0o600 {
            return Err(StructError::invalid_argument(
                "permissions",
                "Owner must have read and write permission",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = MmapConfig::default();
        assert_eq!(config.permissions, 0o644);
        assert!(!config.remove_on_free);
        assert!(config.flush_on_free);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = MmapConfig::new()
            .with_permissions(0o600)
            .with_remove_on_free(true)
            .with_flush_on_free(false);

        assert_eq!(config.permissions, 0o600);
        assert!(config.remove_on_free);
        assert!(!config.flush_on_free);
    }

    #[test]
    fn test_config_validation() {
        assert!(MmapConfig::new().with_permissions(0o444).validate().is_err());
        assert!(MmapConfig::new().with_permissions(0o10000).validate().is_err());
        assert!(MmapConfig::new().with_permissions(0o700).validate().is_ok());
    }
}
