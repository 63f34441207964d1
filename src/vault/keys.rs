//! Vault key material.
//!
//! The vault key is process-wide state constructed once at startup and
//! injected, rather than a lazily-initialized global, so tests can swap in
//! an in-memory key.

use std::fs;
use std::path::PathBuf;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Result, VaultError};

/// Supplies the single 256-bit symmetric vault key.
pub trait KeyProvider: Send + Sync {
    /// Return the vault key, creating it if this provider owns creation.
    fn key(&self) -> Result<[u8; 32]>;
}

/// Key provider backed by a file, generated lazily on first use.
///
/// The key file is written with owner-only permissions; its parent
/// directory is created with owner-only permissions as well.
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_existing(&self) -> Result<Option<[u8; 32]>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path).map_err(VaultError::Io)?;
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            VaultError::MalformedRecord {
                path: self.path.display().to_string(),
                reason: format!("expected 32-byte key, found {} bytes", bytes.len()),
            }
        })?;
        Ok(Some(key))
    }

    fn generate(&self) -> Result<[u8; 32]> {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(VaultError::Io)?;
            restrict_dir(parent)?;
        }
        fs::write(&self.path, key).map_err(VaultError::Io)?;
        restrict_file(&self.path)?;
        Ok(key)
    }
}

impl KeyProvider for FileKeyProvider {
    fn key(&self) -> Result<[u8; 32]> {
        match self.read_existing()? {
            Some(key) => Ok(key),
            None => self.generate(),
        }
    }
}

/// Fixed in-memory key for tests.
#[cfg(any(test, feature = "testkit"))]
pub struct StaticKeyProvider(pub [u8; 32]);

#[cfg(any(test, feature = "testkit"))]
impl KeyProvider for StaticKeyProvider {
    fn key(&self) -> Result<[u8; 32]> {
        Ok(self.0)
    }
}

/// Restrict a file to owner read/write.
pub(crate) fn restrict_file(path: &std::path::Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms).map_err(VaultError::Io)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Restrict a directory to owner access.
pub(crate) fn restrict_dir(path: &std::path::Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o700);
        fs::set_permissions(path, perms).map_err(VaultError::Io)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_provider_generates_key_lazily() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.key");
        assert!(!path.exists());

        let provider = FileKeyProvider::new(path.clone());
        let key = provider.key().expect("key generation");
        assert!(path.exists());

        // Second read returns the same key, not a fresh one
        let again = provider.key().expect("key read");
        assert_eq!(key, again);
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.key");
        FileKeyProvider::new(path.clone()).key().expect("key");

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn truncated_key_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.key");
        std::fs::write(&path, [0u8; 16]).unwrap();

        let result = FileKeyProvider::new(path).key();
        assert!(result.is_err());
    }
}
