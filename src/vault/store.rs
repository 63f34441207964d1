//! Authenticated encryption at rest and the one-file-per-entity store.

use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::keys::{restrict_dir, restrict_file, KeyProvider};
use crate::error::{Result, VaultError};

/// One encrypted record: per-call random nonce plus ciphertext with the
/// GCM authentication tag appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSecret {
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

/// On-disk JSON shape of a [`VaultSecret`].
#[derive(Serialize, Deserialize)]
struct VaultRecord {
    nonce: String,
    data: String,
}

impl VaultSecret {
    fn to_record(&self) -> VaultRecord {
        VaultRecord {
            nonce: B64.encode(self.nonce),
            data: B64.encode(&self.ciphertext),
        }
    }

    fn from_record(record: &VaultRecord, path: &Path) -> Result<Self> {
        let malformed = |reason: String| VaultError::MalformedRecord {
            path: path.display().to_string(),
            reason,
        };
        let nonce_bytes = B64
            .decode(&record.nonce)
            .map_err(|e| malformed(e.to_string()))?;
        let nonce: [u8; 12] = nonce_bytes
            .as_slice()
            .try_into()
            .map_err(|_| malformed(format!("expected 12-byte nonce, found {}", nonce_bytes.len())))?;
        let ciphertext = B64
            .decode(&record.data)
            .map_err(|e| malformed(e.to_string()))?;
        Ok(Self { nonce, ciphertext })
    }
}

/// Encrypted credential store rooted at the data directory.
///
/// Layout: `<root>/vault.key`, `<root>/sessions/<wallet>.json.enc`,
/// `<root>/requests/<uuid>.json.enc`. Every file is individually
/// encrypted; nothing secret touches disk as clear text.
pub struct Vault {
    root: PathBuf,
    provider: Box<dyn KeyProvider>,
}

impl Vault {
    /// Open the vault at `root` with a file-backed machine key.
    #[must_use]
    pub fn open(root: PathBuf) -> Self {
        let key_path = root.join(super::KEY_FILE);
        Self {
            provider: Box::new(super::keys::FileKeyProvider::new(key_path)),
            root,
        }
    }

    /// Open the vault with an injected key provider.
    #[must_use]
    pub fn with_provider(root: PathBuf, provider: Box<dyn KeyProvider>) -> Self {
        Self { root, provider }
    }

    /// Vault root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        let key = self.provider.key()?;
        Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)))
    }

    /// Encrypt a plaintext under the vault key with a fresh random nonce.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be obtained or encryption fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<VaultSecret> {
        let cipher = self.cipher()?;
        let mut nonce = [0u8; 12];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| VaultError::EncryptionFailure)?;
        Ok(VaultSecret { nonce, ciphertext })
    }

    /// Decrypt a record. Fails closed: a wrong key or any bit flipped in
    /// the ciphertext or tag yields `DecryptionFailure`, never corrupted
    /// plaintext.
    ///
    /// # Errors
    ///
    /// Returns `DecryptionFailure` if authentication fails.
    pub fn decrypt(&self, secret: &VaultSecret) -> Result<Vec<u8>> {
        let cipher = self.cipher()?;
        cipher
            .decrypt(Nonce::from_slice(&secret.nonce), secret.ciphertext.as_ref())
            .map_err(|_| VaultError::DecryptionFailure.into())
    }

    /// Encrypt and persist one entity at `relative` under the vault root.
    ///
    /// The record is written to a temp file and atomically renamed into
    /// place, so a concurrent reader never observes a torn file.
    ///
    /// # Errors
    ///
    /// Returns an error on encryption or filesystem failure.
    pub fn store(&self, relative: &str, plaintext: &[u8]) -> Result<()> {
        let secret = self.encrypt(plaintext)?;
        let json = serde_json::to_vec_pretty(&secret.to_record())?;

        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(VaultError::Io)?;
            restrict_dir(parent)?;
        }

        let mut tmp = path.clone();
        tmp.set_extension(format!("tmp{}", std::process::id()));
        fs::write(&tmp, &json).map_err(VaultError::Io)?;
        restrict_file(&tmp)?;
        fs::rename(&tmp, &path).map_err(VaultError::Io)?;
        Ok(())
    }

    /// Load and decrypt the entity at `relative`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is malformed or fails to decrypt.
    pub fn load(&self, relative: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(relative);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read(&path).map_err(VaultError::Io)?;
        let record: VaultRecord =
            serde_json::from_slice(&contents).map_err(|e| VaultError::MalformedRecord {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let secret = VaultSecret::from_record(&record, &path)?;
        Ok(Some(self.decrypt(&secret)?))
    }

    /// Remove the entity at `relative` if it exists.
    pub fn remove(&self, relative: &str) -> Result<()> {
        let path = self.root.join(relative);
        if path.exists() {
            fs::remove_file(&path).map_err(VaultError::Io)?;
        }
        Ok(())
    }

    /// List entity file stems under a vault subdirectory.
    pub fn list(&self, subdir: &str) -> Result<Vec<String>> {
        let dir = self.root.join(subdir);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).map_err(VaultError::Io)? {
            let entry = entry.map_err(VaultError::Io)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_suffix(".json.enc") {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Relative path of a wallet session record.
#[must_use]
pub fn session_path(wallet: &str) -> String {
    format!("{}/{wallet}.json.enc", super::SESSIONS_DIR)
}

/// Relative path of a pending request record.
#[must_use]
pub fn request_path(request_id: &str) -> String {
    format!("{}/{request_id}.json.enc", super::REQUESTS_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::StaticKeyProvider;
    use tempfile::TempDir;

    fn test_vault(dir: &TempDir) -> Vault {
        Vault::with_provider(
            dir.path().to_path_buf(),
            Box::new(StaticKeyProvider([7u8; 32])),
        )
    }

    // -------------------------------------------------------------------------
    // Encrypt / Decrypt
    // -------------------------------------------------------------------------

    #[test]
    fn round_trips_arbitrary_bytes() {
        let dir = TempDir::new().unwrap();
        let vault = test_vault(&dir);

        for plaintext in [&b""[..], b"secret", &[0u8, 255, 127, 1]] {
            let secret = vault.encrypt(plaintext).unwrap();
            assert_eq!(vault.decrypt(&secret).unwrap(), plaintext);
        }
    }

    #[test]
    fn nonces_are_fresh_per_call() {
        let dir = TempDir::new().unwrap();
        let vault = test_vault(&dir);

        let a = vault.encrypt(b"same input").unwrap();
        let b = vault.encrypt(b"same input").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn tampered_tag_fails_closed() {
        let dir = TempDir::new().unwrap();
        let vault = test_vault(&dir);

        let mut secret = vault.encrypt(b"payload").unwrap();
        // The GCM tag occupies the final 16 bytes; flip one bit in it
        let last = secret.ciphertext.len() - 1;
        secret.ciphertext[last] ^= 0x01;

        assert!(vault.decrypt(&secret).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let dir = TempDir::new().unwrap();
        let vault = test_vault(&dir);

        let mut secret = vault.encrypt(b"payload").unwrap();
        secret.ciphertext[0] ^= 0x80;

        assert!(vault.decrypt(&secret).is_err());
    }

    #[test]
    fn wrong_key_fails_closed() {
        let dir = TempDir::new().unwrap();
        let vault = test_vault(&dir);
        let secret = vault.encrypt(b"payload").unwrap();

        let other = Vault::with_provider(
            dir.path().to_path_buf(),
            Box::new(StaticKeyProvider([8u8; 32])),
        );
        assert!(other.decrypt(&secret).is_err());
    }

    // -------------------------------------------------------------------------
    // Entity store
    // -------------------------------------------------------------------------

    #[test]
    fn store_load_remove_cycle() {
        let dir = TempDir::new().unwrap();
        let vault = test_vault(&dir);
        let path = session_path("ops");

        vault.store(&path, b"{\"wallet\":\"ops\"}").unwrap();
        let loaded = vault.load(&path).unwrap().expect("record present");
        assert_eq!(loaded, b"{\"wallet\":\"ops\"}");

        vault.remove(&path).unwrap();
        assert!(vault.load(&path).unwrap().is_none());
    }

    #[test]
    fn stored_files_are_not_clear_text() {
        let dir = TempDir::new().unwrap();
        let vault = test_vault(&dir);
        let path = session_path("ops");

        vault.store(&path, b"very-secret-token").unwrap();
        let raw = std::fs::read(dir.path().join(&path)).unwrap();
        let raw_str = String::from_utf8_lossy(&raw);
        assert!(!raw_str.contains("very-secret-token"));
    }

    #[test]
    fn overwrite_replaces_record_wholesale() {
        let dir = TempDir::new().unwrap();
        let vault = test_vault(&dir);
        let path = session_path("ops");

        vault.store(&path, b"first").unwrap();
        vault.store(&path, b"second").unwrap();
        assert_eq!(vault.load(&path).unwrap().unwrap(), b"second");
    }

    #[test]
    fn list_returns_sorted_entity_stems() {
        let dir = TempDir::new().unwrap();
        let vault = test_vault(&dir);

        vault.store(&session_path("zeta"), b"z").unwrap();
        vault.store(&session_path("alpha"), b"a").unwrap();

        let names = vault.list(crate::vault::SESSIONS_DIR).unwrap();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
