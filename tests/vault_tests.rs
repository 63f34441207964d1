//! Vault behavior through the public API, file key provider included.

use sidekey::session::WalletSession;
use sidekey::vault::{self, FileKeyProvider, KeyProvider, StaticKeyProvider, Vault};
use tempfile::TempDir;

#[test]
fn file_backed_vault_round_trips_across_reopens() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();

    {
        let vault = Vault::open(root.clone());
        vault.store("sessions/ops.json.enc", b"secret material").unwrap();
    }

    // A fresh open reuses the generated key file
    let vault = Vault::open(root.clone());
    let loaded = vault.load("sessions/ops.json.enc").unwrap().unwrap();
    assert_eq!(loaded, b"secret material");
    assert!(root.join(vault::KEY_FILE).is_file());
}

#[cfg(unix)]
#[test]
fn generated_key_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let provider = FileKeyProvider::new(dir.path().join("keys").join(vault::KEY_FILE));
    let first = provider.key().unwrap();

    let mode = std::fs::metadata(dir.path().join("keys").join(vault::KEY_FILE))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);

    // Stable across calls
    assert_eq!(provider.key().unwrap(), first);
}

#[test]
fn sessions_never_hit_disk_in_clear_text() {
    let dir = TempDir::new().unwrap();
    let vault = Vault::with_provider(
        dir.path().to_path_buf(),
        Box::new(StaticKeyProvider([7u8; 32])),
    );

    let session = WalletSession::fixture("ops", 137);
    session.save(&vault).unwrap();

    let raw = std::fs::read(dir.path().join("sessions").join("ops.json.enc")).unwrap();
    let raw_text = String::from_utf8_lossy(&raw);
    assert!(!raw_text.contains("fixture-session-token"));
    assert!(!raw_text.contains(&session.address));

    let loaded = WalletSession::load(&vault, "ops").unwrap();
    assert_eq!(loaded.session_token, session.session_token);
}

#[test]
fn wrong_key_fails_closed() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();

    let vault = Vault::with_provider(root.clone(), Box::new(StaticKeyProvider([1u8; 32])));
    vault.store("sessions/ops.json.enc", b"payload").unwrap();

    let other = Vault::with_provider(root, Box::new(StaticKeyProvider([2u8; 32])));
    assert!(other.load("sessions/ops.json.enc").is_err());
}

#[test]
fn listing_reports_stored_wallets() {
    let dir = TempDir::new().unwrap();
    let vault = Vault::with_provider(
        dir.path().to_path_buf(),
        Box::new(StaticKeyProvider([3u8; 32])),
    );

    WalletSession::fixture("alpha", 137).save(&vault).unwrap();
    WalletSession::fixture("beta", 137).save(&vault).unwrap();

    let wallets = vault.list(vault::SESSIONS_DIR).unwrap();
    assert_eq!(wallets, vec!["alpha", "beta"]);
}
