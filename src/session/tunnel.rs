//! Best-effort outbound tunnel for the callback listener.
//!
//! The loopback listener is only reachable by the approver through a
//! public URL, so wait mode shells out to `cloudflared`. The binary is
//! resolved from `PATH`, then from the local cache, and as a last resort
//! downloaded once into the cache. Any failure here is non-fatal: the
//! caller degrades to a manually pasted ciphertext.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};

/// How long to wait for the tunnel to report its public URL.
const TUNNEL_START_TIMEOUT: Duration = Duration::from_secs(30);

const TUNNEL_BINARY: &str = "cloudflared";
const DOWNLOAD_BASE: &str = "https://github.com/cloudflare/cloudflared/releases/latest/download";

/// A running tunnel process and its public URL.
pub struct Tunnel {
    pub public_url: String,
    child: Child,
}

impl Tunnel {
    /// Resolve the tunnel binary and expose `127.0.0.1:port` publicly.
    ///
    /// # Errors
    ///
    /// Returns `TunnelUnavailable` if the binary cannot be resolved or the
    /// process never reports a public URL. Callers treat this as a cue to
    /// fall back to manual ciphertext entry, not as a fatal error.
    pub async fn establish(port: u16) -> Result<Self> {
        let binary = resolve_binary().await?;
        let mut child = Command::new(&binary)
            .args([
                "tunnel",
                "--url",
                &format!("http://127.0.0.1:{port}"),
                "--no-autoupdate",
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::TunnelUnavailable {
                reason: format!("failed to spawn {TUNNEL_BINARY}: {e}"),
            })?;

        let stderr = child.stderr.take().ok_or_else(|| SessionError::TunnelUnavailable {
            reason: "tunnel process has no stderr".to_string(),
        })?;

        let mut lines = BufReader::new(stderr).lines();
        let url = tokio::time::timeout(TUNNEL_START_TIMEOUT, async {
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(url) = extract_public_url(&line) {
                    return Some(url);
                }
            }
            None
        })
        .await;

        match url {
            Ok(Some(public_url)) => {
                // Keep draining stderr so the child never blocks on a full pipe
                tokio::spawn(async move { while let Ok(Some(_)) = lines.next_line().await {} });
                debug!(url = %public_url, "Tunnel established");
                Ok(Self { public_url, child })
            }
            _ => {
                let _ = child.start_kill();
                Err(SessionError::TunnelUnavailable {
                    reason: "tunnel never reported a public URL".to_string(),
                }
                .into())
            }
        }
    }

    /// Kill the tunnel process and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(error = %e, "Failed to kill tunnel process");
        }
    }
}

/// Find a `https://*.trycloudflare.com` URL inside a log line.
fn extract_public_url(line: &str) -> Option<String> {
    let start = line.find("https://")?;
    let rest = &line[start..];
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '|' || c == '"')
        .unwrap_or(rest.len());
    let url = &rest[..end];
    if url.contains(".trycloudflare.com") {
        Some(url.to_string())
    } else {
        None
    }
}

/// Resolve the tunnel binary: `PATH`, then cache, then one-time download.
async fn resolve_binary() -> Result<PathBuf> {
    if let Some(path) = find_in_path() {
        return Ok(path);
    }

    let cached = cache_path();
    if cached.is_file() {
        return Ok(cached);
    }

    download_binary(&cached).await?;
    Ok(cached)
}

fn find_in_path() -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(TUNNEL_BINARY))
        .find(|candidate| candidate.is_file())
}

fn cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("sidekey")
        .join(TUNNEL_BINARY)
}

fn release_artifact() -> Option<&'static str> {
    if cfg!(all(target_os = "linux", target_arch = "x86_64")) {
        Some("cloudflared-linux-amd64")
    } else if cfg!(all(target_os = "linux", target_arch = "aarch64")) {
        Some("cloudflared-linux-arm64")
    } else {
        None
    }
}

async fn download_binary(destination: &PathBuf) -> Result<()> {
    let artifact = release_artifact().ok_or_else(|| SessionError::TunnelUnavailable {
        reason: format!("no prebuilt {TUNNEL_BINARY} for this platform; install it on PATH"),
    })?;

    let url = format!("{DOWNLOAD_BASE}/{artifact}");
    debug!(url = %url, "Downloading tunnel binary into cache");

    let unavailable = |reason: String| SessionError::TunnelUnavailable { reason };
    let response = reqwest::get(&url)
        .await
        .map_err(|e| unavailable(e.to_string()))?
        .error_for_status()
        .map_err(|e| unavailable(e.to_string()))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| unavailable(e.to_string()))?;

    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(destination, &bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(destination, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trycloudflare_urls_from_log_lines() {
        let line = "2026-01-01T00:00:00Z INF |  https://witty-otter.trycloudflare.com  |";
        assert_eq!(
            extract_public_url(line),
            Some("https://witty-otter.trycloudflare.com".to_string())
        );
    }

    #[test]
    fn ignores_unrelated_urls() {
        let line = "INF Visit https://developers.cloudflare.com for docs";
        assert_eq!(extract_public_url(line), None);
        assert_eq!(extract_public_url("no url here"), None);
    }

    #[test]
    fn cache_path_is_under_the_tool_cache_dir() {
        let path = cache_path();
        assert!(path.ends_with(PathBuf::from("sidekey").join(TUNNEL_BINARY)));
    }
}
