//! Durable per-role artifact store.
//!
//! One directory tree per role caches every certificate, request, and key
//! copy this machine has produced or received. The tree is the record used
//! for idempotency checks and the source for later distribution steps:
//!
//! ```text
//! <root>/ca/pki/{ca.crt,crl.pem}
//! <root>/server/pki/{reqs,issued}/*
//! <root>/server/openvpn/server/ta.key
//! <root>/clients/pki/{reqs,issued}/*
//! ```

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// The three machines this tool coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Ca,
    Server,
    Client,
}

impl Role {
    /// Subdirectory of the store root holding this role's cache.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Role::Ca => "ca",
            Role::Server => "server",
            Role::Client => "clients",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Handle on the store root; all paths are derived from it.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn role_dir(&self, role: Role) -> PathBuf {
        self.root.join(role.dir_name())
    }

    /// Cached copy of the public CA certificate.
    pub fn ca_cert(&self) -> PathBuf {
        self.role_dir(Role::Ca).join("pki").join("ca.crt")
    }

    /// Cached copy of the most recently generated CRL.
    pub fn crl(&self) -> PathBuf {
        self.role_dir(Role::Ca).join("pki").join("crl.pem")
    }

    /// Pending certificate requests for a server/client role.
    pub fn requests_dir(&self, role: Role) -> PathBuf {
        self.role_dir(role).join("pki").join("reqs")
    }

    /// Signed certificates for a server/client role, named by Common Name.
    pub fn issued_dir(&self, role: Role) -> PathBuf {
        self.role_dir(role).join("pki").join("issued")
    }

    /// Cached copy of the pre-shared TLS authentication key.
    pub fn ta_key(&self) -> PathBuf {
        self.role_dir(Role::Server)
            .join("openvpn")
            .join("server")
            .join("ta.key")
    }

    /// Copy an artifact into the store, creating parent directories.
    pub fn cache(&self, src: &Path, dst: &Path) -> Result<()> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create {}", parent.display()))?;
        }
        fs::copy(src, dst).context(format!(
            "Failed to cache {} as {}",
            src.display(),
            dst.display()
        ))?;
        Ok(())
    }

    /// Filename stems of the pending requests for a role, lexicographically
    /// sorted so selection is deterministic across filesystems.
    pub fn list_requests(&self, role: Role) -> Result<Vec<String>> {
        list_stems(&self.requests_dir(role), "req")
    }

    /// Filename stems of the signed certificates cached for a role, sorted.
    pub fn list_issued(&self, role: Role) -> Result<Vec<String>> {
        list_stems(&self.issued_dir(role), "crt")
    }

    /// Delete one role's cache, or the entire store. Irreversible.
    pub fn reset(&self, role: Option<Role>) -> Result<()> {
        let target = match role {
            Some(role) => self.role_dir(role),
            None => self.root.clone(),
        };
        if !target.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&target)
            .context(format!("Failed to delete {}", target.display()))
    }
}

fn list_stems(dir: &Path, extension: &str) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut stems = Vec::new();
    for entry in fs::read_dir(dir).context(format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_string());
            }
        }
    }
    stems.sort();
    Ok(stems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout() {
        let store = ArtifactStore::new("/var/lib/ovpn-pki");
        assert_eq!(
            store.ca_cert(),
            PathBuf::from("/var/lib/ovpn-pki/ca/pki/ca.crt")
        );
        assert_eq!(
            store.ta_key(),
            PathBuf::from("/var/lib/ovpn-pki/server/openvpn/server/ta.key")
        );
        assert_eq!(
            store.requests_dir(Role::Client),
            PathBuf::from("/var/lib/ovpn-pki/clients/pki/reqs")
        );
    }

    #[test]
    fn test_listing_is_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let reqs = store.requests_dir(Role::Client);
        fs::create_dir_all(&reqs).unwrap();
        fs::write(reqs.join("zoe.req"), b"").unwrap();
        fs::write(reqs.join("alice.req"), b"").unwrap();
        fs::write(reqs.join("notes.txt"), b"").unwrap();

        assert_eq!(store.list_requests(Role::Client).unwrap(), ["alice", "zoe"]);
    }

    #[test]
    fn test_listing_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(store.list_issued(Role::Server).unwrap().is_empty());
    }

    #[test]
    fn test_reset_single_role() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        fs::create_dir_all(store.issued_dir(Role::Client)).unwrap();
        fs::create_dir_all(store.role_dir(Role::Ca)).unwrap();

        store.reset(Some(Role::Client)).unwrap();
        assert!(!store.role_dir(Role::Client).exists());
        assert!(store.role_dir(Role::Ca).exists());

        // resetting an already-empty role is not an error
        store.reset(Some(Role::Client)).unwrap();
    }
}
