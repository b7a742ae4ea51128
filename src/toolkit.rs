//! External toolkit adapters.
//!
//! All cryptography is delegated to external programs: easy-rsa for the PKI
//! operations, the openssl and openvpn binaries for Diffie-Hellman parameters
//! and the pre-shared key, and `openssl x509` for subject introspection. The
//! workflow engine only ever talks to the [`Toolkit`] and [`ServiceControl`]
//! traits, so tests can substitute fakes and no business logic depends on how
//! commands are spawned.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::store::Role;
use crate::subject::Subject;

/// The two certificate kinds the signing toolkit distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertKind {
    Server,
    Client,
}

impl CertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertKind::Server => "server",
            CertKind::Client => "client",
        }
    }

    /// The store role holding this kind's artifacts.
    pub fn role(&self) -> Role {
        match self {
            CertKind::Server => Role::Server,
            CertKind::Client => Role::Client,
        }
    }
}

/// Narrow process-invocation seam: spawn a program, capture its output,
/// turn a non-zero exit into an error carrying the program name and stderr.
pub struct CommandRunner;

impl CommandRunner {
    pub fn invoke(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<String> {
        let mut command = Command::new(program);
        command.args(args);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .context(format!("Failed to run '{}'; is it installed?", program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("'{}' failed: {}", program, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Capability surface the workflow engine consumes.
pub trait Toolkit {
    /// The working PKI root maintained by the toolkit.
    fn pki_dir(&self) -> PathBuf;

    fn init_pki(&self) -> Result<()>;
    fn build_ca(&self) -> Result<()>;

    /// Generate a keypair and request for `name`, without a passphrase.
    fn gen_req(&self, name: &str) -> Result<()>;

    /// Import an externally produced request under `name`.
    fn import_req(&self, req_path: &Path, name: &str) -> Result<()>;

    /// Sign an imported request as a server or client certificate.
    fn sign_req(&self, kind: CertKind, name: &str) -> Result<()>;

    fn revoke(&self, name: &str) -> Result<()>;
    fn gen_crl(&self) -> Result<()>;

    /// Generate Diffie-Hellman parameters of `bits` to `out`.
    fn gen_dh(&self, bits: u32, out: &Path) -> Result<()>;

    /// Generate a pre-shared authentication key to `out`.
    fn gen_secret(&self, out: &Path) -> Result<()>;

    /// Read the subject of a certificate via the toolkit's text output.
    fn read_subject(&self, cert: &Path) -> Result<Subject>;
}

/// Production toolkit shelling out to easy-rsa, openssl, and openvpn.
pub struct EasyRsa {
    runner: CommandRunner,
    dir: PathBuf,
}

impl EasyRsa {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            runner: CommandRunner,
            dir: dir.into(),
        }
    }

    fn easyrsa(&self, args: &[&str]) -> Result<String> {
        let mut full = vec!["--batch"];
        full.extend_from_slice(args);
        self.runner.invoke("easyrsa", &full, Some(&self.dir))
    }
}

impl Toolkit for EasyRsa {
    fn pki_dir(&self) -> PathBuf {
        self.dir.join("pki")
    }

    fn init_pki(&self) -> Result<()> {
        self.easyrsa(&["init-pki"]).map(|_| ())
    }

    fn build_ca(&self) -> Result<()> {
        self.easyrsa(&["build-ca", "nopass"]).map(|_| ())
    }

    fn gen_req(&self, name: &str) -> Result<()> {
        self.easyrsa(&["gen-req", name, "nopass"]).map(|_| ())
    }

    fn import_req(&self, req_path: &Path, name: &str) -> Result<()> {
        let req = req_path
            .to_str()
            .context("Request path must be valid UTF-8")?;
        self.easyrsa(&["import-req", req, name]).map(|_| ())
    }

    fn sign_req(&self, kind: CertKind, name: &str) -> Result<()> {
        self.easyrsa(&["sign-req", kind.as_str(), name]).map(|_| ())
    }

    fn revoke(&self, name: &str) -> Result<()> {
        self.easyrsa(&["revoke", name]).map(|_| ())
    }

    fn gen_crl(&self) -> Result<()> {
        self.easyrsa(&["gen-crl"]).map(|_| ())
    }

    fn gen_dh(&self, bits: u32, out: &Path) -> Result<()> {
        let out = out.to_str().context("Output path must be valid UTF-8")?;
        self.runner
            .invoke("openssl", &["dhparam", "-out", out, &bits.to_string()], None)
            .map(|_| ())
    }

    fn gen_secret(&self, out: &Path) -> Result<()> {
        let out = out.to_str().context("Output path must be valid UTF-8")?;
        self.runner
            .invoke("openvpn", &["--genkey", "secret", out], None)
            .map(|_| ())
    }

    fn read_subject(&self, cert: &Path) -> Result<Subject> {
        let cert = cert.to_str().context("Certificate path must be valid UTF-8")?;
        let output = self
            .runner
            .invoke("openssl", &["x509", "-in", cert, "-noout", "-subject"], None)?;
        Subject::parse(&output)
            .context(format!("Failed to parse subject of {}", cert))
    }
}

/// Host service manager boundary.
pub trait ServiceControl {
    fn restart(&self, unit: &str) -> Result<()>;
}

/// systemd implementation.
pub struct Systemctl {
    runner: CommandRunner,
}

impl Systemctl {
    pub fn new() -> Self {
        Self {
            runner: CommandRunner,
        }
    }
}

impl Default for Systemctl {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceControl for Systemctl {
    fn restart(&self, unit: &str) -> Result<()> {
        self.runner
            .invoke("systemctl", &["restart", unit], None)
            .map(|_| ())
    }
}
