//! Distribution and revocation coordinator.
//!
//! Implements the multi-machine handoff steps: installing signed
//! certificates back onto the role that requested them, rewriting the
//! sample OpenVPN configuration into a working profile, and applying a
//! fresh CRL to the running server. Every missing upstream artifact is a
//! fail-fast precondition error; installs that already happened are left
//! in place when a later step fails.

use anyhow::{anyhow, ensure, Context, Result};
use colored::Colorize;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::configs::AppConfig;
use crate::context::OpContext;
use crate::prompt::Prompt;
use crate::store::{ArtifactStore, Role};
use crate::toolkit::{CertKind, ServiceControl, Toolkit};

/// Fallback OpenVPN port for empty or zero operator input.
const DEFAULT_VPN_PORT: u16 = 1194;

/// Copy an artifact into a configuration directory with the given mode,
/// taking root ownership when running privileged.
pub(crate) fn install(src: &Path, dst: &Path, mode: u32) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
    }
    fs::copy(src, dst).context(format!(
        "Failed to install {} as {}",
        src.display(),
        dst.display()
    ))?;
    fs::set_permissions(dst, fs::Permissions::from_mode(mode))
        .context(format!("Failed to set permissions on {}", dst.display()))?;
    if unsafe { libc::geteuid() } == 0 {
        std::os::unix::fs::chown(dst, Some(0), Some(0))
            .context(format!("Failed to set ownership on {}", dst.display()))?;
    }
    Ok(())
}

/// Install a signed certificate back onto its originating role.
pub fn pass_back(
    ctx: &OpContext,
    config: &AppConfig,
    store: &ArtifactStore,
    toolkit: &dyn Toolkit,
    prompt: &mut dyn Prompt,
    kind: CertKind,
) -> Result<()> {
    match kind {
        CertKind::Server => pass_back_server(ctx, config, store, toolkit),
        CertKind::Client => pass_back_client(ctx, config, store, toolkit, prompt),
    }
}

fn pass_back_server(
    _ctx: &OpContext,
    config: &AppConfig,
    store: &ArtifactStore,
    toolkit: &dyn Toolkit,
) -> Result<()> {
    let ca = store.ca_cert();
    ensure!(
        ca.exists(),
        "CA certificate not found at {}; run setup-ca first",
        ca.display()
    );

    let issued = store.list_issued(Role::Server)?;
    ensure!(
        !issued.is_empty(),
        "no server certificates found in {}; sign the server request first",
        store.issued_dir(Role::Server).display()
    );
    let name = &issued[0];

    let key = toolkit
        .pki_dir()
        .join("private")
        .join(format!("{}.key", name));
    ensure!(
        key.exists(),
        "private key for '{}' not found at {}",
        name,
        key.display()
    );

    let cert = store.issued_dir(Role::Server).join(format!("{}.crt", name));
    let dir = &config.server_config_dir;
    install(&cert, &dir.join(format!("{}.crt", name)), 0o600)?;
    install(&key, &dir.join(format!("{}.key", name)), 0o600)?;
    println!(
        "{} Server certificate and key for '{}' installed in {}",
        "✓".green(),
        name,
        dir.display()
    );
    Ok(())
}

fn pass_back_client(
    _ctx: &OpContext,
    config: &AppConfig,
    store: &ArtifactStore,
    toolkit: &dyn Toolkit,
    prompt: &mut dyn Prompt,
) -> Result<()> {
    let ca = store.ca_cert();
    ensure!(
        ca.exists(),
        "CA certificate not found at {}; transfer it from the CA host first",
        ca.display()
    );

    let issued = store.list_issued(Role::Client)?;
    ensure!(
        !issued.is_empty(),
        "no client certificates found in {}",
        store.issued_dir(Role::Client).display()
    );

    let ta = store.ta_key();
    ensure!(
        ta.exists(),
        "TLS auth key not found at {}; run setup-server on the server host first",
        ta.display()
    );

    let name = if issued.len() == 1 {
        issued[0].clone()
    } else {
        let choice = prompt.choose("Select the client certificate to install", &issued)?;
        issued[choice].clone()
    };

    let cert = store.issued_dir(Role::Client).join(format!("{}.crt", name));
    let dir = &config.client_config_dir;
    install(&ca, &dir.join("ca.crt"), 0o644)?;
    install(&cert, &dir.join(format!("{}.crt", name)), 0o600)?;
    install(&ta, &dir.join("ta.key"), 0o600)?;

    // Mirror the signed certificate into the working PKI so later toolkit
    // operations on this machine see the identity as issued.
    let mirror = toolkit.pki_dir().join("issued").join(format!("{}.crt", name));
    if !mirror.exists() {
        store.cache(&cert, &mirror)?;
    }

    println!(
        "{} Client artifacts for '{}' installed in {}",
        "✓".green(),
        name,
        dir.display()
    );
    Ok(())
}

/// Rewrite a sample configuration into a working profile.
pub fn generate_profile(
    ctx: &OpContext,
    config: &AppConfig,
    store: &ArtifactStore,
    toolkit: &dyn Toolkit,
    prompt: &mut dyn Prompt,
    kind: CertKind,
) -> Result<()> {
    ctx.require_privilege("Generating profiles")?;
    match kind {
        CertKind::Server => generate_server_profile(config, store),
        CertKind::Client => generate_client_profile(config, store, toolkit, prompt),
    }
}

fn generate_server_profile(config: &AppConfig, store: &ArtifactStore) -> Result<()> {
    let issued = store.list_issued(Role::Server)?;
    ensure!(
        !issued.is_empty(),
        "no server certificates found in {}; sign and pass back first",
        store.issued_dir(Role::Server).display()
    );
    let name = &issued[0];

    let template = &config.server_template;
    ensure!(
        template.exists(),
        "profile template not found at {}",
        template.display()
    );
    let mut text = fs::read_to_string(template)
        .context(format!("Failed to read {}", template.display()))?;

    let dir = &config.server_config_dir;
    text = set_directive(&text, "ca", &dir.join("ca.crt").display().to_string());
    text = set_directive(
        &text,
        "cert",
        &dir.join(format!("{}.crt", name)).display().to_string(),
    );
    text = set_directive(
        &text,
        "key",
        &dir.join(format!("{}.key", name)).display().to_string(),
    );
    text = set_directive(&text, "dh", &dir.join("dh.pem").display().to_string());
    text = set_directive(
        &text,
        "tls-auth",
        &format!("{} 0", dir.join("ta.key").display()),
    );
    // Drop privileges after startup; the sample ships these commented out.
    text = set_directive(&text, "user", "nobody");
    text = set_directive(&text, "group", "nogroup");

    let out = dir.join("server.conf");
    write_profile(&out, &text)?;
    println!("{} Server profile written to {}", "✓".green(), out.display());
    Ok(())
}

fn generate_client_profile(
    config: &AppConfig,
    store: &ArtifactStore,
    toolkit: &dyn Toolkit,
    prompt: &mut dyn Prompt,
) -> Result<()> {
    let issued = store.list_issued(Role::Client)?;
    ensure!(
        !issued.is_empty(),
        "no client certificates found in {}; pass back a signed certificate first",
        store.issued_dir(Role::Client).display()
    );
    let name = if issued.len() == 1 {
        issued[0].clone()
    } else {
        let choice = prompt.choose("Select the client identity", &issued)?;
        issued[choice].clone()
    };

    let template = &config.client_template;
    ensure!(
        template.exists(),
        "profile template not found at {}",
        template.display()
    );
    let mut text = fs::read_to_string(template)
        .context(format!("Failed to read {}", template.display()))?;

    let host = prompt.input("Remote VPN host", "")?;
    ensure!(!host.is_empty(), "a remote host is required");
    let port = resolve_port(&prompt.input("Remote VPN port", "1194")?)?;

    let dir = &config.client_config_dir;
    text = set_directive(&text, "remote", &format!("{} {}", host, port));
    text = set_directive(&text, "ca", &dir.join("ca.crt").display().to_string());
    text = set_directive(
        &text,
        "cert",
        &dir.join(format!("{}.crt", name)).display().to_string(),
    );
    text = set_directive(
        &text,
        "key",
        &toolkit
            .pki_dir()
            .join("private")
            .join(format!("{}.key", name))
            .display()
            .to_string(),
    );
    text = set_directive(
        &text,
        "tls-auth",
        &format!("{} 1", dir.join("ta.key").display()),
    );
    text = strip_comments(&text);

    let out = dir.join(format!("{}.conf", name));
    write_profile(&out, &text)?;
    println!("{} Client profile written to {}", "✓".green(), out.display());
    Ok(())
}

/// Install the cached CRL on the server and make the running configuration
/// enforce it, then restart the service. The restart is fire-and-forget: a
/// failure is reported but does not fail the operation.
pub fn alert_server(
    config: &AppConfig,
    store: &ArtifactStore,
    service: &dyn ServiceControl,
) -> Result<()> {
    let crl = store.crl();
    ensure!(
        crl.exists(),
        "CRL not found at {}; revoke a certificate on the CA host and transfer it here",
        crl.display()
    );

    let dst = config.server_config_dir.join("crl.pem");
    install(&crl, &dst, 0o644)?;
    println!("{} CRL installed at {}", "✓".green(), dst.display());

    let conf = config.server_config_dir.join("server.conf");
    let text = if conf.exists() {
        fs::read_to_string(&conf).context(format!("Failed to read {}", conf.display()))?
    } else {
        String::new()
    };
    let updated = set_directive(&text, "crl-verify", &dst.display().to_string());
    fs::write(&conf, updated).context(format!("Failed to write {}", conf.display()))?;
    println!("{} Revocation check enabled in {}", "✓".green(), conf.display());

    match service.restart(&config.service_unit) {
        Ok(()) => println!("{} Restarted {}", "✓".green(), config.service_unit),
        Err(err) => println!(
            "{} Failed to restart {}: {:#}",
            "✗".red(),
            config.service_unit,
            err
        ),
    }
    Ok(())
}

fn write_profile(out: &Path, text: &str) -> Result<()> {
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
    }
    fs::write(out, text).context(format!("Failed to write {}", out.display()))
}

/// Zero or empty input falls back to the standard OpenVPN port.
fn resolve_port(input: &str) -> Result<u16> {
    let port: u16 = input
        .parse()
        .map_err(|_| anyhow!("invalid port '{}'", input))?;
    Ok(if port == 0 { DEFAULT_VPN_PORT } else { port })
}

/// Set a directive to exactly one active occurrence.
///
/// The first matching line, active or commented out, is replaced with
/// `directive value`; any further matching lines are dropped so the result
/// never carries duplicates. When the directive does not appear at all it
/// is appended. Matching is on the whole first token, so `remote` never
/// matches `remote-cert-tls`.
fn set_directive(text: &str, directive: &str, value: &str) -> String {
    let mut out = Vec::new();
    let mut replaced = false;
    for line in text.lines() {
        let stripped = line
            .trim_start()
            .trim_start_matches(['#', ';'])
            .trim_start();
        if stripped.split_whitespace().next() == Some(directive) {
            if !replaced {
                out.push(format!("{} {}", directive, value));
                replaced = true;
            }
            continue;
        }
        out.push(line.to_string());
    }
    if !replaced {
        out.push(format!("{} {}", directive, value));
    }
    out.join("\n") + "\n"
}

/// Drop comment and blank lines, keeping active directives only.
fn strip_comments(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }
        out.push(line);
    }
    out.join("\n") + "\n"
}
