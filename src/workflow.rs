//! Role workflow engine.
//!
//! One function per operator-triggered operation. Each checks its
//! preconditions against the artifact store and environment, drives the
//! external toolkit, and caches the resulting artifacts. Per logical
//! identity the CA sees a forward-only lifecycle:
//!
//! ```text
//! Unrequested -> Requested -> Imported -> Signed -> Distributed -> Revoked
//! ```
//!
//! Re-running a step with `--force` regenerates its artifact but never
//! retroactively invalidates certificates already issued. The first toolkit
//! failure aborts the remaining steps of the operation; nothing is rolled
//! back.

use anyhow::{ensure, Result};
use colored::Colorize;

use crate::configs::AppConfig;
use crate::context::OpContext;
use crate::distribute;
use crate::prompt::Prompt;
use crate::store::{ArtifactStore, Role};
use crate::toolkit::{CertKind, ServiceControl, Toolkit};

/// Independently selectable sub-steps of server artifact setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStep {
    All,
    CaCert,
    Request,
    DhParams,
    TlsAuth,
}

/// Initialise the working PKI and build the root CA.
///
/// The public CA certificate is cached into the durable store; the private
/// key never leaves the toolkit's `pki/private/` directory.
pub fn setup_ca(
    ctx: &OpContext,
    store: &ArtifactStore,
    toolkit: &dyn Toolkit,
    prompt: &mut dyn Prompt,
) -> Result<()> {
    ctx.require_privilege("Setting up the CA")?;

    if !ctx.force
        && !prompt.confirm("This will (re)initialise the certificate authority. Continue?")?
    {
        println!("Nothing to do.");
        return Ok(());
    }

    let pki = toolkit.pki_dir();
    if !pki.exists() || ctx.force {
        toolkit.init_pki()?;
        println!("{} PKI working area initialised at {}", "✓".green(), pki.display());
    } else {
        println!("PKI working area already present, skipping init");
    }

    let ca_cert = pki.join("ca.crt");
    if !ca_cert.exists() || ctx.force {
        toolkit.build_ca()?;
        println!("{} Root CA built", "✓".green());
    } else {
        println!("Root CA already present, skipping build");
    }

    store.cache(&ca_cert, &store.ca_cert())?;
    println!(
        "{} CA certificate cached at {}",
        "✓".green(),
        store.ca_cert().display()
    );
    Ok(())
}

/// Produce the server-side artifacts: CA certificate copy, server keypair
/// and request, Diffie-Hellman parameters, and the pre-shared TLS auth key.
///
/// The CA-certificate and request sub-steps skip work that already exists
/// unless forced; DH and TLS-auth generation always regenerate.
pub fn setup_server(
    ctx: &OpContext,
    config: &AppConfig,
    store: &ArtifactStore,
    toolkit: &dyn Toolkit,
    prompt: &mut dyn Prompt,
    step: ServerStep,
) -> Result<()> {
    if matches!(step, ServerStep::All | ServerStep::CaCert) {
        let src = store.ca_cert();
        ensure!(
            src.exists(),
            "CA certificate not found at {}; run setup-ca on the CA host and transfer it here",
            src.display()
        );
        let dst = config.server_config_dir.join("ca.crt");
        if dst.exists() && !ctx.force {
            println!("CA certificate already installed at {}", dst.display());
        } else {
            distribute::install(&src, &dst, 0o644)?;
            println!("{} CA certificate installed at {}", "✓".green(), dst.display());
        }
    }

    if matches!(step, ServerStep::All | ServerStep::Request) {
        generate_request(ctx, store, toolkit, prompt, Role::Server, "servername")?;
    }

    if matches!(step, ServerStep::All | ServerStep::DhParams) {
        let out = config.server_config_dir.join("dh.pem");
        println!(
            "Generating {}-bit Diffie-Hellman parameters (this can take a while)...",
            ctx.key_size
        );
        toolkit.gen_dh(ctx.key_size, &out)?;
        println!("{} DH parameters written to {}", "✓".green(), out.display());
    }

    if matches!(step, ServerStep::All | ServerStep::TlsAuth) {
        let out = config.server_config_dir.join("ta.key");
        toolkit.gen_secret(&out)?;
        store.cache(&out, &store.ta_key())?;
        println!(
            "{} TLS auth key written to {} and cached",
            "✓".green(),
            out.display()
        );
    }

    Ok(())
}

/// Produce one client keypair and request. Requests accumulate, one per
/// named client identity.
pub fn setup_client(
    ctx: &OpContext,
    store: &ArtifactStore,
    toolkit: &dyn Toolkit,
    prompt: &mut dyn Prompt,
) -> Result<()> {
    generate_request(ctx, store, toolkit, prompt, Role::Client, "clientname")
}

fn generate_request(
    ctx: &OpContext,
    store: &ArtifactStore,
    toolkit: &dyn Toolkit,
    prompt: &mut dyn Prompt,
    role: Role,
    default_name: &str,
) -> Result<()> {
    let name = prompt.input("Certificate name", default_name)?;
    ensure!(!name.is_empty(), "certificate name must not be empty");

    let req = toolkit.pki_dir().join("reqs").join(format!("{}.req", name));
    if req.exists() && !ctx.force {
        println!("Request for '{}' already exists, skipping generation", name);
    } else {
        toolkit.gen_req(&name)?;
        println!("{} Keypair and request generated for '{}'", "✓".green(), name);
    }

    let cached = store.requests_dir(role).join(format!("{}.req", name));
    store.cache(&req, &cached)?;
    println!("{} Request cached at {}", "✓".green(), cached.display());
    Ok(())
}

/// Import and sign the transferred requests on the CA.
///
/// Signs the lexicographically first server request and every client
/// request. Import and sign are both idempotent per filename stem: a stem
/// already present under the working PKI's `reqs/` or `issued/` directory is
/// skipped (unless forced, which re-signs). Each signed certificate is
/// cached into the originating role's store, named by its Common Name.
pub fn sign_requests(
    ctx: &OpContext,
    store: &ArtifactStore,
    toolkit: &dyn Toolkit,
) -> Result<()> {
    let server_reqs = store.list_requests(Role::Server)?;
    ensure!(
        !server_reqs.is_empty(),
        "no server certificate requests found in {}",
        store.requests_dir(Role::Server).display()
    );
    let client_reqs = store.list_requests(Role::Client)?;
    ensure!(
        !client_reqs.is_empty(),
        "no client certificate requests found in {}",
        store.requests_dir(Role::Client).display()
    );

    let mut batch = vec![(CertKind::Server, server_reqs[0].clone())];
    batch.extend(client_reqs.into_iter().map(|stem| (CertKind::Client, stem)));

    let pki = toolkit.pki_dir();
    for (kind, stem) in batch {
        let imported = pki.join("reqs").join(format!("{}.req", stem));
        if imported.exists() {
            println!("Request '{}' already imported, skipping", stem);
        } else {
            let src = store.requests_dir(kind.role()).join(format!("{}.req", stem));
            toolkit.import_req(&src, &stem)?;
            println!("{} Imported request '{}'", "✓".green(), stem);
        }

        let issued = pki.join("issued").join(format!("{}.crt", stem));
        if issued.exists() && !ctx.force {
            println!("Certificate '{}' already signed, skipping", stem);
        } else {
            toolkit.sign_req(kind, &stem)?;
            println!("{} Signed {} certificate '{}'", "✓".green(), kind.as_str(), stem);
        }

        let common_name = toolkit.read_subject(&issued)?.common_name()?.to_string();
        let cached = store
            .issued_dir(kind.role())
            .join(format!("{}.crt", common_name));
        store.cache(&issued, &cached)?;
        println!("{} Certificate cached at {}", "✓".green(), cached.display());
    }

    Ok(())
}

/// Revoke a certificate and regenerate the CRL.
///
/// Revoking the server certificate is explicitly composed with the alert
/// step, since a server whose own certificate is revoked must reload the
/// CRL immediately; revoking a client leaves alerting to a separate
/// `alert` invocation once the CRL has been transferred.
pub fn revoke(
    ctx: &OpContext,
    config: &AppConfig,
    store: &ArtifactStore,
    toolkit: &dyn Toolkit,
    service: &dyn ServiceControl,
    prompt: &mut dyn Prompt,
    kind: CertKind,
) -> Result<()> {
    ctx.require_privilege("Revoking certificates")?;

    let issued = store.list_issued(kind.role())?;
    ensure!(
        !issued.is_empty(),
        "no {} certificates found in {}",
        kind.as_str(),
        store.issued_dir(kind.role()).display()
    );

    let name = match kind {
        CertKind::Server => issued[0].clone(),
        CertKind::Client => {
            if issued.len() == 1 {
                issued[0].clone()
            } else {
                let choice = prompt.choose("Select the certificate to revoke", &issued)?;
                issued[choice].clone()
            }
        }
    };

    if !ctx.force && !prompt.confirm(&format!("Revoke certificate '{}'?", name))? {
        println!("Nothing to do.");
        return Ok(());
    }

    toolkit.revoke(&name)?;
    toolkit.gen_crl()?;
    store.cache(&toolkit.pki_dir().join("crl.pem"), &store.crl())?;
    println!(
        "{} Certificate '{}' revoked; CRL cached at {}",
        "✓".green(),
        name,
        store.crl().display()
    );

    if kind == CertKind::Server {
        distribute::alert_server(config, store, service)?;
    }

    Ok(())
}

/// Delete a role's local cache, or the entire store. Irreversible.
pub fn reset(
    ctx: &OpContext,
    store: &ArtifactStore,
    prompt: &mut dyn Prompt,
    role: Option<Role>,
) -> Result<()> {
    let what = match role {
        Some(role) => format!("the '{}' cache", role),
        None => "the entire artifact store".to_string(),
    };
    if !ctx.force && !prompt.confirm(&format!("Delete {}? This cannot be undone.", what))? {
        println!("Nothing to do.");
        return Ok(());
    }

    store.reset(role)?;
    println!("{} Deleted {}", "✓".green(), what);
    Ok(())
}
