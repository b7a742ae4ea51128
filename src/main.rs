//! ovpn-pki command-line interface.
//!
//! One mutually-exclusive operation per invocation; a fatal error prints a
//! formatted message and terminates with a non-zero exit. SIGINT during a
//! blocking prompt or a long-running toolkit step becomes a graceful abort.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use ovpn_pki::configs::AppConfig;
use ovpn_pki::context::OpContext;
use ovpn_pki::distribute;
use ovpn_pki::prompt::TerminalPrompt;
use ovpn_pki::store::{ArtifactStore, Role};
use ovpn_pki::toolkit::{CertKind, EasyRsa, Systemctl};
use ovpn_pki::workflow::{self, ServerStep};

#[derive(Parser)]
#[command(name = "ovpn-pki")]
#[command(about = "Private CA and certificate lifecycle manager for OpenVPN")]
#[command(version)]
struct Cli {
    /// Bypass confirmations and regenerate existing artifacts
    #[arg(long, global = true)]
    force: bool,

    /// Bit length for Diffie-Hellman parameter generation
    #[arg(long, global = true, default_value_t = 2048)]
    key_size: u32,

    /// Config file path (defaults to /etc/ovpn-pki.toml when present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialise the working PKI and build the root CA (CA host)
    SetupCa,
    /// Produce server artifacts: CA copy, keypair+request, DH, TLS auth key
    SetupServer {
        #[arg(value_enum, default_value_t = StepArg::All)]
        step: StepArg,
    },
    /// Produce a client keypair and certificate request
    SetupClient,
    /// Import and sign the transferred requests (CA host)
    Sign,
    /// Install a signed certificate back onto its originating role
    PassBack { target: TargetArg },
    /// Rewrite the sample configuration into a working profile
    GenProfile { target: TargetArg },
    /// Revoke a certificate and regenerate the CRL (CA host)
    Revoke { target: TargetArg },
    /// Apply the transferred CRL on the server and restart OpenVPN
    Alert,
    /// Delete a role's local artifact cache
    Reset { role: Option<RoleArg> },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StepArg {
    All,
    CaCert,
    Req,
    Dh,
    Ta,
}

impl From<StepArg> for ServerStep {
    fn from(step: StepArg) -> Self {
        match step {
            StepArg::All => ServerStep::All,
            StepArg::CaCert => ServerStep::CaCert,
            StepArg::Req => ServerStep::Request,
            StepArg::Dh => ServerStep::DhParams,
            StepArg::Ta => ServerStep::TlsAuth,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TargetArg {
    Server,
    Client,
}

impl From<TargetArg> for CertKind {
    fn from(target: TargetArg) -> Self {
        match target {
            TargetArg::Server => CertKind::Server,
            TargetArg::Client => CertKind::Client,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Ca,
    Server,
    Client,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Ca => Role::Ca,
            RoleArg::Server => Role::Server,
            RoleArg::Client => Role::Client,
        }
    }
}

extern "C" fn on_interrupt(_: libc::c_int) {
    const MSG: &[u8] = b"\naborted by user\n";
    unsafe {
        libc::write(libc::STDERR_FILENO, MSG.as_ptr().cast(), MSG.len());
        libc::_exit(130);
    }
}

fn main() {
    unsafe {
        libc::signal(libc::SIGINT, on_interrupt as libc::sighandler_t);
    }

    if let Err(err) = run() {
        eprintln!("{} {:#}", "✗ error:".red().bold(), err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };

    let store = ArtifactStore::new(&config.store_root);
    let toolkit = EasyRsa::new(&config.easyrsa_dir);
    let service = Systemctl::new();
    let mut prompt = TerminalPrompt;
    let privileged = unsafe { libc::geteuid() } == 0;
    let ctx = OpContext::new(cli.force, cli.key_size, privileged);

    match cli.command {
        Commands::SetupCa => workflow::setup_ca(&ctx, &store, &toolkit, &mut prompt),
        Commands::SetupServer { step } => {
            workflow::setup_server(&ctx, &config, &store, &toolkit, &mut prompt, step.into())
        }
        Commands::SetupClient => workflow::setup_client(&ctx, &store, &toolkit, &mut prompt),
        Commands::Sign => workflow::sign_requests(&ctx, &store, &toolkit),
        Commands::PassBack { target } => {
            distribute::pass_back(&ctx, &config, &store, &toolkit, &mut prompt, target.into())
        }
        Commands::GenProfile { target } => {
            distribute::generate_profile(&ctx, &config, &store, &toolkit, &mut prompt, target.into())
        }
        Commands::Revoke { target } => workflow::revoke(
            &ctx,
            &config,
            &store,
            &toolkit,
            &service,
            &mut prompt,
            target.into(),
        ),
        Commands::Alert => distribute::alert_server(&config, &store, &service),
        Commands::Reset { role } => {
            workflow::reset(&ctx, &store, &mut prompt, role.map(Role::from))
        }
    }
}
