//! ovpn-pki - Private CA and certificate lifecycle manager for OpenVPN
//!
//! Orchestrates the certificates and symmetric keys of a three-role OpenVPN
//! deployment: a CA host, a VPN server host, and any number of client hosts.
//! All cryptography is delegated to external toolkits (easy-rsa, openssl,
//! openvpn) invoked as subprocesses; this crate owns the lifecycle state
//! machine, the per-role artifact store, and the cross-machine handoff
//! steps.
//!
//! # Lifecycle
//!
//! ```text
//! CA host:     setup-ca --> sign --> revoke
//!                             |         |
//! server host: setup-server --+--> pass-back server --> gen-profile server --> alert
//! client host: setup-client --+--> pass-back client --> gen-profile client
//! ```
//!
//! Artifacts move between machines over an out-of-band channel (manual
//! copy); each role's durable store records what that machine has already
//! produced or received, and every operation fails fast with a descriptive
//! error when a required upstream artifact is missing.
//!
//! # Module Overview
//!
//! - [`configs`]: filesystem layout and service settings, TOML-backed
//! - [`context`]: explicit per-invocation context (force, key size, privilege)
//! - [`store`]: durable per-role artifact cache
//! - [`toolkit`]: subprocess adapters for easy-rsa, openssl, openvpn, systemd
//! - [`subject`]: typed parsing of toolkit-emitted subject lines
//! - [`prompt`]: operator interaction capability
//! - [`workflow`]: the per-role operations and their preconditions
//! - [`distribute`]: pass-back, profile generation, and CRL alerting

pub mod configs;
pub mod context;
pub mod distribute;
pub mod prompt;
pub mod store;
pub mod subject;
pub mod toolkit;
pub mod workflow;
