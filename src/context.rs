//! Per-invocation operation context.

use anyhow::{ensure, Result};

/// Explicit context threaded through every operation, replacing any ambient
/// global state: the force flag, the DH key size, and whether this process
/// runs with elevated privileges.
#[derive(Debug, Clone, Copy)]
pub struct OpContext {
    /// Bypass confirmations and skip-if-exists checks.
    pub force: bool,
    /// Bit length for Diffie-Hellman parameter generation.
    pub key_size: u32,
    /// Captured once at startup from the effective uid.
    pub privileged: bool,
}

impl OpContext {
    pub fn new(force: bool, key_size: u32, privileged: bool) -> Self {
        Self {
            force,
            key_size,
            privileged,
        }
    }

    /// Precondition check for operations that mutate system directories.
    pub fn require_privilege(&self, action: &str) -> Result<()> {
        ensure!(
            self.privileged,
            "{} requires elevated privileges; re-run as root",
            action
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_privilege() {
        let ctx = OpContext::new(false, 2048, false);
        let err = ctx.require_privilege("revoking certificates").unwrap_err();
        assert!(err.to_string().contains("elevated privileges"));

        let ctx = OpContext::new(false, 2048, true);
        assert!(ctx.require_privilege("revoking certificates").is_ok());
    }
}
