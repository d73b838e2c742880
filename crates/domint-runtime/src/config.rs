//! Runtime configuration

use domint_core::constants::{DEFAULT_MAX_DOMAINS, MAX_DOMAINS};
use domint_core::env::env_get;
use domint_core::{DomainError, DomainResult};

/// Configuration for the domain runtime
///
/// The domain table is sized once, at first use; configure before
/// spawning or entering any domain.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of domain slots in the table
    pub max_domains: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_domains: env_get("DOMINT_MAX_DOMAINS", DEFAULT_MAX_DOMAINS),
        }
    }
}

impl RuntimeConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of domain slots
    pub fn max_domains(mut self, n: usize) -> Self {
        self.max_domains = n;
        self
    }

    /// Check the configuration for consistency
    pub fn validate(&self) -> DomainResult<()> {
        if self.max_domains == 0 {
            return Err(DomainError::InvalidConfig("max_domains must be nonzero"));
        }
        if self.max_domains > MAX_DOMAINS {
            return Err(DomainError::InvalidConfig("max_domains exceeds MAX_DOMAINS"));
        }
        Ok(())
    }
}
