//! Error types for the domain runtime
//!
//! Protocol-level outcomes stay boolean (`send` and `join` report
//! delivery/termination, not errors); these types cover runtime
//! lifecycle operations. Invariant violations are fatal assertions,
//! not errors.

use core::fmt;

/// Result type for runtime operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Errors that can occur managing domains
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// All domain slots are in use
    NoSlotsAvailable,

    /// The calling thread is not bound to a domain
    NotADomain,

    /// The calling thread is already bound to a domain
    AlreadyADomain,

    /// Failed to spawn the OS thread backing a domain
    SpawnFailed,

    /// The runtime was already initialized with a different configuration
    AlreadyInitialized,

    /// Invalid runtime configuration
    InvalidConfig(&'static str),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::NoSlotsAvailable => write!(f, "no domain slots available"),
            DomainError::NotADomain => write!(f, "calling thread is not bound to a domain"),
            DomainError::AlreadyADomain => write!(f, "calling thread is already bound to a domain"),
            DomainError::SpawnFailed => write!(f, "failed to spawn domain thread"),
            DomainError::AlreadyInitialized => write!(f, "runtime already initialized"),
            DomainError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", DomainError::NoSlotsAvailable),
            "no domain slots available"
        );
        assert_eq!(
            format!("{}", DomainError::InvalidConfig("max_domains is zero")),
            "invalid configuration: max_domains is zero"
        );
    }

    #[test]
    fn test_error_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&DomainError::NotADomain);
    }
}
