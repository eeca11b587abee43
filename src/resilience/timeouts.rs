//! Timeout tiers.
//!
//! # Responsibilities
//! - Name the deadline classes used for upstream calls
//! - Resolve a tier to a concrete duration from configuration
//!
//! # Design Decisions
//! - Timed-out requests surface as 504 Gateway Timeout
//! - Probes carry their own short deadline instead of a config lookup

use std::time::Duration;

use crate::config::schema::TimeoutConfig;

/// Deadline class of an upstream call's first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutTier {
    /// Buffered request/response calls.
    Interactive,
    /// Calls whose body is relayed as an event stream.
    Streaming,
    /// Status probes that must answer quickly or not at all.
    Probe(Duration),
}

impl TimeoutTier {
    pub fn resolve(self, config: &TimeoutConfig) -> Duration {
        match self {
            TimeoutTier::Interactive => Duration::from_secs(config.upstream_secs),
            TimeoutTier::Streaming => Duration::from_secs(config.stream_secs),
            TimeoutTier::Probe(timeout) => timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_resolve_from_config() {
        let config = TimeoutConfig::default();
        assert_eq!(
            TimeoutTier::Interactive.resolve(&config),
            Duration::from_secs(config.upstream_secs)
        );
        assert_eq!(
            TimeoutTier::Streaming.resolve(&config),
            Duration::from_secs(config.stream_secs)
        );
        assert_eq!(
            TimeoutTier::Probe(Duration::from_secs(3)).resolve(&config),
            Duration::from_secs(3)
        );
    }
}
