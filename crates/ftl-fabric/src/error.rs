/// Errors produced by the event bus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FabricError {
    /// The bus already serves its maximum number of live subscribers.
    #[error("subscriber limit of {max} reached")]
    SubscriberLimit { max: usize },

    #[error("invalid bus configuration: {0}")]
    InvalidConfig(String),

    #[error("event bus {0} lock poisoned")]
    LockPoisoned(&'static str),
}

/// Convenience alias used throughout the fabric crate.
pub type Result<T> = std::result::Result<T, FabricError>;
