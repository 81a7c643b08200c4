#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpreedlyError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    ChargeDeclined(String),
    #[error("{0}")]
    GatewayUnavailable(String),
    #[error("undefined attribute `{name}` for {kind}")]
    NoSuchAttribute { kind: &'static str, name: String },
    #[error("attribute `{name}` of {kind} cannot hold {value}")]
    AttributeType {
        kind: &'static str,
        name: String,
        value: String,
    },
    #[error("Real Spreedly already required!")]
    RealClientActive,
    #[error("Mock Spreedly already required!")]
    MockClientActive,
    #[error("Failed to load mock configuration: {0}")]
    Config(String),
}

impl SpreedlyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// True for the faults that stand in for a gateway response rather than a
    /// problem with the request itself.
    pub fn is_simulated_gateway_fault(&self) -> bool {
        matches!(self, Self::ChargeDeclined(_) | Self::GatewayUnavailable(_))
    }
}

pub type Result<T, E = SpreedlyError> = std::result::Result<T, E>;
