use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NetError {
    // Generic Errors
    #[error("Operation failed")]
    Failed,
    #[error("Operation aborted")]
    Aborted,
    #[error("Invalid argument")]
    InvalidArgument,
    #[error("Unexpected error")]
    Unexpected,
    #[error("Not implemented")]
    NotImplemented,

    // Resolution Errors
    #[error("Address invalid")]
    AddressInvalid,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Name not resolved: {domain} ({reason})")]
    NameNotResolvedFor { domain: String, reason: String },
    #[error("Host resolver queue too large")]
    HostResolverQueueTooLarge,
    #[error("Name resolution failed")]
    NameResolutionFailed,
    #[error("DNS request timed out")]
    DnsTimedOut,

    // Proxy Errors
    #[error("Proxy connection failed")]
    ProxyConnectionFailed,
    #[error("Mandatory proxy configuration failed")]
    MandatoryProxyConfigurationFailed,
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("PAC script failed")]
    PacScriptFailed,
    #[error("No supported proxies")]
    NoSupportedProxies,
    #[error("PAC not in DHCP")]
    PacNotInDhcp,
    #[error("PAC script terminated")]
    PacScriptTerminated,

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::Failed => -2,
            NetError::Aborted => -3,
            NetError::InvalidArgument => -4,
            NetError::Unexpected => -9,
            NetError::NotImplemented => -11,
            NetError::AddressInvalid => -108,
            NetError::NameNotResolved => -105,
            NetError::NameNotResolvedFor { .. } => -105,
            NetError::HostResolverQueueTooLarge => -119,
            NetError::NameResolutionFailed => -137,
            NetError::ProxyConnectionFailed => -130,
            NetError::MandatoryProxyConfigurationFailed => -131,
            NetError::InvalidUrl => -300,
            NetError::PacScriptFailed => -327,
            NetError::NoSupportedProxies => -336,
            NetError::PacNotInDhcp => -348,
            NetError::PacScriptTerminated => -367,
            NetError::DnsTimedOut => -803,
            NetError::Unknown(code) => *code,
        }
    }

    /// Whether this error came from a failed host resolution.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            NetError::NameNotResolved
                | NetError::NameNotResolvedFor { .. }
                | NetError::NameResolutionFailed
                | NetError::DnsTimedOut
                | NetError::HostResolverQueueTooLarge
        )
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -2 => NetError::Failed,
            -3 => NetError::Aborted,
            -4 => NetError::InvalidArgument,
            -9 => NetError::Unexpected,
            -11 => NetError::NotImplemented,
            -105 => NetError::NameNotResolved,
            -108 => NetError::AddressInvalid,
            -119 => NetError::HostResolverQueueTooLarge,
            -130 => NetError::ProxyConnectionFailed,
            -131 => NetError::MandatoryProxyConfigurationFailed,
            -137 => NetError::NameResolutionFailed,
            -300 => NetError::InvalidUrl,
            -327 => NetError::PacScriptFailed,
            -336 => NetError::NoSupportedProxies,
            -348 => NetError::PacNotInDhcp,
            -367 => NetError::PacScriptTerminated,
            -803 => NetError::DnsTimedOut,
            _ => NetError::Unknown(code),
        }
    }
}
