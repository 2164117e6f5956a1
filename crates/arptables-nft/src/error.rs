use thiserror::Error;

/// Unified error type for rule translation.
///
/// Unknown payload offsets and unknown expression kinds are deliberately not
/// represented here: the parser skips them.
#[derive(Error, Debug)]
pub enum ArpTablesError {
    #[error("Failed to construct '{expr}' expression: {reason}")]
    Construction { expr: String, reason: String },

    #[error("Invalid parameter {parameter} = '{value}': {reason}")]
    ParameterInvalid {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("Target '{name}' is not a built-in verdict, a loaded extension or a valid chain name")]
    ActionResolution { name: String },

    #[error("Invalid interface name '{0}'. Names are limited to 15 bytes.")]
    InvalidInterface(String),

    #[error("Invalid MAC address format: {0}. Expected format: aa:bb:cc:dd:ee:ff[/mask]")]
    InvalidMacAddress(String),

    #[error("Invalid IPv4 address or mask: {0}")]
    InvalidAddress(String),

    #[error("Failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("Unsupported protocol family {0}; only ARP is handled")]
    UnsupportedFamily(u8),
}

pub type Result<T> = std::result::Result<T, ArpTablesError>;

impl ArpTablesError {
    pub fn construction(expr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            expr: expr.into(),
            reason: reason.into(),
        }
    }

    pub fn parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ParameterInvalid {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.into(),
        }
    }
}
