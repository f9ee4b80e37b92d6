//! Error type shared by every L3 manager operation.

use l3_hw::HwError;
use l3_types::ParseError;

/// Error type for L3 manager operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum L3Error {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Hardware rejected {op}: {source}")]
    HardwareRejected {
        op: &'static str,
        #[source]
        source: HwError,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Busy: {0}")]
    Busy(String),
}

/// Result type for L3 manager operations.
pub type Result<T> = std::result::Result<T, L3Error>;

impl L3Error {
    /// Classifies a backend failure: table-full style codes become
    /// `ResourceExhausted`, everything else `HardwareRejected`.
    pub fn hw(op: &'static str, err: HwError) -> Self {
        if err.is_resource_exhausted() {
            L3Error::ResourceExhausted(err.to_string())
        } else {
            L3Error::HardwareRejected { op, source: err }
        }
    }

    /// POSIX error number reported back to the forwarding control plane.
    pub fn errno(&self) -> i32 {
        match self {
            L3Error::InvalidAddress(_) => 96, // EPFNOSUPPORT
            L3Error::ResourceExhausted(_) => 12, // ENOMEM
            L3Error::HardwareRejected { .. } => 11, // EAGAIN
            L3Error::NotFound(_) => 2,       // ENOENT
            L3Error::Unsupported(_) => 14,   // EFAULT
            L3Error::InvalidArgument(_) => 22, // EINVAL
            L3Error::Busy(_) => 16,          // EBUSY
        }
    }
}

impl From<HwError> for L3Error {
    fn from(err: HwError) -> Self {
        L3Error::hw(err.op, err)
    }
}

impl From<ParseError> for L3Error {
    fn from(err: ParseError) -> Self {
        L3Error::InvalidAddress(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use l3_hw::HwStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hw_classification() {
        let full = L3Error::from(HwError::table_full("nh_group_create", "ecmp"));
        assert!(matches!(full, L3Error::ResourceExhausted(_)));

        let rejected = L3Error::from(HwError::new("route_add", HwStatus::Failure));
        assert!(matches!(
            rejected,
            L3Error::HardwareRejected {
                op: "route_add",
                ..
            }
        ));
    }

    #[test]
    fn test_errno() {
        assert_eq!(L3Error::InvalidArgument("x".into()).errno(), 22);
        assert_eq!(L3Error::NotFound("x".into()).errno(), 2);
        assert_eq!(L3Error::ResourceExhausted("x".into()).errno(), 12);
    }

    #[test]
    fn test_parse_error_is_invalid_address() {
        let err: L3Error = "10.0.0.0/40".parse::<l3_types::IpPrefix>().unwrap_err().into();
        assert!(matches!(err, L3Error::InvalidAddress(_)));
    }
}
