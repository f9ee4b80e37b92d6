//! Address primitives shared by the L3 forwarding manager crates.
//!
//! - [`AddressFamily`]: IPv4 or IPv6
//! - [`IpAddress`] / [`IpPrefix`]: host addresses and route prefixes
//! - [`MacAddress`]: 48-bit Ethernet address
//! - [`VlanId`]: IEEE 802.1Q VLAN identifier

mod ip;
mod mac;
mod vlan;

pub use ip::{AddressFamily, IpAddress, IpPrefix};
pub use mac::MacAddress;
pub use vlan::VlanId;

/// Error returned when a textual address primitive fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("address {value} is not an {expected} address")]
    FamilyMismatch {
        value: String,
        expected: AddressFamily,
    },

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),
}
