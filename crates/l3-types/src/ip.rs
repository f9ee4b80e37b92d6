//! IP addresses, prefixes and address families.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Address family of a host entry or route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[serde(alias = "v4")]
    Ipv4,
    #[serde(alias = "v6")]
    Ipv6,
}

impl AddressFamily {
    /// Returns the family for an `is_ipv6` flag as used by the control plane.
    pub const fn from_is_ipv6(is_ipv6: bool) -> Self {
        if is_ipv6 {
            AddressFamily::Ipv6
        } else {
            AddressFamily::Ipv4
        }
    }

    /// Maximum prefix length for this family.
    pub const fn max_prefix_len(&self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128,
        }
    }
}

impl Default for AddressFamily {
    fn default() -> Self {
        AddressFamily::Ipv4
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// An IPv4 or IPv6 host address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpAddress(IpAddr);

impl IpAddress {
    pub const fn v4(addr: Ipv4Addr) -> Self {
        IpAddress(IpAddr::V4(addr))
    }

    pub const fn v6(addr: Ipv6Addr) -> Self {
        IpAddress(IpAddr::V6(addr))
    }

    pub const fn family(&self) -> AddressFamily {
        match self.0 {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    pub const fn inner(&self) -> IpAddr {
        self.0
    }

    pub const fn is_ipv6(&self) -> bool {
        matches!(self.0, IpAddr::V6(_))
    }

    /// Returns the IPv4 address as a host-order integer, if this is IPv4.
    pub fn as_ipv4_u32(&self) -> Option<u32> {
        match self.0 {
            IpAddr::V4(addr) => Some(u32::from(addr)),
            IpAddr::V6(_) => None,
        }
    }

    /// Parses `s` and checks that it belongs to `family`.
    pub fn parse_for(family: AddressFamily, s: &str) -> Result<Self, ParseError> {
        let addr: IpAddress = s.parse()?;
        if addr.family() != family {
            return Err(ParseError::FamilyMismatch {
                value: s.to_string(),
                expected: family,
            });
        }
        Ok(addr)
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<IpAddr>()
            .map(IpAddress)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl From<IpAddr> for IpAddress {
    fn from(addr: IpAddr) -> Self {
        IpAddress(addr)
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        IpAddress::v4(addr)
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(addr: Ipv6Addr) -> Self {
        IpAddress::v6(addr)
    }
}

impl TryFrom<String> for IpAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpAddress> for String {
    fn from(addr: IpAddress) -> String {
        addr.to_string()
    }
}

/// A route prefix in CIDR notation (`10.0.0.0/24`, `2001:db8::/32`).
///
/// A bare address without `/len` is accepted as a host prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddress,
    prefix_len: u8,
}

impl IpPrefix {
    /// Creates a prefix, validating the length against the address family.
    pub fn new(address: IpAddress, prefix_len: u8) -> Result<Self, ParseError> {
        let max_len = address.family().max_prefix_len();
        if prefix_len > max_len {
            return Err(ParseError::InvalidIpPrefix(format!(
                "{}/{}: prefix length exceeds {}",
                address, prefix_len, max_len
            )));
        }
        Ok(IpPrefix {
            address,
            prefix_len,
        })
    }

    /// Builds an IPv4 prefix from a host-order address.
    pub fn from_ipv4_u32(addr: u32, prefix_len: u8) -> Result<Self, ParseError> {
        IpPrefix::new(IpAddress::v4(Ipv4Addr::from(addr)), prefix_len)
    }

    /// Parses `s` and checks that it belongs to `family`.
    pub fn parse_for(family: AddressFamily, s: &str) -> Result<Self, ParseError> {
        let prefix: IpPrefix = s.parse()?;
        if prefix.family() != family {
            return Err(ParseError::FamilyMismatch {
                value: s.to_string(),
                expected: family,
            });
        }
        Ok(prefix)
    }

    pub const fn address(&self) -> &IpAddress {
        &self.address
    }

    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub const fn family(&self) -> AddressFamily {
        self.address.family()
    }

    pub fn is_default(&self) -> bool {
        self.prefix_len == 0
    }

    /// Number of IPv4 addresses covered by one prefix of this length.
    ///
    /// Returns `None` for IPv6 prefixes and for `/0`, where the step does
    /// not fit in 32 bits.
    pub fn ipv4_step(&self) -> Option<u32> {
        if self.family() != AddressFamily::Ipv4 || self.prefix_len == 0 {
            return None;
        }
        Some(1u32 << (32 - u32::from(self.prefix_len)))
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.rsplit_once('/') {
            Some((addr_str, len_str)) => {
                let address: IpAddress = addr_str
                    .parse()
                    .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;
                let prefix_len: u8 = len_str
                    .parse()
                    .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;
                IpPrefix::new(address, prefix_len)
            }
            None => {
                let address: IpAddress = s
                    .parse()
                    .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;
                IpPrefix::new(address, address.family().max_prefix_len())
            }
        }
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> String {
        prefix.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_address_family() {
        let v4: IpAddress = "10.0.0.1".parse().unwrap();
        assert_eq!(v4.family(), AddressFamily::Ipv4);
        assert_eq!(v4.as_ipv4_u32(), Some(0x0a00_0001));

        let v6: IpAddress = "2001:db8::1".parse().unwrap();
        assert_eq!(v6.family(), AddressFamily::Ipv6);
        assert!(v6.is_ipv6());
        assert_eq!(v6.as_ipv4_u32(), None);
    }

    #[test]
    fn test_parse_for_rejects_wrong_family() {
        let err = IpAddress::parse_for(AddressFamily::Ipv6, "10.0.0.1").unwrap_err();
        assert!(matches!(err, ParseError::FamilyMismatch { .. }));

        assert!(IpPrefix::parse_for(AddressFamily::Ipv4, "2001:db8::/32").is_err());
        assert!(IpPrefix::parse_for(AddressFamily::Ipv6, "2001:db8::/32").is_ok());
    }

    #[test]
    fn test_prefix_parse_and_display() {
        let prefix: IpPrefix = "10.0.1.0/24".parse().unwrap();
        assert_eq!(prefix.prefix_len(), 24);
        assert_eq!(prefix.to_string(), "10.0.1.0/24");

        let host: IpPrefix = "192.168.1.7".parse().unwrap();
        assert_eq!(host.prefix_len(), 32);

        let v6_host: IpPrefix = "fe80::1".parse().unwrap();
        assert_eq!(v6_host.prefix_len(), 128);
    }

    #[test]
    fn test_prefix_invalid() {
        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
        assert!("2001:db8::/129".parse::<IpPrefix>().is_err());
        assert!("10.0.0/24".parse::<IpPrefix>().is_err());
        assert!("10.0.0.0/abc".parse::<IpPrefix>().is_err());
        assert!("".parse::<IpPrefix>().is_err());
    }

    #[test]
    fn test_ipv4_step() {
        let p24: IpPrefix = "10.0.0.0/24".parse().unwrap();
        assert_eq!(p24.ipv4_step(), Some(256));

        let p32: IpPrefix = "10.0.0.1/32".parse().unwrap();
        assert_eq!(p32.ipv4_step(), Some(1));

        let default: IpPrefix = "0.0.0.0/0".parse().unwrap();
        assert!(default.is_default());
        assert_eq!(default.ipv4_step(), None);

        let v6: IpPrefix = "2001:db8::/64".parse().unwrap();
        assert_eq!(v6.ipv4_step(), None);
    }

    #[test]
    fn test_from_ipv4_u32() {
        let prefix = IpPrefix::from_ipv4_u32(0x0a00_0100, 24).unwrap();
        assert_eq!(prefix.to_string(), "10.0.1.0/24");
    }

    #[test]
    fn test_prefix_serde_as_string() {
        let prefix: IpPrefix = "10.0.0.0/8".parse().unwrap();
        let json = serde_json::to_string(&prefix).unwrap();
        assert_eq!(json, "\"10.0.0.0/8\"");
        let back: IpPrefix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, prefix);
    }
}
