//! Ethernet MAC address.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Ethernet MAC address.
///
/// Accepts `aa:bb:cc:dd:ee:ff` and `aa-bb-cc-dd-ee-ff`; always displays
/// lowercase colon-separated.
///
/// ```
/// use l3_types::MacAddress;
///
/// let mac: MacAddress = "AA-BB-CC-DD-EE-01".parse().unwrap();
/// assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:01");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidMacAddress(s.to_string());
        let separator = if s.contains(':') { ':' } else { '-' };

        let mut bytes = [0u8; 6];
        let mut count = 0;
        for part in s.split(separator) {
            if count == bytes.len() || part.is_empty() || part.len() > 2 {
                return Err(invalid());
            }
            bytes[count] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
            count += 1;
        }
        if count != bytes.len() {
            return Err(invalid());
        }
        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_both_separators() {
        let colon: MacAddress = "aa:bb:cc:dd:ee:01".parse().unwrap();
        let hyphen: MacAddress = "AA-BB-CC-DD-EE-01".parse().unwrap();
        assert_eq!(colon, hyphen);
        assert_eq!(colon.as_bytes(), &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
    }

    #[test]
    fn test_zero() {
        assert!(MacAddress::ZERO.is_zero());
        assert!(MacAddress::default().is_zero());
        assert_eq!(MacAddress::ZERO.to_string(), "00:00:00:00:00:00");
    }

    #[test]
    fn test_invalid() {
        for bad in ["", "aa:bb:cc:dd:ee", "aa:bb:cc:dd:ee:ff:00", "zz:bb:cc:dd:ee:ff", "aaa:bb:cc:dd:ee:f"] {
            assert!(bad.parse::<MacAddress>().is_err(), "{bad} should not parse");
        }
    }
}
