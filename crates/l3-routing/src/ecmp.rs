//! ECMP hash-field policy.

use l3_hw::HashField;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{L3Error, Result};

/// Header fields fed into the ECMP hash, as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EcmpHashFields(u32);

impl EcmpHashFields {
    pub const NONE: Self = Self(0);
    /// L4 source port.
    pub const SRCPORT: Self = Self(1 << 0);
    /// L4 destination port.
    pub const DSTPORT: Self = Self(1 << 1);
    pub const SRCIP: Self = Self(1 << 2);
    pub const DSTIP: Self = Self(1 << 3);
    pub const ALL: Self = Self(0xf);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Mask after enabling or disabling `fields`.
    ///
    /// L4 port hashing can never be turned off, and at least one IP
    /// direction must stay in the hash.
    pub fn apply(self, fields: Self, enable: bool) -> Result<Self> {
        if enable {
            return Ok(self | fields);
        }
        if fields.intersects(Self::SRCPORT | Self::DSTPORT) {
            return Err(L3Error::Unsupported(
                "L4 port hashing cannot be disabled".to_string(),
            ));
        }
        let next = Self(self.0 & !fields.0);
        if !next.intersects(Self::SRCIP | Self::DSTIP) {
            return Err(L3Error::Unsupported(
                "either source or destination IP hashing must stay enabled".to_string(),
            ));
        }
        Ok(next)
    }

    /// Field list programmed into the hardware for this mask.
    pub fn hash_fields(&self) -> Vec<HashField> {
        let mut fields = vec![HashField::STagTpid, HashField::STagVid];
        if self.contains(Self::SRCPORT) {
            fields.push(HashField::UdpSourcePort);
            fields.push(HashField::TcpSourcePort);
        }
        if self.contains(Self::DSTPORT) {
            fields.push(HashField::UdpDestinationPort);
            fields.push(HashField::TcpDestinationPort);
        }
        if self.contains(Self::SRCIP) {
            fields.push(HashField::Ipv4SourceIp);
        }
        if self.contains(Self::DSTIP) {
            fields.push(HashField::Ipv4DestinationIp);
        }
        fields
    }
}

impl Default for EcmpHashFields {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::ops::BitOr for EcmpHashFields {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for EcmpHashFields {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for EcmpHashFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::SRCPORT, "srcport"),
            (Self::DSTPORT, "dstport"),
            (Self::SRCIP, "srcip"),
            (Self::DSTIP, "dstip"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}
