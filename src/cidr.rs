//! IPv4 CIDR blocks

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid CIDR block '{0}'")]
pub struct CidrError(pub String);

/// Network address, VPC router, DNS and one spare
pub const RESERVED_LEADING: u32 = 4;

/// An IPv4 network in CIDR notation, e.g. `10.0.1.0/24`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, prefix: u8) -> Result<Self, CidrError> {
        if prefix > 32 {
            return Err(CidrError(format!("{address}/{prefix}")));
        }
        let network = Ipv4Addr::from(u32::from(address) & Self::mask_bits(prefix));
        Ok(Self { network, prefix })
    }

    fn mask_bits(prefix: u8) -> u32 {
        if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix))
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        u32::from(address) & Self::mask_bits(self.prefix) == u32::from(self.network)
    }

    /// Whether `other` lies entirely inside this block
    pub fn contains_cidr(&self, other: &Ipv4Cidr) -> bool {
        other.prefix >= self.prefix && self.contains(other.network)
    }

    /// The address at `offset` from the network address, if inside the block
    pub fn host(&self, offset: u32) -> Option<Ipv4Addr> {
        if u64::from(offset) >= self.size() {
            return None;
        }
        Some(Ipv4Addr::from(u32::from(self.network) + offset))
    }

    /// Offset of `address` from the network address, if inside the block
    pub fn offset_of(&self, address: Ipv4Addr) -> Option<u32> {
        self.contains(address)
            .then(|| u32::from(address) - u32::from(self.network))
    }

    /// The first four addresses and the last one, which AWS keeps for itself
    pub fn is_reserved(&self, address: Ipv4Addr) -> bool {
        match self.offset_of(address) {
            Some(offset) => offset < RESERVED_LEADING || u64::from(offset) == self.size() - 1,
            None => false,
        }
    }

    /// Host offsets an instance may be given; empty for blocks smaller than /29
    pub fn usable_offsets(&self) -> Range<u32> {
        let broadcast = (self.size() - 1).min(u64::from(u32::MAX)) as u32;
        RESERVED_LEADING..broadcast.max(RESERVED_LEADING)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CidrError(s.to_string());
        let (address, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let address: Ipv4Addr = address.trim().parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.trim().parse().map_err(|_| invalid())?;
        let cidr = Self::new(address, prefix).map_err(|_| invalid())?;
        if cidr.network != address {
            // host bits set, e.g. 10.0.1.5/24
            return Err(invalid());
        }
        Ok(cidr)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl Serialize for Ipv4Cidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv4Cidr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
