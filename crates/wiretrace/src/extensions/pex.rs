//! Peer Exchange (BEP-11)
//!
//! The payload is a dictionary of compact peer lists. The IPv6 family is only
//! taken into account when the peer sent all of its keys and at least one of
//! its lists is not empty.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use crate::{
    codec::{self, BValue},
    error::Error,
};

pub const NAME: &str = "ut_pex";

const COMPACT_V4: usize = 6;
const COMPACT_V6: usize = 18;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PexPeer {
    pub addr: SocketAddr,
    pub flags: PexFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PexFlags {
    pub encryption: bool,
    pub seed: bool,
    pub utp: bool,
    pub holepunch: bool,
    pub connectable: bool,
}

impl PexFlags {
    pub fn from_byte(b: u8) -> Self {
        Self {
            encryption: (b & 0x01) != 0,
            seed: (b & 0x02) != 0,
            utp: (b & 0x04) != 0,
            holepunch: (b & 0x08) != 0,
            connectable: (b & 0x10) != 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PexMsg {
    pub added: Vec<PexPeer>,
    pub dropped: Vec<SocketAddr>,
    pub added6: Vec<PexPeer>,
    pub dropped6: Vec<SocketAddr>,
    /// The decoded dictionary as it was sent.
    pub raw: BValue,
}

impl PexMsg {
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let raw = codec::decode_dict(buf)?;

        let added = codec::get_bytes(&raw, "added")?.unwrap_or_default();
        let added_f = codec::get_bytes(&raw, "added.f")?.unwrap_or_default();
        let dropped = codec::get_bytes(&raw, "dropped")?.unwrap_or_default();

        let added6 = codec::get_bytes(&raw, "added6")?;
        let added6_f = codec::get_bytes(&raw, "added6.f")?;
        let dropped6 = codec::get_bytes(&raw, "dropped6")?;

        let (added6, dropped6) = match (added6, added6_f, dropped6) {
            (Some(a), Some(f), Some(d)) if !a.is_empty() || !d.is_empty() => {
                (peers(a, f, COMPACT_V6, v6), addrs(d, COMPACT_V6, v6))
            }
            _ => (Vec::new(), Vec::new()),
        };

        Ok(Self {
            added: peers(added, added_f, COMPACT_V4, v4),
            dropped: addrs(dropped, COMPACT_V4, v4),
            added6,
            dropped6,
            raw,
        })
    }

    /// Added IPv4 peers that prefer encryption.
    pub fn prefer_encryption(&self) -> usize {
        self.added.iter().filter(|p| p.flags.encryption).count()
    }

    /// Added IPv4 peers that are seeders.
    pub fn seeders(&self) -> usize {
        self.added.iter().filter(|p| p.flags.seed).count()
    }

    pub fn prefer_encryption6(&self) -> usize {
        self.added6.iter().filter(|p| p.flags.encryption).count()
    }

    pub fn seeders6(&self) -> usize {
        self.added6.iter().filter(|p| p.flags.seed).count()
    }

    pub fn has_ipv6(&self) -> bool {
        !self.added6.is_empty() || !self.dropped6.is_empty()
    }
}

fn v4(chunk: &[u8]) -> SocketAddr {
    let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
    let port = u16::from_be_bytes([chunk[4], chunk[5]]);
    SocketAddr::V4(SocketAddrV4::new(ip, port))
}

fn v6(chunk: &[u8]) -> SocketAddr {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&chunk[..16]);
    let port = u16::from_be_bytes([chunk[16], chunk[17]]);
    SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::from(octets), port, 0, 0))
}

/// Compact addresses, a trailing partial record is dropped.
fn addrs(
    buf: &[u8],
    size: usize,
    parse: fn(&[u8]) -> SocketAddr,
) -> Vec<SocketAddr> {
    buf.chunks_exact(size).map(parse).collect()
}

/// Compact addresses zipped with their flag byte. A missing flag byte means
/// no flags.
fn peers(
    buf: &[u8],
    flags: &[u8],
    size: usize,
    parse: fn(&[u8]) -> SocketAddr,
) -> Vec<PexPeer> {
    addrs(buf, size, parse)
        .into_iter()
        .enumerate()
        .map(|(i, addr)| PexPeer {
            addr,
            flags: PexFlags::from_byte(flags.get(i).copied().unwrap_or(0)),
        })
        .collect()
}
