//! Identifiers exchanged in the handshake.

use std::{fmt::Display, ops::Deref};

/// SHA-1 of the bencoded `info` dictionary of a torrent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InfoHash(pub [u8; 20]);

impl Display for InfoHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.to_string();
        f.write_str(&s[..10])
    }
}

impl Deref for InfoHash {
    type Target = [u8; 20];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; 20]> for InfoHash {
    fn from(value: [u8; 20]) -> Self {
        Self(value)
    }
}

impl From<InfoHash> for [u8; 20] {
    fn from(value: InfoHash) -> Self {
        value.0
    }
}

impl TryFrom<&str> for InfoHash {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let buff = hex::decode(value).map_err(|e| e.to_string())?;
        let hash: [u8; 20] = buff
            .try_into()
            .map_err(|_| "an info hash has 40 hex characters".to_owned())?;
        Ok(Self(hash))
    }
}

/// The 20 bytes a peer uses to identify itself, usually the client name and
/// version followed by random bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PeerId(pub [u8; 20]);

impl PeerId {
    /// Azureus-style client prefix, such as `-TR2940-`, when present.
    pub fn client(&self) -> Option<&str> {
        let prefix = &self.0[..8];
        if prefix[0] != b'-' || prefix[7] != b'-' {
            return None;
        }
        std::str::from_utf8(&prefix[1..7]).ok()
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.to_string();
        f.write_str(&s)
    }
}

impl From<[u8; 20]> for PeerId {
    fn from(value: [u8; 20]) -> Self {
        Self(value)
    }
}
