//! Decoding of the 68 byte handshake that opens every stream.
//!
//! The handshake has a different structure than the rest of the messages and
//! may only appear once, at the very beginning of a stream. After it, the
//! stream is handed to [`super::CoreCodec`].

use bytes::{Buf, BufMut, BytesMut};

use super::{HANDSHAKE_LEN, PSTR};
use crate::{
    error::Error,
    types::{InfoHash, PeerId},
};

/// pstrlen = 19
/// pstr = "BitTorrent protocol"
/// The reserved field is 8 bytes used to advertise which extensions the peer
/// supports. The peer id is usually the client name and version.
#[derive(Clone, Debug, PartialEq)]
pub struct Handshake {
    pub pstr_len: u8,
    pub pstr: [u8; 19],
    pub reserved: [u8; 8],
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
}

impl Handshake {
    pub fn new(
        info_hash: impl Into<[u8; 20]>,
        peer_id: impl Into<[u8; 20]>,
    ) -> Self {
        let mut reserved = [0u8; 8];

        // `extension protocol`, bit 20 from the right
        reserved[5] |= 0x10;

        Self {
            pstr_len: 19,
            pstr: PSTR,
            reserved,
            info_hash: InfoHash(info_hash.into()),
            peer_id: PeerId(peer_id.into()),
        }
    }

    /// Decode the handshake at the start of `buf`.
    ///
    /// # Errors
    ///
    /// [`Error::UnexpectedEndOfStream`] if the buffer is shorter than the
    /// handshake, before any field is read. [`Error::InvalidStream`] if the
    /// protocol length or string are not the BitTorrent ones.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < HANDSHAKE_LEN {
            return Err(Error::UnexpectedEndOfStream);
        }

        let mut buf = &buf[..HANDSHAKE_LEN];

        let pstr_len = buf.get_u8();
        let mut pstr = [0; 19];
        buf.copy_to_slice(&mut pstr);

        if pstr_len as usize != PSTR.len() || pstr != PSTR {
            return Err(Error::invalid(
                "Stream does not contain BitTorrent data.",
            ));
        }

        let mut reserved = [0; 8];
        buf.copy_to_slice(&mut reserved);
        let mut info_hash = [0; 20];
        buf.copy_to_slice(&mut info_hash);
        let mut peer_id = [0; 20];
        buf.copy_to_slice(&mut peer_id);

        Ok(Self {
            pstr_len,
            pstr,
            reserved,
            info_hash: InfoHash(info_hash),
            peer_id: PeerId(peer_id),
        })
    }

    pub fn serialize(&self) -> [u8; HANDSHAKE_LEN] {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);

        buf.put_u8(self.pstr_len);
        buf.extend_from_slice(&self.pstr);
        buf.extend_from_slice(&self.reserved);
        buf.extend_from_slice(&self.info_hash.0);
        buf.extend_from_slice(&self.peer_id.0);

        let mut out = [0u8; HANDSHAKE_LEN];
        out.copy_from_slice(&buf);
        out
    }

    /// BEP 10, the peer understands message 20.
    pub fn supports_extension_protocol(&self) -> bool {
        self.reserved[5] & 0x10 != 0
    }

    /// BEP 6, have_all/have_none/suggest/reject/allowed_fast.
    pub fn supports_fast(&self) -> bool {
        self.reserved[7] & 0x04 != 0
    }

    /// BEP 5, the peer may send `port`.
    pub fn supports_dht(&self) -> bool {
        self.reserved[7] & 0x01 != 0
    }
}
