//! The "TCP wire" protocol as it appears in a captured stream: a fixed
//! handshake followed by length-prefixed messages.
pub mod core;
pub mod handshake;

pub use self::core::*;
pub use handshake::*;

use bitvec::{order::Msb0, vec::BitVec};
use bytes::{BufMut, BytesMut};

/// Protocol String
/// String identifier of the string "BitTorrent protocol", in bytes.
pub const PSTR: [u8; 19] = [
    66, 105, 116, 84, 111, 114, 114, 101, 110, 116, 32, 112, 114, 111, 116,
    111, 99, 111, 108,
];

/// Size of the handshake that opens every stream.
pub const HANDSHAKE_LEN: usize = 1 + 19 + 8 + 20 + 20;

/// A 16 KiB block plus the 9 bytes of a `piece` header. Anything larger is
/// suspicious but still decoded.
pub const MAX_SANE_MESSAGE_LEN: usize = 16393;

/// Bitfield where index = piece, most significant bit first.
pub type Bitfield = BitVec<u8, Msb0>;

/// A Block is a subset of a Piece, carried by the `piece` message.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block {
    /// The index of the piece this block belongs to.
    pub index: u32,
    /// The zero-based byte offset into the piece.
    pub begin: u32,
    /// The block's data.
    pub block: Vec<u8>,
}

impl Block {
    /// Encodes the block in the network binary protocol's format into the
    /// given buffer.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.index);
        buf.put_u32(self.begin);
        buf.extend_from_slice(&self.block);
    }
}

/// The representation of a [`Block`] without its data, used by `request`,
/// `cancel` and `reject`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockInfo {
    /// The index of the piece of which this is a block.
    pub index: u32,
    /// The zero-based byte offset into the piece.
    pub begin: u32,
    /// The block's length in bytes.
    pub len: u32,
}

impl From<&Block> for BlockInfo {
    fn from(val: &Block) -> Self {
        BlockInfo {
            index: val.index,
            begin: val.begin,
            len: val.block.len() as u32,
        }
    }
}

impl BlockInfo {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.index);
        buf.put_u32(self.begin);
        buf.put_u32(self.len);
    }
}
