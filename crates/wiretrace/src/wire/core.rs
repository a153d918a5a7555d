use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use super::{Bitfield, Block, BlockInfo, MAX_SANE_MESSAGE_LEN};
use crate::error::Error;

/// The payload of message 20. The first value is decided when the peer sends
/// its extension header, in the `m` field.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedMessage {
    pub id: u8,
    /// Name negotiated for `id`, resolved by the session, never by the codec.
    pub name: Option<String>,
    pub payload: Vec<u8>,
}

impl ExtendedMessage {
    pub fn new(id: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self { id, name: None, payload: payload.into() }
    }
}

/// Messages exchanged after the handshake: the vanilla protocol, the fast
/// extension, DHT `port` and the extension protocol envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Core {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have(u32),
    Bitfield(Bitfield),
    Request(BlockInfo),
    Piece(Block),
    Cancel(BlockInfo),
    Port(u16),
    SuggestPiece(u32),
    HaveAll,
    HaveNone,
    Reject(BlockInfo),
    AllowedFast(u32),
    Extended(ExtendedMessage),
    /// A message ID with no known meaning, its payload is skipped.
    Unknown(u8),
}

/// The IDs of the [`Core`] messages.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CoreId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
    Port = 9,
    SuggestPiece = 13,
    HaveAll = 14,
    HaveNone = 15,
    Reject = 16,
    AllowedFast = 17,
    Extended = 20,
}

impl TryFrom<u8> for CoreId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use CoreId::*;
        Ok(match value {
            0 => Choke,
            1 => Unchoke,
            2 => Interested,
            3 => NotInterested,
            4 => Have,
            5 => Bitfield,
            6 => Request,
            7 => Piece,
            8 => Cancel,
            9 => Port,
            13 => SuggestPiece,
            14 => HaveAll,
            15 => HaveNone,
            16 => Reject,
            17 => AllowedFast,
            20 => Extended,
            v => return Err(v),
        })
    }
}

impl Core {
    pub fn id(&self) -> Option<u8> {
        use Core::*;
        let id = match self {
            KeepAlive => return None,
            Unknown(id) => return Some(*id),
            Choke => CoreId::Choke,
            Unchoke => CoreId::Unchoke,
            Interested => CoreId::Interested,
            NotInterested => CoreId::NotInterested,
            Have(_) => CoreId::Have,
            Bitfield(_) => CoreId::Bitfield,
            Request(_) => CoreId::Request,
            Piece(_) => CoreId::Piece,
            Cancel(_) => CoreId::Cancel,
            Port(_) => CoreId::Port,
            SuggestPiece(_) => CoreId::SuggestPiece,
            HaveAll => CoreId::HaveAll,
            HaveNone => CoreId::HaveNone,
            Reject(_) => CoreId::Reject,
            AllowedFast(_) => CoreId::AllowedFast,
            Extended(_) => CoreId::Extended,
        };
        Some(id as u8)
    }

    /// The event name observers see for this message.
    pub fn name(&self) -> &'static str {
        use Core::*;
        match self {
            KeepAlive => "keep_alive",
            Choke => "choke",
            Unchoke => "unchoke",
            Interested => "interested",
            NotInterested => "not_interested",
            Have(_) => "have",
            Bitfield(_) => "bitfield",
            Request(_) => "request",
            Piece(_) => "piece",
            Cancel(_) => "cancel",
            Port(_) => "port",
            SuggestPiece(_) => "suggest_piece",
            HaveAll => "have_all",
            HaveNone => "have_none",
            Reject(_) => "reject",
            AllowedFast(_) => "allowed_fast",
            Extended(_) => "extended",
            Unknown(_) => "unknown",
        }
    }

    /// Decode the body of a message whose ID byte was already read.
    ///
    /// `payload` is exactly the `L - 1` bytes that follow the ID.
    pub fn from_frame(msg_id: u8, mut payload: &[u8]) -> Result<Self, Error> {
        let Ok(id) = CoreId::try_from(msg_id) else {
            return Ok(Core::Unknown(msg_id));
        };

        let need = |n: usize| -> Result<(), Error> {
            if payload.len() < n {
                return Err(Error::invalid(format!(
                    "{id:?} message needs {n} bytes of payload, got {}",
                    payload.len()
                )));
            }
            Ok(())
        };

        let msg = match id {
            // <len=0001><id=0>
            CoreId::Choke => Core::Choke,

            // <len=0001><id=1>
            CoreId::Unchoke => Core::Unchoke,

            // <len=0001><id=2>
            CoreId::Interested => Core::Interested,

            // <len=0001><id=3>
            CoreId::NotInterested => Core::NotInterested,

            // <len=0005><id=4><piece index>
            CoreId::Have => {
                need(4)?;
                Core::Have(payload.get_u32())
            }

            // <len=0001+X><id=5><bitfield>
            CoreId::Bitfield => Core::Bitfield(Bitfield::from_slice(payload)),

            // <len=0013><id=6><index><begin><length>
            CoreId::Request => {
                need(12)?;
                Core::Request(block_info(&mut payload))
            }

            // <len=0009+X><id=7><index><begin><block>
            CoreId::Piece => {
                need(8)?;
                let index = payload.get_u32();
                let begin = payload.get_u32();
                Core::Piece(Block { index, begin, block: payload.to_vec() })
            }

            // <len=0013><id=8><index><begin><length>
            CoreId::Cancel => {
                need(12)?;
                Core::Cancel(block_info(&mut payload))
            }

            // <len=0003><id=9><listen-port>
            CoreId::Port => {
                need(2)?;
                Core::Port(payload.get_u16())
            }

            // <len=0005><id=13><piece index>
            CoreId::SuggestPiece => {
                need(4)?;
                Core::SuggestPiece(payload.get_u32())
            }

            // <len=0001><id=14>
            CoreId::HaveAll => Core::HaveAll,

            // <len=0001><id=15>
            CoreId::HaveNone => Core::HaveNone,

            // <len=0013><id=16><index><begin><length>
            CoreId::Reject => {
                need(12)?;
                Core::Reject(block_info(&mut payload))
            }

            // <len=0005><id=17><piece index>
            CoreId::AllowedFast => {
                need(4)?;
                Core::AllowedFast(payload.get_u32())
            }

            // <len=0002+X><id=20><ext_id><payload>
            CoreId::Extended => {
                need(1)?;
                let ext_id = payload.get_u8();
                Core::Extended(ExtendedMessage::new(ext_id, payload))
            }
        };

        Ok(msg)
    }
}

fn block_info(payload: &mut &[u8]) -> BlockInfo {
    let index = payload.get_u32();
    let begin = payload.get_u32();
    let len = payload.get_u32();
    BlockInfo { index, begin, len }
}

/// Length-prefixed framing over an in-memory stream.
///
/// [`Decoder::decode`] yields `None` while the buffer does not hold a whole
/// message; [`Decoder::decode_eof`] turns leftover bytes into
/// [`Error::UnexpectedEndOfStream`], since a captured stream never grows.
#[derive(Debug, Clone, Default)]
pub struct CoreCodec;

impl Decoder for CoreCodec {
    type Item = Core;
    type Error = Error;

    fn decode(
        &mut self,
        buf: &mut BytesMut,
    ) -> Result<Option<Self::Item>, Self::Error> {
        // the message length header must be present at the minimum, otherwise
        // we can't determine the message type
        if buf.len() < 4 {
            return Ok(None);
        }

        // peek at length prefix without consuming
        let size =
            u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

        if size == 0 {
            buf.advance(4);
            return Ok(Some(Core::KeepAlive));
        }

        // the message claims more bytes than the buffer holds, leave the
        // cursor where it is
        if buf.len() - 4 < size {
            return Ok(None);
        }

        if size > MAX_SANE_MESSAGE_LEN {
            warn!(
                "Message length is over {MAX_SANE_MESSAGE_LEN}. Possibly \
                 corrupt. ({size} bytes)"
            );
        }

        buf.advance(4);
        let mut frame = buf.split_to(size);
        let msg_id = frame.get_u8();

        Core::from_frame(msg_id, &frame).map(Some)
    }

    fn decode_eof(
        &mut self,
        buf: &mut BytesMut,
    ) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(msg) => Ok(Some(msg)),
            None if buf.is_empty() => Ok(None),
            None => Err(Error::UnexpectedEndOfStream),
        }
    }
}

impl Encoder<Core> for CoreCodec {
    type Error = Error;

    fn encode(&mut self, item: Core, buf: &mut BytesMut) -> Result<(), Error> {
        let Some(id) = item.id() else {
            buf.put_u32(0);
            return Ok(());
        };

        let mut body = BytesMut::new();
        match item {
            Core::Have(index)
            | Core::SuggestPiece(index)
            | Core::AllowedFast(index) => body.put_u32(index),
            Core::Bitfield(bitfield) => {
                body.extend_from_slice(bitfield.as_raw_slice())
            }
            Core::Request(info) | Core::Cancel(info) | Core::Reject(info) => {
                info.encode(&mut body)
            }
            Core::Piece(block) => block.encode(&mut body),
            Core::Port(port) => body.put_u16(port),
            Core::Extended(ExtendedMessage { id, payload, .. }) => {
                body.put_u8(id);
                body.extend_from_slice(&payload);
            }
            _ => {}
        }

        let len = u32::try_from(body.len() + 1)
            .map_err(|_| Error::invalid("message too large to encode"))?;
        buf.put_u32(len);
        buf.put_u8(id);
        buf.extend_from_slice(&body);
        Ok(())
    }
}
