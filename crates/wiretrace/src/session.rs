//! Per-stream state and the dispatch of decoded messages to an observer.
//!
//! A [`Session`] is created for one captured stream and thrown away after
//! it. Its [`ExtensionTable`] is never shared, what one connection calls
//! sub-ID 3 means nothing to another.
use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::{trace, warn};

use crate::{
    error::Error,
    extensions::{self, Extended, Extension, ExtensionTable, HANDSHAKE_ID},
    observer::SessionObserver,
    types::{InfoHash, PeerId},
    wire::{Core, CoreCodec, ExtendedMessage, Handshake, HANDSHAKE_LEN},
};

/// Who the stream is talking to, as announced in the handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerCtx {
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
}

#[derive(Debug, Default)]
pub struct Session {
    /// Set once the handshake was decoded.
    pub ctx: Option<PeerCtx>,
    pub extensions: ExtensionTable,
    /// Bytes carried by `piece` messages, duplicates included.
    pub piece_bytes: u64,
    /// Decoded messages, keep-alives excluded.
    pub messages: usize,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a whole stream, handshake first.
    ///
    /// Stops at the first fatal error; the events already delivered and the
    /// counters of `self` stay as they were at that point.
    pub fn parse(
        &mut self,
        stream: &[u8],
        observer: &mut dyn SessionObserver,
    ) -> Result<(), Error> {
        let handshake = Handshake::decode(stream)?;
        let ctx = PeerCtx {
            info_hash: handshake.info_hash,
            peer_id: handshake.peer_id,
        };
        self.ctx = Some(ctx);
        observer.on_handshake(&handshake);

        let mut buf = BytesMut::from(&stream[HANDSHAKE_LEN..]);
        let mut codec = CoreCodec;

        while let Some(msg) = codec.decode_eof(&mut buf)? {
            self.dispatch(&ctx, msg, observer)?;
        }

        Ok(())
    }

    fn dispatch(
        &mut self,
        ctx: &PeerCtx,
        msg: Core,
        observer: &mut dyn SessionObserver,
    ) -> Result<(), Error> {
        match msg {
            Core::KeepAlive => {
                trace!("[MESSAGE] KEEP ALIVE");
                return Ok(());
            }
            Core::Unknown(id) => {
                warn!("[MESSAGE] UNKNOWN MESSAGE ID: {id}");
            }
            Core::Piece(ref block) => {
                self.piece_bytes += block.block.len() as u64;
            }
            Core::Extended(ext) => {
                self.messages += 1;
                return self.extended(ctx, ext, observer);
            }
            _ => {}
        }

        self.messages += 1;
        observer.on_message(ctx, &msg);
        Ok(())
    }

    fn extended(
        &mut self,
        ctx: &PeerCtx,
        mut ext: ExtendedMessage,
        observer: &mut dyn SessionObserver,
    ) -> Result<(), Error> {
        if ext.id == HANDSHAKE_ID {
            let handshake = Extension::decode(&ext.payload)?;
            self.extensions.apply(&handshake);

            ext.name = Some("handshake".to_owned());
            let event = Extended::Handshake(Box::new(handshake));
            observer.on_message(ctx, &Core::Extended(ext));
            observer.on_extended_message(ctx, &event);
            return Ok(());
        }

        let Some(name) = self.extensions.get(ext.id).map(str::to_owned) else {
            // the peer never said what this id means
            warn!("[MESSAGE] [EXTENDED] UNKNOWN MESSAGE ID: {}", ext.id);
            return Ok(());
        };

        let Some(decode) = extensions::decoder(&name) else {
            observer.on_extended_message(ctx, &Extended::Other(name));
            return Ok(());
        };

        let event = decode(&ext.payload)?;
        ext.name = Some(name);
        observer.on_message(ctx, &Core::Extended(ext));
        observer.on_extended_message(ctx, &event);
        Ok(())
    }
}
