//! The output boundary of a [`crate::session::Session`].
//!
//! Events are delivered synchronously and in stream order. Every callback
//! defaults to doing nothing, so an observer only implements what it cares
//! about.
use tracing::{debug, info};

use crate::{
    codec,
    extensions::{Extended, MetadataMsg},
    session::PeerCtx,
    wire::{Core, Handshake},
};

pub trait SessionObserver {
    /// The stream opened with a valid handshake.
    fn on_handshake(&mut self, _handshake: &Handshake) {}

    /// A message was decoded. Extended messages with a known name arrive
    /// here first as [`Core::Extended`], with the negotiated name filled in.
    fn on_message(&mut self, _ctx: &PeerCtx, _msg: &Core) {}

    /// An extended message with a negotiated name was decoded.
    fn on_extended_message(&mut self, _ctx: &PeerCtx, _msg: &Extended) {}
}

/// Ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Logs one line per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_handshake(&mut self, handshake: &Handshake) {
        info!("pstr: {}", String::from_utf8_lossy(&handshake.pstr));
        info!("reserved: {}", hex::encode(handshake.reserved));
        info!("infohash: {}", handshake.info_hash);
        info!("peerid: {}", handshake.peer_id);

        if let Some(client) = handshake.peer_id.client() {
            debug!("client: {client}");
        }
        debug!(
            "extension protocol: {} fast: {} dht: {}",
            handshake.supports_extension_protocol(),
            handshake.supports_fast(),
            handshake.supports_dht()
        );
    }

    fn on_message(&mut self, _ctx: &PeerCtx, msg: &Core) {
        match msg {
            Core::KeepAlive => debug!("[MESSAGE] KEEP ALIVE"),
            Core::Choke => info!("[MESSAGE] CHOKE"),
            Core::Unchoke => info!("[MESSAGE] UNCHOKE"),
            Core::Interested => info!("[MESSAGE] INTERESTED"),
            Core::NotInterested => info!("[MESSAGE] NOT INTERESTED"),
            Core::Have(index) => info!("[MESSAGE] HAVE: {index}"),
            Core::Bitfield(bitfield) => {
                let bits: String = bitfield
                    .iter()
                    .map(|b| if *b { '1' } else { '0' })
                    .collect();
                info!("[MESSAGE] BITFIELD: {bits}");
            }
            Core::Request(b) => info!(
                "[MESSAGE] REQUEST: index={} begin={} length={}",
                b.index, b.begin, b.len
            ),
            Core::Piece(b) => info!(
                "[MESSAGE] PIECE: index={} begin={} length={}",
                b.index,
                b.begin,
                b.block.len()
            ),
            Core::Cancel(b) => info!(
                "[MESSAGE] CANCEL: index={} begin={} length={}",
                b.index, b.begin, b.len
            ),
            Core::Port(port) => info!("[MESSAGE] PORT: {port}"),
            Core::SuggestPiece(index) => {
                info!("[MESSAGE] SUGGEST PIECE: {index}")
            }
            Core::HaveAll => info!("[MESSAGE] HAVE ALL"),
            Core::HaveNone => info!("[MESSAGE] HAVE NONE"),
            Core::Reject(b) => info!(
                "[MESSAGE] REJECT: index={} begin={} length={}",
                b.index, b.begin, b.len
            ),
            Core::AllowedFast(index) => {
                info!("[MESSAGE] ALLOWED FAST: {index}")
            }
            Core::Extended(ext) => debug!(
                "[MESSAGE] [EXTENDED] id={} name={} {} bytes",
                ext.id,
                ext.name.as_deref().unwrap_or("?"),
                ext.payload.len()
            ),
            // already reported by the session
            Core::Unknown(_) => {}
        }
    }

    fn on_extended_message(&mut self, _ctx: &PeerCtx, msg: &Extended) {
        match msg {
            Extended::Handshake(ext) => {
                info!(
                    "[MESSAGE] [EXTENDED] HANDSHAKE: {}",
                    codec::display(&ext.raw)
                );
            }
            Extended::Metadata(MetadataMsg::Request(piece)) => {
                info!(
                    "[MESSAGE] [EXTENDED] ut_metadata: request for piece \
                     {piece}"
                );
            }
            Extended::Metadata(MetadataMsg::Data { piece, data, .. }) => {
                info!(
                    "[MESSAGE] [EXTENDED] ut_metadata: piece {piece} of \
                     size {}",
                    data.len()
                );
            }
            Extended::Metadata(MetadataMsg::Reject(piece)) => {
                info!(
                    "[MESSAGE] [EXTENDED] ut_metadata: reject request for \
                     piece {piece}"
                );
            }
            Extended::UploadOnly(on) => {
                info!(
                    "[MESSAGE] [EXTENDED] upload_only: turned {}",
                    if *on { "on" } else { "off" }
                );
            }
            Extended::Tex(tex) => {
                info!(
                    "[MESSAGE] [EXTENDED] lt_tex: announced {} tracker(s).",
                    tex.len()
                );
                for tracker in tex.trackers() {
                    debug!("[MESSAGE] [EXTENDED] lt_tex: {tracker}");
                }
            }
            Extended::Pex(pex) => {
                info!(
                    "[MESSAGE] [EXTENDED] ut_pex: added {} peers ({} prefer(s) \
                     encryption; {} is/are seeder(s)). dropped {}.",
                    pex.added.len(),
                    pex.prefer_encryption(),
                    pex.seeders(),
                    pex.dropped.len()
                );
                if pex.has_ipv6() {
                    info!(
                        "[MESSAGE] [EXTENDED]         also added {} IPv6 peers \
                         ({} prefer(s) encryption; {} is/are seeder(s)). \
                         dropped {}.",
                        pex.added6.len(),
                        pex.prefer_encryption6(),
                        pex.seeders6(),
                        pex.dropped6.len()
                    );
                }
            }
            Extended::Other(name) => {
                info!("[MESSAGE] [EXTENDED] \"{name}\" message.")
            }
        }
    }
}

/// Forwards every event to each observer, in the order they were added.
#[derive(Default)]
pub struct Fanout<'a> {
    observers: Vec<&'a mut dyn SessionObserver>,
}

impl<'a> Fanout<'a> {
    pub fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub fn with(mut self, observer: &'a mut dyn SessionObserver) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl SessionObserver for Fanout<'_> {
    fn on_handshake(&mut self, handshake: &Handshake) {
        for o in self.observers.iter_mut() {
            o.on_handshake(handshake);
        }
    }

    fn on_message(&mut self, ctx: &PeerCtx, msg: &Core) {
        for o in self.observers.iter_mut() {
            o.on_message(ctx, msg);
        }
    }

    fn on_extended_message(&mut self, ctx: &PeerCtx, msg: &Extended) {
        for o in self.observers.iter_mut() {
            o.on_extended_message(ctx, msg);
        }
    }
}

/// Records events by name, used by the tests of the crate.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub handshakes: usize,
    pub messages: Vec<Core>,
    pub extended: Vec<Extended>,
}

#[cfg(test)]
impl SessionObserver for Recorder {
    fn on_handshake(&mut self, _handshake: &Handshake) {
        self.handshakes += 1;
    }

    fn on_message(&mut self, _ctx: &PeerCtx, msg: &Core) {
        self.messages.push(msg.clone());
    }

    fn on_extended_message(&mut self, _ctx: &PeerCtx, msg: &Extended) {
        self.extended.push(msg.clone());
    }
}
