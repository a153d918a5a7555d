//! A passive decoder for captured BitTorrent peer wire streams.
//!
//! A stream is the raw bytes one side of a connection sent: the handshake
//! followed by length-prefixed messages. This crate decodes those bytes, it
//! never talks to a peer. It follows the extension protocol negotiation of
//! each stream, decodes the payloads of the extensions it knows, rebuilds
//! pieces from `piece` messages and verifies them against the hashes of
//! torrent files.
//!
//! Decoded messages are delivered to a [`observer::SessionObserver`]. The
//! [`analyzer::Analyzer`] wires the logging observer and the
//! [`reassembler::PieceReassembler`] together for batches of files.
//!
//! # Example
//!
//! ```
//! use wiretrace::{observer::NoopObserver, session::Session, wire::Handshake};
//!
//! let mut stream = Handshake::new([0u8; 20], [0u8; 20]).serialize().to_vec();
//! // have, piece 3
//! stream.extend_from_slice(&[0, 0, 0, 5, 4, 0, 0, 0, 3]);
//!
//! let mut session = Session::new();
//! session.parse(&stream, &mut NoopObserver).unwrap();
//! assert_eq!(session.messages, 1);
//! ```

pub mod analyzer;
pub mod codec;
pub mod config;
pub mod error;
pub mod extensions;
pub mod metainfo;
pub mod observer;
pub mod reassembler;
pub mod session;
pub mod store;
pub mod types;
pub mod wire;
