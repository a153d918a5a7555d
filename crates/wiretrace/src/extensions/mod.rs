//! Extension protocol (BEP 10) negotiation and the payload decoders of the
//! extensions we know how to read.
//!
//! Message 20 carries a one byte sub-ID. Sub-ID 0 is the extension
//! handshake, which tells us what the peer will call each extension on the
//! rest of the connection. Every other sub-ID means nothing until a handshake
//! has named it, and the mapping only lives as long as the stream does.
pub mod metadata;
pub mod pex;
pub mod tex;
pub mod upload_only;

pub use metadata::MetadataMsg;
pub use pex::{PexFlags, PexMsg, PexPeer};
pub use tex::TexMsg;

use std::collections::BTreeMap;

use bendy::{
    decoding::{FromBencode, Object, ResultExt},
    encoding::AsString,
};
use hashbrown::HashMap;
use tracing::warn;

use crate::{
    codec::{self, BValue},
    error::Error,
};

/// The sub-ID reserved for the extension handshake.
pub const HANDSHAKE_ID: u8 = 0;

/// This is the payload of the extension handshake described on:
/// BEP 10 - Extension Protocol
/// http://www.bittorrent.org/beps/bep_0010.html
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    /// messages (supported extensions), by name.
    /// 0 means the peer disabled the extension.
    pub m: BTreeMap<String, i64>,
    /// port
    pub p: Option<u16>,
    /// a string identifying the client and the version
    pub v: Option<String>,
    /// number of outstanding requests messages this client supports
    /// without dropping any.
    pub reqq: Option<u16>,
    /// added by BEP 9
    /// the size of the metadata file, which is the
    /// info-dictionary part of the metainfo(.torrent) file
    pub metadata_size: Option<u32>,
    /// our address, as seen by the peer
    pub yourip: Option<Vec<u8>>,
    /// The whole dictionary, known keys or not.
    pub raw: BValue,
}

/// Only the typed fields, `raw` is filled by [`Extension::decode`].
struct ExtensionFields {
    m: BTreeMap<String, i64>,
    p: Option<u16>,
    v: Option<String>,
    reqq: Option<u16>,
    metadata_size: Option<u32>,
    yourip: Option<Vec<u8>>,
}

impl FromBencode for ExtensionFields {
    fn decode_bencode_object(
        object: Object,
    ) -> Result<Self, bendy::decoding::Error>
    where
        Self: Sized,
    {
        let mut dict = object.try_into_dictionary()?;
        let mut m = BTreeMap::new();
        let mut p = None;
        let mut v = None;
        let mut reqq = None;
        let mut metadata_size = None;
        let mut yourip = None;

        while let Some(pair) = dict.next_pair()? {
            match pair {
                (b"m", value) => {
                    let mut names = value.try_into_dictionary().context("m")?;
                    while let Some((name, value)) = names.next_pair()? {
                        let id = i64::decode_bencode_object(value)
                            .context("m")?;
                        let name = String::from_utf8_lossy(name);
                        m.insert(name.into_owned(), id);
                    }
                }
                (b"metadata_size", value) => {
                    metadata_size = u32::decode_bencode_object(value)
                        .context("metadata_size")
                        .map(Some)?;
                }
                // integers out of u16 range are dropped, other types are
                // still an error
                (b"p", value) => {
                    p = i64::decode_bencode_object(value)
                        .context("p")
                        .map(|p| u16::try_from(p).ok())?;
                }
                (b"reqq", value) => {
                    reqq = i64::decode_bencode_object(value)
                        .context("reqq")
                        .map(|r| u16::try_from(r).ok())?;
                }
                (b"v", value) => {
                    v = AsString::<Vec<u8>>::decode_bencode_object(value)
                        .context("v")
                        .map(|s| {
                            Some(String::from_utf8_lossy(&s.0).into_owned())
                        })?;
                }
                (b"yourip", value) => {
                    yourip = AsString::decode_bencode_object(value)
                        .context("yourip")
                        .map(|s| Some(s.0))?;
                }
                _ => {}
            }
        }

        Ok(Self { m, p, v, reqq, metadata_size, yourip })
    }
}

impl Extension {
    /// Decode the payload of an extension handshake (sub-ID 0).
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let raw = codec::decode_dict(buf)?;
        let ExtensionFields { m, p, v, reqq, metadata_size, yourip } =
            codec::decode_as(buf)?;

        Ok(Self { m, p, v, reqq, metadata_size, yourip, raw })
    }
}

/// Connection-scoped mapping from extended sub-ID to extension name.
///
/// Owned by a single [`crate::session::Session`], it is mutated only by
/// [`ExtensionTable::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionTable {
    names: HashMap<u8, String>,
}

impl ExtensionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The name negotiated for `id`, if any.
    pub fn get(&self, id: u8) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// The sub-ID currently mapped to `name`, if any.
    pub fn id_of(&self, name: &str) -> Option<u8> {
        self.names.iter().find(|(_, n)| *n == name).map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Apply the `m` dictionary of an extension handshake.
    ///
    /// A value of 0 unregisters the name, any other value maps the name to
    /// it. A name owns at most one sub-ID at a time.
    pub fn apply(&mut self, ext: &Extension) {
        for (name, value) in &ext.m {
            match *value {
                0 => {
                    self.names.retain(|_, n| n.as_str() != name.as_str());
                }
                1..=255 => {
                    self.names.retain(|_, n| n.as_str() != name.as_str());
                    self.names.insert(*value as u8, name.clone());
                }
                v => {
                    warn!(
                        "[MESSAGE] [EXTENDED] ignoring {name} with invalid \
                         id {v}"
                    );
                }
            }
        }
    }
}

/// A decoded extended message, named by what the session negotiated.
#[derive(Debug, Clone, PartialEq)]
pub enum Extended {
    Handshake(Box<Extension>),
    Metadata(MetadataMsg),
    Pex(PexMsg),
    Tex(TexMsg),
    UploadOnly(bool),
    /// A negotiated extension we have no decoder for.
    Other(String),
}

impl Extended {
    pub fn name(&self) -> &str {
        match self {
            Extended::Handshake(_) => "handshake",
            Extended::Metadata(_) => metadata::NAME,
            Extended::Pex(_) => pex::NAME,
            Extended::Tex(_) => tex::NAME,
            Extended::UploadOnly(_) => upload_only::NAME,
            Extended::Other(name) => name,
        }
    }
}

pub type PayloadDecoder = fn(&[u8]) -> Result<Extended, Error>;

fn decode_metadata(buf: &[u8]) -> Result<Extended, Error> {
    MetadataMsg::decode(buf).map(Extended::Metadata)
}

fn decode_pex(buf: &[u8]) -> Result<Extended, Error> {
    PexMsg::decode(buf).map(Extended::Pex)
}

fn decode_tex(buf: &[u8]) -> Result<Extended, Error> {
    TexMsg::decode(buf).map(Extended::Tex)
}

fn decode_upload_only(buf: &[u8]) -> Result<Extended, Error> {
    upload_only::decode(buf).map(Extended::UploadOnly)
}

/// Payload decoders by extension name.
pub static DECODERS: [(&str, PayloadDecoder); 4] = [
    (metadata::NAME, decode_metadata),
    (pex::NAME, decode_pex),
    (tex::NAME, decode_tex),
    (upload_only::NAME, decode_upload_only),
];

pub fn decoder(name: &str) -> Option<PayloadDecoder> {
    DECODERS.iter().find(|(n, _)| *n == name).map(|(_, d)| *d)
}
