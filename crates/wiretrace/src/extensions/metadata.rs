//! ut_metadata, BEP 9.
use crate::{codec, error::Error};

pub const NAME: &str = "ut_metadata";

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataMsg {
    /// msg_type 0
    Request(u32),
    /// msg_type 1, the metadata piece follows the dictionary.
    Data {
        piece: u32,
        total_size: Option<u32>,
        data: Vec<u8>,
    },
    /// msg_type 2
    Reject(u32),
}

impl MetadataMsg {
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let dict = codec::decode_dict(buf)?;

        let msg_type = codec::get_int(&dict, "msg_type")?
            .ok_or_else(|| Error::invalid("ut_metadata without msg_type"))?;
        let piece = codec::get_int(&dict, "piece")?
            .and_then(|p| u32::try_from(p).ok())
            .ok_or_else(|| {
                Error::invalid("ut_metadata without a valid piece")
            })?;

        match msg_type {
            0 => Ok(Self::Request(piece)),
            1 => {
                let total_size = codec::get_int(&dict, "total_size")?
                    .and_then(|s| u32::try_from(s).ok());
                // whatever the dictionary did not consume is the piece
                let dict_len = codec::encode(&dict)?.len();
                let data = buf.get(dict_len..).unwrap_or_default().to_vec();
                Ok(Self::Data { piece, total_size, data })
            }
            2 => Ok(Self::Reject(piece)),
            t => Err(Error::invalid(format!(
                "unknown ut_metadata msg_type {t}"
            ))),
        }
    }

    pub fn piece(&self) -> u32 {
        match self {
            Self::Request(piece) | Self::Reject(piece) => *piece,
            Self::Data { piece, .. } => *piece,
        }
    }
}
