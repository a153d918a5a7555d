//! upload_only, a single byte telling whether the peer stopped downloading.
use crate::error::Error;

pub const NAME: &str = "upload_only";

/// `0x00` turns upload only mode off, anything else turns it on.
pub fn decode(buf: &[u8]) -> Result<bool, Error> {
    match buf.first() {
        Some(b) => Ok(*b != 0),
        None => Err(Error::invalid("empty upload_only payload")),
    }
}
