use std::io;

use thiserror::Error;

impl From<bendy::decoding::Error> for Error {
    fn from(value: bendy::decoding::Error) -> Self {
        Self::InvalidStream(value.to_string())
    }
}

impl From<bendy::encoding::Error> for Error {
    fn from(_value: bendy::encoding::Error) -> Self {
        Self::BencodeError
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unexpected end of stream.")]
    UnexpectedEndOfStream,

    #[error("Invalid BitTorrent stream: {0}")]
    InvalidStream(String),

    #[error("Failed to encode the bencode buffer")]
    BencodeError,

    #[error("The torrent file is not valid: {0}")]
    TorrentInvalid(String),

    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(
        "Tried to load $HOME but could not find it. Please make sure you have \
         a $HOME env or pass the configuration file explicitly."
    )]
    HomeInvalid,
}

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidStream(reason.into())
    }
}
