//! lt_tex, tracker exchange.
use bendy::value::Value;

use crate::{codec, error::Error};

pub const NAME: &str = "lt_tex";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TexMsg {
    /// Announced tracker URLs, as sent.
    pub added: Vec<Vec<u8>>,
}

impl TexMsg {
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let dict = codec::decode_dict(buf)?;

        let added = codec::get_list(&dict, "added")?
            .unwrap_or_default()
            .iter()
            .map(|url| match url {
                Value::Bytes(url) => Ok(url.to_vec()),
                _ => Err(Error::invalid("lt_tex tracker is not a string")),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { added })
    }

    pub fn len(&self) -> usize {
        self.added.len()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
    }

    /// Tracker URLs, lossily decoded.
    pub fn trackers(&self) -> impl Iterator<Item = String> + '_ {
        self.added.iter().map(|u| String::from_utf8_lossy(u).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announced_trackers() {
        let msg = TexMsg::decode(
            b"d5:addedl22:udp://tracker.one:696923:http://two.org/announceee",
        )
        .unwrap();

        assert_eq!(msg.len(), 2);
        assert_eq!(
            msg.trackers().collect::<Vec<_>>(),
            vec!["udp://tracker.one:6969", "http://two.org/announce"]
        );
    }

    #[test]
    fn missing_added_is_empty() {
        assert!(TexMsg::decode(b"de").unwrap().is_empty());
    }

    #[test]
    fn malformed() {
        for bytes in [&b"d5:addedli1eee"[..], b"d5:added3:abce"] {
            assert!(matches!(
                TexMsg::decode(bytes),
                Err(Error::InvalidStream(_))
            ));
        }
    }
}
