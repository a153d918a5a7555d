//! Torrent descriptors: the `info` dictionary of a .torrent file and the
//! info hash computed from it.
use bendy::decoding::{self, FromBencode, Object, ResultExt};
use bendy::encoding::AsString;

use crate::{
    codec::{self, BValue},
    error::Error,
    types::InfoHash,
};

/// Size of a SHA-1 digest in the `pieces` string.
pub const PIECE_HASH_LEN: usize = 20;

#[derive(Debug, PartialEq, Clone)]
pub struct MetaInfo {
    pub announce: Option<String>,
    pub info: Info,
    /// SHA-1 of the bencoded `info` dictionary.
    pub info_hash: InfoHash,
}

impl MetaInfo {
    /// Parse a .torrent file.
    ///
    /// The info hash is computed over the `info` dictionary exactly as it
    /// appears in `buf`; bencode dictionaries are sorted, so re-encoding the
    /// decoded value gives back the same bytes.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        let invalid = |e: Error| Error::TorrentInvalid(e.to_string());

        let root = codec::decode_dict(buf).map_err(invalid)?;
        let info = match codec::get(&root, b"info") {
            Some(info @ BValue::Dict(_)) => info,
            Some(_) => {
                return Err(Error::TorrentInvalid(
                    "`info` is not a dictionary".into(),
                ))
            }
            None => {
                return Err(Error::TorrentInvalid("missing `info`".into()))
            }
        };

        let info_bytes = codec::encode(info)?;
        let info_hash = InfoHash(codec::sha1(&info_bytes));
        let info: Info = codec::decode_as(&info_bytes).map_err(invalid)?;

        if info.piece_length == 0 {
            return Err(Error::TorrentInvalid(
                "`piece length` must be positive".into(),
            ));
        }

        let announce = codec::get_bytes(&root, "announce")
            .ok()
            .flatten()
            .map(|a| String::from_utf8_lossy(a).into_owned());

        Ok(Self { announce, info, info_hash })
    }
}

/// The part of the info dictionary needed to verify pieces.
///
/// In a multi file torrent `name` is the name of the directory, and `length`
/// is replaced by `files`.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Info {
    /// piece length - number of bytes in a piece
    pub piece_length: u64,
    /// A (byte) string consisting of the concatenation of all 20-byte SHA1
    /// hash values, one per piece.
    pub pieces: Vec<u8>,
    pub name: Option<String>,
    /// length - bytes of the entire file
    pub length: Option<u64>,
    pub files: Option<Vec<File>>,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct File {
    pub length: u64,
    pub path: Vec<String>,
}

impl Info {
    pub fn piece_count(&self) -> usize {
        self.pieces.len() / PIECE_HASH_LEN
    }

    /// Bytes of all files of the torrent, when the descriptor says so and
    /// the sum fits in a `u64`.
    pub fn total_length(&self) -> Option<u64> {
        if let Some(length) = self.length {
            return Some(length);
        }
        self.files.as_ref().and_then(|files| {
            files.iter().try_fold(0u64, |sum, f| sum.checked_add(f.length))
        })
    }

    /// The expected SHA-1 of piece `index`.
    pub fn piece_hash(&self, index: u32) -> Option<&[u8]> {
        let begin = index as usize * PIECE_HASH_LEN;
        self.pieces.get(begin..begin + PIECE_HASH_LEN)
    }

    /// The size of piece `index`. Every piece is `piece_length` long, except
    /// the last one which takes the remainder of the total length.
    pub fn piece_size(&self, index: u32) -> u64 {
        let count = self.piece_count() as u64;
        let is_last = count > 0 && u64::from(index) == count - 1;

        match self.total_length() {
            Some(total) if is_last => {
                let before = self.piece_length.checked_mul(count - 1);
                match before.and_then(|before| total.checked_sub(before)) {
                    Some(last) if last > 0 && last <= self.piece_length => last,
                    _ => self.piece_length,
                }
            }
            _ => self.piece_length,
        }
    }
}

impl FromBencode for File {
    fn decode_bencode_object(object: Object) -> Result<Self, decoding::Error>
    where
        Self: Sized,
    {
        let mut dict_dec = object.try_into_dictionary()?;
        let mut length = 0;
        let mut path: Vec<String> = vec![];

        while let Some(pair) = dict_dec.next_pair()? {
            match pair {
                (b"length", value) => {
                    length =
                        u64::decode_bencode_object(value).context("length")?;
                }
                (b"path", value) => {
                    path = Vec::<String>::decode_bencode_object(value)
                        .context("path")?;
                }
                _ => {}
            }
        }

        Ok(Self { length, path })
    }
}

impl FromBencode for Info {
    fn decode_bencode_object(object: Object) -> Result<Self, decoding::Error>
    where
        Self: Sized,
    {
        let mut files = None;
        let mut length = None;
        let mut name = None;
        let mut piece_length = None;
        let mut pieces = None;

        let mut dict_dec = object.try_into_dictionary()?;
        while let Some(pair) = dict_dec.next_pair()? {
            match pair {
                (b"files", value) => {
                    files = Vec::<File>::decode_bencode_object(value)
                        .context("files")
                        .map(Some)?;
                }
                (b"length", value) => {
                    length = u64::decode_bencode_object(value)
                        .context("length")
                        .map(Some)?;
                }
                (b"name", value) => {
                    name = AsString::<Vec<u8>>::decode_bencode_object(value)
                        .context("name")
                        .map(|n| {
                            Some(String::from_utf8_lossy(&n.0).into_owned())
                        })?;
                }
                (b"piece length", value) => {
                    piece_length = u64::decode_bencode_object(value)
                        .context("piece length")
                        .map(Some)?;
                }
                (b"pieces", value) => {
                    pieces = AsString::decode_bencode_object(value)
                        .context("pieces")
                        .map(|bytes| Some(bytes.0))?;
                }
                _ => {}
            }
        }

        let piece_length = piece_length
            .ok_or_else(|| decoding::Error::missing_field("piece length"))?;
        let pieces =
            pieces.ok_or_else(|| decoding::Error::missing_field("pieces"))?;

        Ok(Info { piece_length, pieces, name, length, files })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A single file torrent with the given piece length, total length and
    /// concatenated piece hashes.
    pub(crate) fn torrent(
        piece_length: u64,
        length: u64,
        pieces: &[u8],
    ) -> Vec<u8> {
        let mut buf = b"d8:announce14:udp://tr.ck:804:infod".to_vec();
        buf.extend(format!("6:lengthi{length}e").bytes());
        buf.extend(b"4:name4:test");
        buf.extend(format!("12:piece lengthi{piece_length}e").bytes());
        buf.extend(format!("6:pieces{}:", pieces.len()).bytes());
        buf.extend_from_slice(pieces);
        buf.extend(b"ee");
        buf
    }

    #[test]
    fn info_hash_covers_the_info_dict() {
        let pieces = [7u8; 40];
        let buf = torrent(8, 12, &pieces);

        let meta = MetaInfo::from_bytes(&buf).unwrap();

        let begin = buf.windows(5).position(|w| w == b"infod").unwrap() + 4;
        let info_bytes = &buf[begin..buf.len() - 1];
        assert_eq!(meta.info_hash, InfoHash(codec::sha1(info_bytes)));

        assert_eq!(meta.announce.as_deref(), Some("udp://tr.ck:80"));
        assert_eq!(meta.info.name.as_deref(), Some("test"));
        assert_eq!(meta.info.piece_length, 8);
        assert_eq!(meta.info.piece_count(), 2);
        assert_eq!(meta.info.piece_hash(1), Some(&pieces[20..]));
        assert_eq!(meta.info.piece_hash(2), None);
    }

    #[test]
    fn last_piece_takes_the_remainder() {
        let meta = MetaInfo::from_bytes(&torrent(8, 12, &[0u8; 40])).unwrap();
        assert_eq!(meta.info.piece_size(0), 8);
        assert_eq!(meta.info.piece_size(1), 4);

        let meta = MetaInfo::from_bytes(&torrent(8, 16, &[0u8; 40])).unwrap();
        assert_eq!(meta.info.piece_size(1), 8);
    }

    #[test]
    fn multi_file_length() {
        let info = Info {
            piece_length: 10,
            pieces: vec![0; 60],
            files: Some(vec![
                File { length: 15, path: vec!["a".into()] },
                File { length: 10, path: vec!["b".into()] },
            ]),
            ..Default::default()
        };
        assert_eq!(info.total_length(), Some(25));
        assert_eq!(info.piece_size(2), 5);
    }

    #[test]
    fn without_length_every_piece_is_full() {
        let info =
            Info { piece_length: 8, pieces: vec![0; 40], ..Default::default() };
        assert_eq!(info.piece_size(1), 8);
    }

    #[test]
    fn huge_piece_length_does_not_overflow() {
        let piece_length = 1u64 << 62;
        let meta =
            MetaInfo::from_bytes(&torrent(piece_length, 100, &[0u8; 100]))
                .unwrap();

        assert_eq!(meta.info.piece_count(), 5);
        assert_eq!(meta.info.piece_size(4), piece_length);
        assert_eq!(meta.info.piece_size(0), piece_length);
    }

    #[test]
    fn file_lengths_that_overflow_have_no_total() {
        let info = Info {
            piece_length: 8,
            pieces: vec![0; 40],
            files: Some(vec![
                File { length: u64::MAX, path: vec!["a".into()] },
                File { length: 1, path: vec!["b".into()] },
            ]),
            ..Default::default()
        };
        assert_eq!(info.total_length(), None);
        assert_eq!(info.piece_size(1), 8);
    }

    #[test]
    fn invalid_torrents() {
        assert!(matches!(
            MetaInfo::from_bytes(b"d8:announce3:abce"),
            Err(Error::TorrentInvalid(_))
        ));
        assert!(matches!(
            MetaInfo::from_bytes(b"d4:infoi1ee"),
            Err(Error::TorrentInvalid(_))
        ));
        assert!(matches!(
            MetaInfo::from_bytes(b"d4:infod4:name1:aee"),
            Err(Error::TorrentInvalid(_))
        ));
        assert!(matches!(
            MetaInfo::from_bytes(b"garbage"),
            Err(Error::TorrentInvalid(_))
        ));
        assert!(matches!(
            MetaInfo::from_bytes(&torrent(0, 12, &[0u8; 20])),
            Err(Error::TorrentInvalid(_))
        ));
    }
}
