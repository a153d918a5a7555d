//! Thin seam over the bencode codec and the SHA-1 digest.
//!
//! Everything that touches bendy or sha1_smol goes through here, so the rest
//! of the crate only sees owned [`Value`]s and byte arrays.

use bendy::{
    decoding::{Decoder, FromBencode},
    encoding::ToBencode,
    value::Value,
};

use crate::error::Error;

/// A decoded bencode value that owns its bytes.
pub type BValue = Value<'static>;

/// Decode the first bencoded value of `buf`.
///
/// Bytes after the value are ignored, which is what `ut_metadata` data
/// messages need: the metadata piece is appended right after the dict.
pub fn decode(buf: &[u8]) -> Result<BValue, Error> {
    let mut decoder = Decoder::new(buf);
    let object = decoder
        .next_object()?
        .ok_or_else(|| Error::invalid("empty bencoded payload"))?;
    Ok(Value::decode_bencode_object(object)?)
}

/// Decode the first bencoded value of `buf` into a typed struct.
pub fn decode_as<T: FromBencode>(buf: &[u8]) -> Result<T, Error> {
    let mut decoder = Decoder::new(buf);
    let object = decoder
        .next_object()?
        .ok_or_else(|| Error::invalid("empty bencoded payload"))?;
    Ok(T::decode_bencode_object(object)?)
}

/// Decode the first bencoded value of `buf` and require it to be a dict.
pub fn decode_dict(buf: &[u8]) -> Result<BValue, Error> {
    let value = decode(buf)?;
    match value {
        Value::Dict(_) => Ok(value),
        _ => Err(Error::invalid("expected a bencoded dictionary")),
    }
}

pub fn encode(value: &BValue) -> Result<Vec<u8>, Error> {
    Ok(value.to_bencode()?)
}

pub fn sha1(buf: &[u8]) -> [u8; 20] {
    let mut hash = sha1_smol::Sha1::new();
    hash.update(buf);
    hash.digest().bytes()
}

pub fn get<'v>(dict: &'v BValue, key: &[u8]) -> Option<&'v BValue> {
    match dict {
        Value::Dict(d) => d.get(key),
        _ => None,
    }
}

pub fn get_int(dict: &BValue, key: &str) -> Result<Option<i64>, Error> {
    match get(dict, key.as_bytes()) {
        None => Ok(None),
        Some(Value::Integer(i)) => Ok(Some(*i)),
        Some(_) => Err(Error::invalid(format!("`{key}` is not an integer"))),
    }
}

pub fn get_bytes<'v>(
    dict: &'v BValue,
    key: &str,
) -> Result<Option<&'v [u8]>, Error> {
    match get(dict, key.as_bytes()) {
        None => Ok(None),
        Some(Value::Bytes(b)) => Ok(Some(&b[..])),
        Some(_) => Err(Error::invalid(format!("`{key}` is not a byte string"))),
    }
}

pub fn get_list<'v>(
    dict: &'v BValue,
    key: &str,
) -> Result<Option<&'v [BValue]>, Error> {
    match get(dict, key.as_bytes()) {
        None => Ok(None),
        Some(Value::List(l)) => Ok(Some(l.as_slice())),
        Some(_) => Err(Error::invalid(format!("`{key}` is not a list"))),
    }
}

/// Renders a value for log lines: byte strings as text when printable,
/// otherwise as hex.
pub fn display(value: &BValue) -> String {
    match value {
        Value::Integer(i) => i.to_string(),
        Value::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) if s.chars().all(|c| !c.is_control()) => format!("{s:?}"),
            _ => format!("0x{}", hex::encode(b)),
        },
        Value::List(l) => {
            let items: Vec<String> = l.iter().map(display).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Dict(d) => {
            let items: Vec<String> = d
                .iter()
                .map(|(k, v)| {
                    format!("{}: {}", String::from_utf8_lossy(k), display(v))
                })
                .collect();
            format!("{{{}}}", items.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ignores_trailing_bytes() {
        let buf = b"d8:msg_typei1e5:piecei0eeRAWDATA";
        let value = decode_dict(buf).unwrap();

        assert_eq!(get_int(&value, "msg_type").unwrap(), Some(1));
        assert_eq!(get_int(&value, "piece").unwrap(), Some(0));
        assert_eq!(encode(&value).unwrap().len(), buf.len() - 7);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode(b"x"), Err(Error::InvalidStream(_))));
        assert!(matches!(decode(b""), Err(Error::InvalidStream(_))));
        assert!(matches!(decode_dict(b"i3e"), Err(Error::InvalidStream(_))));
    }

    #[test]
    fn typed_accessors() {
        let value = decode_dict(b"d1:ai1e1:b2:xy1:cl1:zee").unwrap();

        assert_eq!(get_bytes(&value, "b").unwrap(), Some(&b"xy"[..]));
        assert_eq!(get_list(&value, "c").unwrap().map(|l| l.len()), Some(1));
        assert_eq!(get_int(&value, "missing").unwrap(), None);
        assert!(get_int(&value, "b").is_err());
        assert!(get_bytes(&value, "a").is_err());
        assert_eq!(display(&value), "{a: 1, b: \"xy\", c: [\"z\"]}");
    }

    #[test]
    fn sha1_digest() {
        assert_eq!(
            hex::encode(sha1(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }
}
