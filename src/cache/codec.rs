//! Optional compression of stored payloads.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::error::CodecError;

/// Transform applied to response bodies on their way into and out of the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Codec {
    /// Bodies are stored as-is.
    #[default]
    Identity,
    /// Bodies are stored as zlib streams.
    Zlib,
}

impl Codec {
    /// `Zlib` when `use_compression` is set.
    pub fn from_flag(use_compression: bool) -> Self {
        if use_compression {
            Self::Zlib
        } else {
            Self::Identity
        }
    }

    pub fn encode(self, body: &Bytes) -> Result<Bytes, CodecError> {
        match self {
            Self::Identity => Ok(body.clone()),
            Self::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(body).map_err(CodecError::Encode)?;
                encoder.finish().map(Bytes::from).map_err(CodecError::Encode)
            }
        }
    }

    /// Fails with [`CodecError::Decode`] for anything that is not a complete zlib stream.
    pub fn decode(self, payload: Bytes) -> Result<Bytes, CodecError> {
        match self {
            Self::Identity => Ok(payload),
            Self::Zlib => {
                let mut body = Vec::with_capacity(payload.len() * 2);
                ZlibDecoder::new(payload.as_ref())
                    .read_to_end(&mut body)
                    .map_err(CodecError::Decode)?;
                Ok(Bytes::from(body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_passes_bytes_through() {
        let body = Bytes::from_static(b"<h1>post 5</h1>");
        let encoded = Codec::Identity.encode(&body).unwrap();
        assert_eq!(encoded, body);
        assert_eq!(Codec::Identity.decode(encoded).unwrap(), body);
    }

    #[test]
    fn zlib_restores_input_bytes() {
        let bodies = [
            Bytes::new(),
            Bytes::from_static(b"x"),
            Bytes::from("lorem ipsum ".repeat(512)),
            Bytes::from((0..=255u8).cycle().take(4096).collect::<Vec<_>>()),
        ];
        for body in bodies {
            let encoded = Codec::Zlib.encode(&body).unwrap();
            assert_eq!(Codec::Zlib.decode(encoded).unwrap(), body);
        }
    }

    #[test]
    fn zlib_shrinks_repetitive_bodies() {
        let body = Bytes::from("cached page ".repeat(1000));
        let encoded = Codec::Zlib.encode(&body).unwrap();
        assert!(encoded.len() < body.len() / 10);
    }

    #[test]
    fn zlib_rejects_foreign_payload() {
        let err = Codec::Zlib
            .decode(Bytes::from_static(b"<html>plain body</html>"))
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn flag_selects_codec() {
        assert_eq!(Codec::from_flag(true), Codec::Zlib);
        assert_eq!(Codec::from_flag(false), Codec::Identity);
        assert_eq!(Codec::default(), Codec::Identity);
    }
}
