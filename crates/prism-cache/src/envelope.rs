//! The versioned record envelope stored in a backend.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};
use crate::fingerprint::Fingerprint;
use crate::util::{bincode_deserialize, bincode_deserialize_prefix, bincode_serialize};

/// Derive the backend key for a declaration.
///
/// Pure in its inputs; bumping `format_version` moves every key.
pub fn cache_key(prefix: &str, encoded_id: &str, format_version: u32) -> String {
    let version = format_version.to_le_bytes();
    Fingerprint::from_parts([prefix.as_bytes(), encoded_id.as_bytes(), &version[..]])
        .as_str()
        .to_string()
}

#[derive(Serialize)]
struct Envelope<'a, V> {
    format_version: u32,
    id: &'a str,
    value: &'a V,
}

#[derive(Deserialize)]
struct EnvelopeHeader {
    format_version: u32,
    id: String,
}

#[derive(Deserialize)]
struct EnvelopeOwned<V> {
    #[allow(dead_code)]
    format_version: u32,
    #[allow(dead_code)]
    id: String,
    value: V,
}

pub fn encode_record<V: Serialize>(encoded_id: &str, format_version: u32, value: &V) -> Result<Vec<u8>> {
    bincode_serialize(&Envelope {
        format_version,
        id: encoded_id,
        value,
    })
}

/// Decode an envelope written by [`encode_record`].
///
/// The header is checked before the value is touched: a record from another format
/// version fails with [`CacheError::VersionMismatch`] rather than being misread.
pub fn decode_record<V: DeserializeOwned>(
    bytes: &[u8],
    format_version: u32,
    encoded_id: &str,
) -> Result<V> {
    let header: EnvelopeHeader = bincode_deserialize_prefix(bytes)?;
    if header.format_version != format_version {
        return Err(CacheError::VersionMismatch {
            expected: format_version,
            found: header.format_version,
        });
    }
    if header.id != encoded_id {
        return Err(CacheError::IdMismatch {
            expected: encoded_id.to_string(),
            found: header.id,
        });
    }
    let envelope: EnvelopeOwned<V> = bincode_deserialize(bytes)?;
    Ok(envelope.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_fixed_width_and_versioned() {
        let a = cache_key("prism", "App\\User", 1);
        assert_eq!(a.len(), 64);
        assert_eq!(a, cache_key("prism", "App\\User", 1));
        assert_ne!(a, cache_key("prism", "App\\User", 2));
        assert_ne!(a, cache_key("other", "App\\User", 1));
        assert_ne!(a, cache_key("prism", "App\\Users", 1));
    }

    #[test]
    fn version_mismatch_fails_loudly() {
        let bytes = encode_record("C::m()", 3, &vec![1u32, 2, 3]).unwrap();

        let value: Vec<u32> = decode_record(&bytes, 3, "C::m()").unwrap();
        assert_eq!(value, vec![1, 2, 3]);

        let err = decode_record::<Vec<u32>>(&bytes, 4, "C::m()").unwrap_err();
        assert!(matches!(
            err,
            CacheError::VersionMismatch {
                expected: 4,
                found: 3
            }
        ));

        let err = decode_record::<Vec<u32>>(&bytes, 3, "C::n()").unwrap_err();
        assert!(matches!(err, CacheError::IdMismatch { .. }));
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let bytes = encode_record("f()", 1, &"payload".to_string()).unwrap();
        assert!(decode_record::<String>(&bytes[..bytes.len() - 2], 1, "f()").is_err());
    }
}
