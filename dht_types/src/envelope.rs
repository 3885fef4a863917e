use bincode::config::{DefaultOptions, Options};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Bytes every wire message opens with, before the version and length fields.
pub const MAGIC_BYTES: [u8; 4] = *b"DHT1";
pub const VERSION_LENGTH: usize = 5;
pub const LENGTH_HEADER_SIZE: usize = 8;
pub const MAX_MESSAGE_BYTES: u64 = 1 << 20;

#[derive(Debug, Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct Version {
    pub major: u8,
    pub minor: u16,
    pub patch: u16,
}

pub static VERSION: Lazy<Version> = Lazy::new(|| {
    let version_string: &str = env!("CARGO_PKG_VERSION");
    match version_string.split('.').collect::<Vec<_>>()[..] {
        [major, minor, patch] => Version {
            major: major.parse().expect("major version is numeric"),
            minor: minor.parse().expect("minor version is numeric"),
            patch: patch.parse().expect("patch version is numeric"),
        },
        _ => panic!("CARGO_PKG_VERSION did not parse as major.minor.patch"),
    }
});

impl Version {
    pub fn to_bytes(self) -> Result<Vec<u8>, bincode::Error> {
        le_config().serialize(&self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        le_config().deserialize(bytes)
    }

    /// For now compatibility just requires matching major versions.
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.major == other.major
    }
}

fn le_config() -> impl Options {
    DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

/// Framing trait for anything sent over the wire: a fixed-int, little-endian
/// bincode payload preceded by an 8 byte length prefix. Callers prepend
/// `MAGIC_BYTES` and the encoded `VERSION` themselves before the length and
/// payload produced here (see `dht_utils::protocol`).
pub trait WireEnvelope<'a>
where
    Self: Serialize + Deserialize<'a>,
{
    fn to_frame(&self) -> Result<Vec<u8>, bincode::Error> {
        let payload = le_config().serialize(self)?;
        let mut buffer = Vec::with_capacity(LENGTH_HEADER_SIZE + payload.len());
        buffer.extend((payload.len() as u64).to_le_bytes());
        buffer.extend(payload);
        Ok(buffer)
    }

    fn from_payload(bytes: &'a [u8]) -> Result<Self, bincode::Error> {
        le_config().deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_roundtrips_through_magic_byte_slot() {
        let v = Version {
            major: 0,
            minor: 1,
            patch: 0,
        };
        let bytes = v.to_bytes().unwrap();
        assert_eq!(bytes.len(), VERSION_LENGTH);
        assert_eq!(Version::from_bytes(&bytes).unwrap(), v);
    }

    #[test]
    fn compatibility_only_checks_major() {
        let a = Version {
            major: 1,
            minor: 0,
            patch: 0,
        };
        let b = Version {
            major: 1,
            minor: 9,
            patch: 9,
        };
        assert!(a.is_compatible(&b));
    }
}
