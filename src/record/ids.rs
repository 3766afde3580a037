use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 16-byte trace identifier, rendered as 32 lowercase hex chars on the wire
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId([u8; 16]);

/// 8-byte span identifier, rendered as 16 lowercase hex chars on the wire
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId([u8; 8]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseIdError {
    Length { expected: usize, got: usize },
    InvalidHex(char),
    Zero,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseIdError::Length { expected, got } => {
                write!(f, "expected {} hex chars, got {}", expected, got)
            }
            ParseIdError::InvalidHex(c) => write!(f, "invalid hex char {:?}", c),
            ParseIdError::Zero => write!(f, "all-zero id is not a valid identifier"),
        }
    }
}

impl std::error::Error for ParseIdError {}

fn encode_hex(bytes: &[u8], out: &mut fmt::Formatter<'_>) -> fmt::Result {
    for b in bytes {
        write!(out, "{:02x}", b)?;
    }
    Ok(())
}

fn decode_hex<const N: usize>(s: &str) -> Result<[u8; N], ParseIdError> {
    if let Some(bad) = s.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(ParseIdError::InvalidHex(bad));
    }
    if s.len() != N * 2 {
        return Err(ParseIdError::Length {
            expected: N * 2,
            got: s.len(),
        });
    }
    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        let pair = &s[i * 2..i * 2 + 2];
        *byte = u8::from_str_radix(pair, 16).map_err(|_| ParseIdError::InvalidHex('?'))?;
    }
    if out.iter().all(|&b| b == 0) {
        return Err(ParseIdError::Zero);
    }
    Ok(out)
}

fn random_nonzero<const N: usize>() -> [u8; N] {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; N];
    loop {
        rng.fill(&mut bytes[..]);
        if bytes.iter().any(|&b| b != 0) {
            return bytes;
        }
    }
}

macro_rules! id_impls {
    ($name:ident, $len:expr) => {
        impl $name {
            pub fn random() -> Self {
                Self(random_nonzero::<$len>())
            }

            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// An all-zero id marks "absent" in some wire formats
            pub fn is_valid(&self) -> bool {
                self.0.iter().any(|&b| b != 0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                encode_hex(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(", stringify!($name))?;
                encode_hex(&self.0, f)?;
                write!(f, ")")
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_hex::<$len>(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(D::Error::custom)
            }
        }
    };
}

id_impls!(TraceId, 16);
id_impls!(SpanId, 8);
