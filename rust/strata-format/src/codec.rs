use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use strata_common::{Result, error::Error};

/// Compression codec applied to the pages of a column chunk.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Uncompressed,
    Lz4,
    Zstd,
}

impl Codec {
    pub const COUNT: usize = 3;

    pub const ALL: [Codec; Codec::COUNT] = [Codec::Uncompressed, Codec::Lz4, Codec::Zstd];

    /// Dense index of the codec, suitable for table lookups.
    pub fn ordinal(self) -> usize {
        match self {
            Codec::Uncompressed => 0,
            Codec::Lz4 => 1,
            Codec::Zstd => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Uncompressed => "uncompressed",
            Codec::Lz4 => "lz4",
            Codec::Zstd => "zstd",
        }
    }

    pub fn is_compressed(self) -> bool {
        self != Codec::Uncompressed
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Codec> {
        Codec::ALL
            .into_iter()
            .find(|codec| codec.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_arg("codec", format!("unknown codec '{s}'")))
    }
}
