//! Memory limits of a chunked read session.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_common::{Result, error::Error};
use strata_format::Codec;

/// Per-codec multiplier of the decompressed page size that models the temporary
/// memory a codec holds while decompressing.
///
/// The values are tuned policy, not derived: a codec with large internal windows
/// effectively occupies several times its output before that memory is released.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Codec, f64>", into = "BTreeMap<Codec, f64>")]
pub struct CodecScratchTable([f64; Codec::COUNT]);

impl CodecScratchTable {
    pub const DEFAULT_UNCOMPRESSED: f64 = 0.0;
    pub const DEFAULT_LZ4: f64 = 0.5;
    pub const DEFAULT_ZSTD: f64 = 3.0;

    /// A table where no codec reserves scratch memory.
    pub fn zero() -> CodecScratchTable {
        CodecScratchTable([0.0; Codec::COUNT])
    }

    pub fn get(&self, codec: Codec) -> f64 {
        self.0[codec.ordinal()]
    }

    pub fn with(mut self, codec: Codec, multiplier: f64) -> Self {
        self.0[codec.ordinal()] = multiplier;
        self
    }

    /// Scratch bytes reserved for decompressing `uncompressed_size` bytes.
    pub fn scratch_bytes(&self, codec: Codec, uncompressed_size: u64) -> u64 {
        let bytes = (uncompressed_size as f64 * self.get(codec)).ceil();
        if bytes >= u64::MAX as f64 {
            u64::MAX
        } else {
            bytes as u64
        }
    }

    pub fn validate(&self) -> Result<()> {
        for codec in Codec::ALL {
            let multiplier = self.get(codec);
            if !multiplier.is_finite() || multiplier < 0.0 {
                return Err(Error::invalid_arg(
                    "codec_scratch",
                    format!("invalid multiplier {multiplier} for {codec}"),
                ));
            }
        }
        Ok(())
    }
}

impl Default for CodecScratchTable {
    fn default() -> Self {
        CodecScratchTable::zero()
            .with(Codec::Uncompressed, Self::DEFAULT_UNCOMPRESSED)
            .with(Codec::Lz4, Self::DEFAULT_LZ4)
            .with(Codec::Zstd, Self::DEFAULT_ZSTD)
    }
}

impl From<BTreeMap<Codec, f64>> for CodecScratchTable {
    /// Codecs missing from the map keep their default multiplier.
    fn from(map: BTreeMap<Codec, f64>) -> Self {
        map.into_iter()
            .fold(CodecScratchTable::default(), |table, (codec, multiplier)| {
                table.with(codec, multiplier)
            })
    }
}

impl From<CodecScratchTable> for BTreeMap<Codec, f64> {
    fn from(table: CodecScratchTable) -> Self {
        Codec::ALL
            .into_iter()
            .map(|codec| (codec, table.get(codec)))
            .collect()
    }
}

/// Output and working-memory limits of a read session.
///
/// A size limit of `0` means "unbounded".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadLimits {
    /// Cap on the estimated decoded size of one output chunk, in bytes.
    pub output_size_limit: u64,
    /// Cap on the compressed, decompressed and scratch memory held by one pass, in bytes.
    pub input_size_limit: u64,
    /// Maximum number of rows a single output table may hold.
    pub row_count_limit: u64,
    pub codec_scratch: CodecScratchTable,
}

impl ReadLimits {
    /// Row limit of the 32-bit offsets used by the Arrow containers.
    pub const DEFAULT_ROW_COUNT_LIMIT: u64 = i32::MAX as u64;

    pub fn unbounded() -> ReadLimits {
        ReadLimits::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.row_count_limit == 0 {
            return Err(Error::invalid_arg(
                "row_count_limit",
                "row count limit must be positive",
            ));
        }
        self.codec_scratch.validate()
    }

    /// Parses limits from their JSON representation. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<ReadLimits> {
        let limits: ReadLimits =
            serde_json::from_str(json).map_err(|e| Error::serialization("read limits", e))?;
        limits.validate()?;
        Ok(limits)
    }
}

impl Default for ReadLimits {
    fn default() -> Self {
        ReadLimits {
            output_size_limit: 0,
            input_size_limit: 0,
            row_count_limit: Self::DEFAULT_ROW_COUNT_LIMIT,
            codec_scratch: CodecScratchTable::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scratch_table() {
        let table = CodecScratchTable::default();
        assert_eq!(table.get(Codec::Uncompressed), 0.0);
        assert_eq!(table.get(Codec::Lz4), 0.5);
        assert_eq!(table.get(Codec::Zstd), 3.0);
        assert_eq!(table.scratch_bytes(Codec::Lz4, 101), 51);
        assert_eq!(table.scratch_bytes(Codec::Zstd, 100), 300);
        assert_eq!(table.scratch_bytes(Codec::Uncompressed, 100), 0);
    }

    #[test]
    fn test_limits_from_json() {
        let limits =
            ReadLimits::from_json(r#"{"output_size_limit": 1024, "codec_scratch": {"zstd": 8.0}}"#)
                .unwrap();
        assert_eq!(limits.output_size_limit, 1024);
        assert_eq!(limits.input_size_limit, 0);
        assert_eq!(limits.row_count_limit, ReadLimits::DEFAULT_ROW_COUNT_LIMIT);
        assert_eq!(limits.codec_scratch.get(Codec::Zstd), 8.0);
        assert_eq!(limits.codec_scratch.get(Codec::Lz4), 0.5);
    }

    #[test]
    fn test_limits_json_round_trip() {
        let limits = ReadLimits {
            input_size_limit: 77,
            ..Default::default()
        };
        let json = serde_json::to_string(&limits).unwrap();
        assert!(json.contains("\"lz4\":0.5"));
        assert_eq!(ReadLimits::from_json(&json).unwrap(), limits);
    }

    #[test]
    fn test_invalid_limits() {
        assert!(ReadLimits::from_json(r#"{"codec_scratch": {"lz4": -1.0}}"#).is_err());
        assert!(ReadLimits::from_json(r#"{"row_count_limit": 0}"#).is_err());
        assert!(ReadLimits::from_json(r#"{"codec_scratch": {"snappy": 1.0}}"#).is_err());
    }
}
