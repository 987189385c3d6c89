//! Decoder and encoder options
//!
//! Plain serde structs; every field has a default so an options file only
//! needs the keys it changes:
//!
//! ```toml
//! [decoder]
//! buffer_size = 131072
//!
//! [encoder]
//! compression_level = 9
//! fasta_line_width = 80
//! ```

use crate::error::{CodecError, Result};
use crate::io::compression::PARALLEL_BLOCK_COUNT;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options passed to [`HtsCodec::decoder`](crate::codec::HtsCodec::decoder)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderOptions {
    /// Read buffer size in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Fail BAM decoding when the BGZF EOF marker is missing
    #[serde(default)]
    pub validate_eof_marker: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            validate_eof_marker: false,
        }
    }
}

/// Options passed to [`HtsCodec::encoder`](crate::codec::HtsCodec::encoder)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderOptions {
    /// Deflate level for BGZF output (0-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// BGZF blocks compressed in parallel
    #[serde(default = "default_parallel_blocks")]
    pub bgzf_parallel_blocks: usize,

    /// FASTA sequence line width (0 = no wrapping)
    #[serde(default = "default_fasta_line_width")]
    pub fasta_line_width: usize,

    /// Append the BGZF EOF marker when finishing
    #[serde(default = "default_true")]
    pub write_eof_marker: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
            bgzf_parallel_blocks: default_parallel_blocks(),
            fasta_line_width: default_fasta_line_width(),
            write_eof_marker: true,
        }
    }
}

/// Decoder and encoder options together, as loaded from one TOML file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecOptions {
    /// Decoder section
    #[serde(default)]
    pub decoder: DecoderOptions,

    /// Encoder section
    #[serde(default)]
    pub encoder: EncoderOptions,
}

impl CodecOptions {
    /// Parse options from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options: CodecOptions = toml::from_str(text)?;
        if options.encoder.compression_level > 9 {
            return Err(CodecError::Config(format!(
                "compression_level must be 0-9, got {}",
                options.encoder.compression_level
            )));
        }
        Ok(options)
    }

    /// Load options from a TOML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CodecError::Config(e.to_string()))
    }
}

fn default_true() -> bool {
    true
}

fn default_buffer_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_compression_level() -> u32 {
    6
}

fn default_parallel_blocks() -> usize {
    PARALLEL_BLOCK_COUNT
}

fn default_fasta_line_width() -> usize {
    60
}
