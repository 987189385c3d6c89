//! The codec plugin contract
//!
//! A codec is one (format, version) binding. It answers three recognition
//! questions during resolution and, once selected, builds decoders and
//! encoders:
//!
//! 1. [`claim_uri`](HtsCodec::claim_uri): does this codec own the locator
//!    outright (custom protocol scheme)?
//! 2. [`can_decode_uri`](HtsCodec::can_decode_uri): does the locator look
//!    like this format (extension, scheme)?
//! 3. [`can_decode_signature`](HtsCodec::can_decode_signature): do the first
//!    [`signature_probe_size`](HtsCodec::signature_probe_size) bytes carry
//!    this format's magic?
//!
//! Codecs are shared between threads behind `Arc`, so they hold no per-file
//! state; everything per-file lives in the decoder or encoder.

use crate::bundle::{Bundle, Locator, SignatureProbingStream};
use crate::error::Result;
use crate::format::{Category, FileFormat};
use crate::options::{DecoderOptions, EncoderOptions};
use crate::types::{HtsHeader, HtsRecord};
use crate::version::Version;
use std::fmt;

/// A format plugin
pub trait HtsCodec: Send + Sync {
    /// Concrete format this codec handles
    fn file_format(&self) -> FileFormat;

    /// Category, derived from the format
    fn category(&self) -> Category {
        self.file_format().category()
    }

    /// Format version; never [`Version::NEWEST`]
    fn version(&self) -> Version;

    /// Name used in logs and error messages
    fn display_name(&self) -> &str;

    /// Whether the locator looks like this codec's format
    fn can_decode_uri(&self, locator: &Locator) -> bool;

    /// Whether this codec owns the locator regardless of content
    fn claim_uri(&self, _locator: &Locator) -> bool {
        false
    }

    /// Whether the probed prefix carries this codec's signature.
    ///
    /// Implementations may read from `stream`; the resolver resets it before
    /// the next candidate.
    fn can_decode_signature(&self, stream: &mut SignatureProbingStream, source_name: &str) -> bool;

    /// Number of prefix bytes [`can_decode_signature`](Self::can_decode_signature) needs
    fn signature_probe_size(&self) -> usize;

    /// Build a decoder over the bundle's primary resource
    fn decoder(&self, bundle: Bundle, options: &DecoderOptions) -> Result<Box<dyn HtsDecoder>>;

    /// Build an encoder over the bundle's primary resource
    fn encoder(&self, bundle: Bundle, options: &EncoderOptions) -> Result<Box<dyn HtsEncoder>>;
}

impl fmt::Debug for dyn HtsCodec + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtsCodec")
            .field("name", &self.display_name())
            .field("format", &self.file_format())
            .field("version", &self.version())
            .finish()
    }
}

/// Reads records of one format
pub trait HtsDecoder: Send {
    /// Name of the decoder (codec and source)
    fn display_name(&self) -> &str;

    /// Format being decoded
    fn file_format(&self) -> FileFormat;

    /// Version being decoded
    fn version(&self) -> Version;

    /// File header, read when the decoder was created
    fn header(&self) -> &HtsHeader;

    /// Next record, or `None` at end of input
    fn read_record(&mut self) -> Result<Option<HtsRecord>>;
}

impl dyn HtsDecoder + '_ {
    /// Iterate over the remaining records
    pub fn records(&mut self) -> Records<'_> {
        Records { decoder: self }
    }
}

/// Iterator over a decoder's records
pub struct Records<'a> {
    decoder: &'a mut dyn HtsDecoder,
}

impl Iterator for Records<'_> {
    type Item = Result<HtsRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.read_record().transpose()
    }
}

/// Writes records of one format
pub trait HtsEncoder: Send {
    /// Name of the encoder (codec and destination)
    fn display_name(&self) -> &str;

    /// Format being written
    fn file_format(&self) -> FileFormat;

    /// Version being written
    fn version(&self) -> Version;

    /// Write the header; must precede any record
    fn write_header(&mut self, header: &HtsHeader) -> Result<()>;

    /// Write one record
    fn write_record(&mut self, record: &HtsRecord) -> Result<()>;

    /// Flush everything and write any trailer
    fn finish(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::VcfCodec;
    use std::sync::Arc;

    #[test]
    fn test_codec_debug_names_format_and_version() {
        let codec: Arc<dyn HtsCodec> = Arc::new(VcfCodec::new(VcfCodec::V4_2));
        let debug = format!("{:?}", codec);
        assert!(debug.contains("VCF 4.2"), "{}", debug);
        assert!(debug.contains("Vcf"), "{}", debug);

        // Resolution results can be unwrapped in either direction
        let result: Result<Arc<dyn HtsCodec>> = Ok(codec);
        assert_eq!(result.unwrap().display_name(), "VCF 4.2");
    }
}
