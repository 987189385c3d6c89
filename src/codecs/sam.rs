//! SAM 1.0 codec

use super::text::{check_header_lines, TextDecoder, TextEncoder};
use super::{codec_name, instance_name, open_input, open_output, Sink};
use crate::bundle::{Bundle, Locator, SignatureProbingStream};
use crate::codec::{HtsCodec, HtsDecoder, HtsEncoder};
use crate::error::Result;
use crate::format::{FileFormat, ReadsFormat};
use crate::options::{DecoderOptions, EncoderOptions};
use crate::types::HtsHeader;
use crate::version::Version;
use std::io::BufReader;

/// Header record types that may open a SAM file
const HEADER_TAGS: [&[u8; 3]; 5] = [b"@HD", b"@SQ", b"@RG", b"@PG", b"@CO"];

/// Plain-text SAM.
///
/// Recognised by a leading header line; headerless SAM is not detected by
/// signature and must be named by content subtype.
#[derive(Debug, Clone)]
pub struct SamCodec {
    name: String,
}

impl SamCodec {
    /// SAM format version
    pub const VERSION: Version = Version::new(1, 0, 0);

    /// Create the codec
    pub fn new() -> Self {
        Self {
            name: codec_name("SAM", Self::VERSION),
        }
    }
}

impl Default for SamCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl HtsCodec for SamCodec {
    fn file_format(&self) -> FileFormat {
        FileFormat::Reads(ReadsFormat::Sam)
    }

    fn version(&self) -> Version {
        Self::VERSION
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn can_decode_uri(&self, locator: &Locator) -> bool {
        locator.has_extension(".sam")
    }

    fn can_decode_signature(
        &self,
        stream: &mut SignatureProbingStream,
        _source_name: &str,
    ) -> bool {
        let prefix = stream.as_bytes();
        prefix.len() >= 4
            && prefix[3] == b'\t'
            && HEADER_TAGS.iter().any(|tag| prefix[..3] == tag[..])
    }

    fn signature_probe_size(&self) -> usize {
        4
    }

    fn decoder(&self, bundle: Bundle, options: &DecoderOptions) -> Result<Box<dyn HtsDecoder>> {
        let input = open_input(bundle)?;
        let reader = BufReader::with_capacity(options.buffer_size, input.stream);
        let decoder = TextDecoder::new(
            instance_name(&self.name, &input.name),
            self.file_format(),
            Self::VERSION,
            Box::new(reader),
            b'@',
            HtsHeader::references_from_sam_text,
        )?;
        Ok(Box::new(decoder))
    }

    fn encoder(&self, bundle: Bundle, _options: &EncoderOptions) -> Result<Box<dyn HtsEncoder>> {
        let output = open_output(bundle)?;
        Ok(Box::new(TextEncoder::new(
            instance_name(&self.name, &output.name),
            self.file_format(),
            Self::VERSION,
            Sink::plain(output.stream),
            render_header,
        )))
    }
}

fn render_header(text: &str, _version: Version) -> Result<String> {
    check_header_lines(text, '@', "SAM")?;
    Ok(text.to_string())
}
