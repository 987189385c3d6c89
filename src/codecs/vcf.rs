//! VCF 4.x codec, plain or BGZF compressed
//!
//! One instance per minor version. The version is taken from the mandatory
//! first header line, `##fileformat=VCFv4.N`, so no two instances ever
//! match the same file.

use super::text::{check_header_lines, TextDecoder, TextEncoder};
use super::{codec_name, instance_name, open_input, open_output, Sink};
use crate::bundle::{Bundle, Locator, SignatureProbingStream};
use crate::codec::{HtsCodec, HtsDecoder, HtsEncoder};
use crate::error::Result;
use crate::format::{FileFormat, VariantsFormat};
use crate::io::compression::{decompressed, inflate_prefix, is_gzip, BGZF_MAX_BLOCK_SIZE};
use crate::options::{DecoderOptions, EncoderOptions};
use crate::types::Reference;
use crate::version::Version;
use std::io::BufReader;

const FILEFORMAT_PREFIX: &str = "##fileformat=";

/// Variant calls in VCF
#[derive(Debug, Clone)]
pub struct VcfCodec {
    version: Version,
    name: String,
    fileformat_line: String,
}

impl VcfCodec {
    /// VCF 4.0
    pub const V4_0: Version = Version::new(4, 0, 0);
    /// VCF 4.1
    pub const V4_1: Version = Version::new(4, 1, 0);
    /// VCF 4.2
    pub const V4_2: Version = Version::new(4, 2, 0);
    /// VCF 4.3
    pub const V4_3: Version = Version::new(4, 3, 0);

    /// Create the codec for `version`
    pub fn new(version: Version) -> Self {
        Self {
            version,
            name: codec_name("VCF", version),
            fileformat_line: fileformat_line(version),
        }
    }
}

impl HtsCodec for VcfCodec {
    fn file_format(&self) -> FileFormat {
        FileFormat::Variants(VariantsFormat::Vcf)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn can_decode_uri(&self, locator: &Locator) -> bool {
        [".vcf", ".vcf.gz", ".vcf.bgz"]
            .iter()
            .any(|ext| locator.has_extension(ext))
    }

    fn can_decode_signature(
        &self,
        stream: &mut SignatureProbingStream,
        _source_name: &str,
    ) -> bool {
        let prefix = stream.as_bytes();
        let inflated;
        let text = if is_gzip(prefix) {
            inflated = inflate_prefix(prefix, BGZF_MAX_BLOCK_SIZE);
            &inflated[..]
        } else {
            prefix
        };

        let first_line = text.split(|&b| b == b'\n').next().unwrap_or_default();
        first_line.trim_ascii_end() == self.fileformat_line.as_bytes()
    }

    fn signature_probe_size(&self) -> usize {
        BGZF_MAX_BLOCK_SIZE
    }

    fn decoder(&self, bundle: Bundle, options: &DecoderOptions) -> Result<Box<dyn HtsDecoder>> {
        let input = open_input(bundle)?;
        let reader = BufReader::with_capacity(options.buffer_size, decompressed(input.stream)?);
        let decoder = TextDecoder::new(
            instance_name(&self.name, &input.name),
            self.file_format(),
            self.version,
            Box::new(reader),
            b'#',
            contigs,
        )?;
        Ok(Box::new(decoder))
    }

    /// Output named `*.gz` or `*.bgz` is BGZF compressed.
    fn encoder(&self, bundle: Bundle, options: &EncoderOptions) -> Result<Box<dyn HtsEncoder>> {
        let output = open_output(bundle)?;
        let name = instance_name(&self.name, &output.name);
        let sink = if output.wants_bgzf() {
            Sink::bgzf(output.stream, options)
        } else {
            Sink::plain(output.stream)
        };
        Ok(Box::new(TextEncoder::new(
            name,
            self.file_format(),
            self.version,
            sink,
            render_header,
        )))
    }
}

fn fileformat_line(version: Version) -> String {
    format!("{}VCFv{}.{}", FILEFORMAT_PREFIX, version.major(), version.minor())
}

/// Reference dictionary from `##contig=<ID=..,length=..>` lines.
///
/// Contigs without a length are skipped.
fn contigs(text: &str) -> Vec<Reference> {
    text.lines()
        .filter_map(|line| line.strip_prefix("##contig=<")?.strip_suffix('>'))
        .filter_map(|fields| {
            let mut id = None;
            let mut length = None;
            for field in fields.split(',') {
                match field.split_once('=') {
                    Some(("ID", value)) => id = Some(value.to_string()),
                    Some(("length", value)) => length = value.parse::<u32>().ok(),
                    _ => {}
                }
            }
            Some(Reference::new(id?, length?))
        })
        .collect()
}

/// Put this version's `##fileformat` line first, replacing any other.
fn render_header(text: &str, version: Version) -> Result<String> {
    check_header_lines(text, '#', "VCF")?;

    let mut rendered = fileformat_line(version);
    rendered.push('\n');
    for line in text
        .lines()
        .filter(|l| !l.is_empty() && !l.starts_with(FILEFORMAT_PREFIX))
    {
        rendered.push_str(line);
        rendered.push('\n');
    }
    Ok(rendered)
}
