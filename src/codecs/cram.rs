//! CRAM 3.0 / 3.1 codec
//!
//! Recognition and header access only. Record decoding needs the reference
//! sequence and the CRAM 3.1 entropy codecs, and encoding needs both plus a
//! record layout strategy; both report [`CodecError::Unsupported`].
//!
//! # File layout
//!
//! ```text
//! File definition (26 bytes):
//! - Magic: "CRAM" (4 bytes)
//! - Major version: u8
//! - Minor version: u8
//! - File ID: [u8; 20]
//!
//! SAM header container:
//! - Container header (length: i32 LE, then ITF-8/LTF-8 fields, CRC32)
//! - One block whose content is l_text (i32 LE) + SAM header text
//! ```

use super::{codec_name, instance_name, open_input};
use crate::bundle::{Bundle, Locator, SignatureProbingStream};
use crate::codec::{HtsCodec, HtsDecoder, HtsEncoder};
use crate::error::{CodecError, Result};
use crate::format::{FileFormat, ReadsFormat};
use crate::options::{DecoderOptions, EncoderOptions};
use crate::types::{HtsHeader, HtsRecord};
use crate::version::Version;
use flate2::read::MultiGzDecoder;
use std::io::{self, Read};

const CRAM_MAGIC: &[u8; 4] = b"CRAM";

/// Size of the file definition
const FILE_DEFINITION_SIZE: usize = 26;

/// Reference-compressed alignments, one instance per minor version.
#[derive(Debug, Clone)]
pub struct CramCodec {
    version: Version,
    name: String,
}

impl CramCodec {
    /// CRAM 3.0
    pub const V3_0: Version = Version::new(3, 0, 0);
    /// CRAM 3.1
    pub const V3_1: Version = Version::new(3, 1, 0);

    /// Create the codec for `version`
    pub fn new(version: Version) -> Self {
        Self {
            version,
            name: codec_name("CRAM", version),
        }
    }
}

impl HtsCodec for CramCodec {
    fn file_format(&self) -> FileFormat {
        FileFormat::Reads(ReadsFormat::Cram)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn can_decode_uri(&self, locator: &Locator) -> bool {
        locator.has_extension(".cram")
    }

    /// Magic plus this codec's exact major and minor version bytes.
    fn can_decode_signature(
        &self,
        stream: &mut SignatureProbingStream,
        _source_name: &str,
    ) -> bool {
        let mut prefix = [0u8; 6];
        stream.read_exact(&mut prefix).is_ok()
            && &prefix[..4] == CRAM_MAGIC
            && u32::from(prefix[4]) == self.version.major()
            && u32::from(prefix[5]) == self.version.minor()
    }

    fn signature_probe_size(&self) -> usize {
        CRAM_MAGIC.len() + 2
    }

    fn decoder(&self, bundle: Bundle, _options: &DecoderOptions) -> Result<Box<dyn HtsDecoder>> {
        let mut input = open_input(bundle)?;
        let invalid = |msg: String| CodecError::InvalidFormat {
            format: "CRAM".to_string(),
            source_name: input.name.clone(),
            msg,
        };

        let mut definition = [0u8; FILE_DEFINITION_SIZE];
        input
            .stream
            .read_exact(&mut definition)
            .map_err(|e| invalid(format!("Failed to read file definition: {}", e)))?;
        if &definition[..4] != CRAM_MAGIC {
            return Err(invalid("Invalid CRAM magic number".to_string()));
        }
        let found = (u32::from(definition[4]), u32::from(definition[5]));
        if found != (self.version.major(), self.version.minor()) {
            return Err(invalid(format!(
                "Expected CRAM {}.{}, found {}.{}",
                self.version.major(),
                self.version.minor(),
                found.0,
                found.1
            )));
        }

        let text = read_sam_header(&mut input.stream).map_err(|e| invalid(e.to_string()))?;
        let references = HtsHeader::references_from_sam_text(&text);

        Ok(Box::new(CramDecoder {
            name: instance_name(&self.name, &input.name),
            codec: self.name.clone(),
            version: self.version,
            header: HtsHeader::new(text, references),
        }))
    }

    fn encoder(&self, _bundle: Bundle, _options: &EncoderOptions) -> Result<Box<dyn HtsEncoder>> {
        Err(CodecError::Unsupported {
            codec: self.name.clone(),
            operation: "CRAM encoding",
        })
    }
}

struct CramDecoder {
    name: String,
    codec: String,
    version: Version,
    header: HtsHeader,
}

impl HtsDecoder for CramDecoder {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn file_format(&self) -> FileFormat {
        FileFormat::Reads(ReadsFormat::Cram)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn header(&self) -> &HtsHeader {
        &self.header
    }

    fn read_record(&mut self) -> Result<Option<HtsRecord>> {
        Err(CodecError::Unsupported {
            codec: self.codec.clone(),
            operation: "CRAM record decoding",
        })
    }
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Decode an ITF-8 integer.
///
/// The count of leading 1 bits in the first byte gives the number of bytes
/// that follow:
/// - `0xxxxxxx`: 1 byte
/// - `10xxxxxx`: 2 bytes
/// - `110xxxxx`: 3 bytes
/// - `1110xxxx`: 4 bytes
/// - `1111xxxx`: 5 bytes; only the low 4 bits of the last byte are used
fn decode_itf8<R: Read>(reader: &mut R) -> io::Result<i32> {
    let first = read_u8(reader)? as u32;

    let value = if first & 0x80 == 0 {
        first
    } else if first & 0x40 == 0 {
        ((first & 0x3F) << 8) | read_u8(reader)? as u32
    } else if first & 0x20 == 0 {
        let mut rest = [0u8; 2];
        reader.read_exact(&mut rest)?;
        ((first & 0x1F) << 16) | (rest[0] as u32) << 8 | rest[1] as u32
    } else if first & 0x10 == 0 {
        let mut rest = [0u8; 3];
        reader.read_exact(&mut rest)?;
        ((first & 0x0F) << 24) | (rest[0] as u32) << 16 | (rest[1] as u32) << 8 | rest[2] as u32
    } else {
        let mut rest = [0u8; 4];
        reader.read_exact(&mut rest)?;
        ((first & 0x0F) << 28)
            | (rest[0] as u32) << 20
            | (rest[1] as u32) << 12
            | (rest[2] as u32) << 4
            | (rest[3] as u32 & 0x0F)
    };

    Ok(value as i32)
}

/// Decode an LTF-8 integer: like ITF-8, up to 9 bytes, every following
/// byte used in full.
fn decode_ltf8<R: Read>(reader: &mut R) -> io::Result<i64> {
    let first = read_u8(reader)?;
    let extra = first.leading_ones() as usize;

    let mut value: u64 = if extra >= 7 {
        0
    } else {
        u64::from(first & (0x7F >> extra))
    };
    for _ in 0..extra {
        value = (value << 8) | u64::from(read_u8(reader)?);
    }

    Ok(value as i64)
}

/// The fields of a container header needed to locate the SAM header block
struct ContainerHeader {
    /// Container data length in bytes, excluding the header
    length: i32,
    start_position: i32,
    num_records: i32,
}

impl ContainerHeader {
    fn parse<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut length_buf = [0u8; 4];
        reader.read_exact(&mut length_buf)?;
        let length = i32::from_le_bytes(length_buf);

        let _reference_id = decode_itf8(reader)?;
        let start_position = decode_itf8(reader)?;
        let _alignment_span = decode_itf8(reader)?;
        let num_records = decode_itf8(reader)?;
        let _record_counter = decode_ltf8(reader)?;
        let _bases = decode_ltf8(reader)?;
        let _num_blocks = decode_itf8(reader)?;
        let num_landmarks = decode_itf8(reader)?;
        for _ in 0..num_landmarks.max(0) {
            decode_itf8(reader)?;
        }

        let mut crc = [0u8; 4];
        reader.read_exact(&mut crc)?;

        Ok(Self {
            length,
            start_position,
            num_records,
        })
    }

    fn is_sam_header_container(&self) -> bool {
        self.length > 0 && self.num_records == 0 && self.start_position == 0
    }
}

/// Read and decompress the first block of a container
fn read_block<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let method = read_u8(reader)?;
    let _content_type = read_u8(reader)?;
    let _content_id = decode_itf8(reader)?;
    let compressed_size = decode_itf8(reader)?;
    let raw_size = decode_itf8(reader)?;
    if compressed_size < 0 || raw_size < 0 {
        return Err(invalid_data("Negative block size"));
    }

    let mut data = vec![0u8; compressed_size as usize];
    reader.read_exact(&mut data)?;

    match method {
        0 => Ok(data),
        1 => {
            let mut inflated = Vec::with_capacity(raw_size as usize);
            MultiGzDecoder::new(&data[..]).read_to_end(&mut inflated)?;
            Ok(inflated)
        }
        other => Err(invalid_data(format!(
            "Block compression method {} is not supported for the SAM header",
            other
        ))),
    }
}

/// Read the SAM header container that follows the file definition
fn read_sam_header<R: Read>(reader: &mut R) -> io::Result<String> {
    let container = ContainerHeader::parse(reader)?;
    if !container.is_sam_header_container() {
        return Err(invalid_data("First container is not a SAM header container"));
    }

    let mut container_data = vec![0u8; container.length as usize];
    reader.read_exact(&mut container_data)?;
    let block = read_block(&mut &container_data[..])?;

    if block.len() < 4 {
        return Err(invalid_data("SAM header block too short"));
    }
    let text_len = i32::from_le_bytes([block[0], block[1], block[2], block[3]]);
    let end = usize::try_from(text_len)
        .ok()
        .and_then(|len| len.checked_add(4))
        .filter(|end| *end <= block.len())
        .ok_or_else(|| invalid_data(format!("Invalid SAM header length: {}", text_len)))?;

    let mut text = block[4..end].to_vec();
    while text.last() == Some(&0) {
        text.pop();
    }
    String::from_utf8(text).map_err(|e| invalid_data(format!("Invalid UTF-8 in SAM header: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::content_types::ALIGNED_READS;
    use bytes::Bytes;
    use std::io::Cursor;

    fn encode_itf8(buf: &mut Vec<u8>, value: i32) {
        if (0..128).contains(&value) {
            buf.push(value as u8);
        } else if (0..16384).contains(&value) {
            buf.push(0x80 | ((value >> 8) & 0x3F) as u8);
            buf.push((value & 0xFF) as u8);
        } else {
            let v = value as u32;
            buf.push(0xF0 | ((v >> 28) & 0x0F) as u8);
            buf.push((v >> 20) as u8);
            buf.push((v >> 12) as u8);
            buf.push((v >> 4) as u8);
            buf.push((v & 0x0F) as u8);
        }
    }

    fn make_cram(major: u8, minor: u8, text: &str) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(CRAM_MAGIC);
        data.push(major);
        data.push(minor);
        data.extend_from_slice(&[0u8; 20]);

        // Raw block: l_text + text
        let mut content = (text.len() as i32).to_le_bytes().to_vec();
        content.extend_from_slice(text.as_bytes());
        let mut block = vec![0u8, 0u8]; // method raw, content type FILE_HEADER
        encode_itf8(&mut block, 0);
        encode_itf8(&mut block, content.len() as i32);
        encode_itf8(&mut block, content.len() as i32);
        block.extend_from_slice(&content);
        block.extend_from_slice(&[0u8; 4]); // CRC32

        data.extend_from_slice(&(block.len() as i32).to_le_bytes());
        encode_itf8(&mut data, 0); // reference id
        encode_itf8(&mut data, 0); // start
        encode_itf8(&mut data, 0); // span
        encode_itf8(&mut data, 0); // records
        data.push(0); // record counter (LTF-8)
        data.push(0); // bases (LTF-8)
        encode_itf8(&mut data, 1); // blocks
        encode_itf8(&mut data, 0); // landmarks
        data.extend_from_slice(&[0u8; 4]); // CRC32
        data.extend_from_slice(&block);
        data
    }

    #[test]
    fn test_signature_distinguishes_minor_version() {
        let v30 = CramCodec::new(CramCodec::V3_0);
        let v31 = CramCodec::new(CramCodec::V3_1);
        let mut probe = SignatureProbingStream::new(Bytes::from_static(b"CRAM\x03\x01"));

        assert!(v31.can_decode_signature(&mut probe, "x.cram"));
        probe.reset();
        assert!(!v30.can_decode_signature(&mut probe, "x.cram"));

        let mut short = SignatureProbingStream::new(Bytes::from_static(b"CRA"));
        assert!(!v30.can_decode_signature(&mut short, "x.cram"));
    }

    #[test]
    fn test_itf8() {
        assert_eq!(decode_itf8(&mut Cursor::new([0x85u8, 0x42])).unwrap(), 0x542);
        assert_eq!(decode_itf8(&mut Cursor::new([0x7Fu8])).unwrap(), 127);
        assert_eq!(decode_itf8(&mut Cursor::new([0xFFu8, 0xFF, 0xFF, 0xFF, 0x0F])).unwrap(), -1);

        for value in [0, 127, 128, 16383, 70_000, i32::MAX, -1] {
            let mut buf = Vec::new();
            encode_itf8(&mut buf, value);
            assert_eq!(decode_itf8(&mut Cursor::new(buf)).unwrap(), value);
        }
        assert!(decode_itf8(&mut Cursor::new([0x80u8])).is_err());
    }

    #[test]
    fn test_ltf8() {
        assert_eq!(decode_ltf8(&mut Cursor::new([0x05u8])).unwrap(), 5);
        assert_eq!(decode_ltf8(&mut Cursor::new([0x81u8, 0x00])).unwrap(), 256);
        let mut nine = vec![0xFFu8];
        nine.extend_from_slice(&1u64.to_be_bytes());
        assert_eq!(decode_ltf8(&mut Cursor::new(nine)).unwrap(), 1);
    }

    #[test]
    fn test_decoder_reads_header() {
        let text = "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:248956422\n";
        let bundle =
            Bundle::from_input_stream(Cursor::new(make_cram(3, 1, text)), "mem", ALIGNED_READS);

        let mut decoder = CramCodec::new(CramCodec::V3_1)
            .decoder(bundle, &DecoderOptions::default())
            .unwrap();
        assert_eq!(decoder.header().text, text);
        assert_eq!(decoder.header().references[0].name, "chr1");
        assert!(matches!(decoder.read_record(), Err(CodecError::Unsupported { .. })));
    }

    #[test]
    fn test_decoder_rejects_other_version() {
        let content = Cursor::new(make_cram(3, 0, "@HD\tVN:1.6\n"));
        let bundle = Bundle::from_input_stream(content, "mem", ALIGNED_READS);
        assert!(matches!(
            CramCodec::new(CramCodec::V3_1).decoder(bundle, &DecoderOptions::default()),
            Err(CodecError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_encoding_unsupported() {
        let bundle = Bundle::from_output_stream(Vec::new(), "mem", ALIGNED_READS);
        assert!(matches!(
            CramCodec::new(CramCodec::V3_1).encoder(bundle, &EncoderOptions::default()),
            Err(CodecError::Unsupported { .. })
        ));
    }
}
