//! Bundle resources: the endpoints a codec reads from or writes to
//!
//! A resource is either locator-backed ([`PathResource`]) or wraps a raw
//! stream ([`InputStreamResource`], [`OutputStreamResource`],
//! [`SeekableStreamResource`]). Every input-capable resource owns a
//! [`SignaturePrefix`] so repeated probes during one resolution never read
//! the underlying bytes twice.

use super::locator::Locator;
use super::probe::{signature_read_error, read_prefix, SignaturePrefix, SignatureProbingStream};
use crate::error::{CodecError, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read, Seek, SeekFrom, Write};

/// A readable, seekable stream
pub trait SeekableStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> SeekableStream for T {}

/// One named, directional endpoint of a [`Bundle`](super::Bundle).
///
/// Streams are handed out by value; a stream-backed resource can give its
/// stream away only once, after which the accessor fails with
/// [`CodecError::ResourceUnavailable`].
pub trait BundleResource: Send {
    /// Human-readable name used in logs and error messages
    fn display_name(&self) -> &str;

    /// Content type this resource carries (e.g. `ALIGNED_READS`)
    fn content_type(&self) -> &str;

    /// Declared content subtype (e.g. `"BAM"`), if any
    fn content_subtype(&self) -> Option<&str>;

    /// Locator, for path-backed resources
    fn locator(&self) -> Option<&Locator> {
        None
    }

    /// Whether the resource can be read from
    fn is_input(&self) -> bool;

    /// Whether the resource can be written to
    fn is_output(&self) -> bool;

    /// Whether [`seekable_stream`](Self::seekable_stream) can succeed
    fn has_seekable_stream(&self) -> bool {
        false
    }

    /// Stream positioned at the start of the content.
    ///
    /// Bytes consumed by signature probing are replayed.
    fn input_stream(&mut self) -> Result<Box<dyn BufRead + Send>>;

    /// Stream for writing the content
    fn output_stream(&mut self) -> Result<Box<dyn Write + Send>>;

    /// Seekable view of the content
    fn seekable_stream(&mut self) -> Result<Box<dyn SeekableStream>>;

    /// A view over the first `size` bytes, with mark/reset.
    ///
    /// The prefix is read once per resource instance. A later request for a
    /// larger size fails with [`CodecError::ProbeSizeViolation`].
    fn signature_probing_stream(&mut self, size: usize) -> Result<SignatureProbingStream>;
}

fn unavailable(resource: &str, what: &'static str) -> CodecError {
    CodecError::ResourceUnavailable {
        resource: resource.to_string(),
        what,
    }
}

/// A resource addressed by a [`Locator`]. Both input and output capable.
#[derive(Debug)]
pub struct PathResource {
    locator: Locator,
    content_type: String,
    content_subtype: Option<String>,
    display_name: String,
    prefix: SignaturePrefix,
}

impl PathResource {
    /// Create a resource for `locator` carrying `content_type`
    pub fn new(locator: Locator, content_type: impl Into<String>) -> Self {
        Self {
            display_name: locator.raw().to_string(),
            locator,
            content_type: content_type.into(),
            content_subtype: None,
            prefix: SignaturePrefix::new(),
        }
    }

    /// Declare the content subtype
    pub fn with_content_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.content_subtype = Some(subtype.into());
        self
    }

    /// Override the display name (defaults to the raw locator)
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }
}

impl BundleResource for PathResource {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn content_subtype(&self) -> Option<&str> {
        self.content_subtype.as_deref()
    }

    fn locator(&self) -> Option<&Locator> {
        Some(&self.locator)
    }

    fn is_input(&self) -> bool {
        true
    }

    fn is_output(&self) -> bool {
        true
    }

    fn has_seekable_stream(&self) -> bool {
        self.locator.has_file_system_provider()
    }

    fn input_stream(&mut self) -> Result<Box<dyn BufRead + Send>> {
        self.locator.open()
    }

    fn output_stream(&mut self) -> Result<Box<dyn Write + Send>> {
        self.locator.create()
    }

    fn seekable_stream(&mut self) -> Result<Box<dyn SeekableStream>> {
        let path = self
            .locator
            .to_path()
            .ok_or_else(|| unavailable(&self.display_name, "a seekable stream"))?;
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }

    fn signature_probing_stream(&mut self, size: usize) -> Result<SignatureProbingStream> {
        let locator = &self.locator;
        let name = self.display_name.as_str();
        self.prefix.probe(size, name, |n| {
            let mut reader = locator.open().map_err(|e| match e {
                CodecError::Io(source) => signature_read_error(name, n, source),
                other => other,
            })?;
            read_prefix(&mut reader, n, name)
        })
    }
}

/// A forward-only input stream.
///
/// Probing reads the prefix from the stream and splices it back in front of
/// the remaining bytes, so [`input_stream`](BundleResource::input_stream)
/// still yields the content from its first byte.
pub struct InputStreamResource {
    stream: Option<Box<dyn BufRead + Send>>,
    content_type: String,
    content_subtype: Option<String>,
    display_name: String,
    prefix: SignaturePrefix,
}

impl InputStreamResource {
    /// Wrap `reader` as a resource carrying `content_type`
    pub fn new<R>(
        reader: R,
        display_name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self
    where
        R: BufRead + Send + 'static,
    {
        Self {
            stream: Some(Box::new(reader)),
            content_type: content_type.into(),
            content_subtype: None,
            display_name: display_name.into(),
            prefix: SignaturePrefix::new(),
        }
    }

    /// Declare the content subtype
    pub fn with_content_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.content_subtype = Some(subtype.into());
        self
    }
}

impl BundleResource for InputStreamResource {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn content_subtype(&self) -> Option<&str> {
        self.content_subtype.as_deref()
    }

    fn is_input(&self) -> bool {
        true
    }

    fn is_output(&self) -> bool {
        false
    }

    fn input_stream(&mut self) -> Result<Box<dyn BufRead + Send>> {
        self.stream
            .take()
            .ok_or_else(|| unavailable(&self.display_name, "an input stream"))
    }

    fn output_stream(&mut self) -> Result<Box<dyn Write + Send>> {
        Err(unavailable(&self.display_name, "an output stream"))
    }

    fn seekable_stream(&mut self) -> Result<Box<dyn SeekableStream>> {
        Err(unavailable(&self.display_name, "a seekable stream"))
    }

    fn signature_probing_stream(&mut self, size: usize) -> Result<SignatureProbingStream> {
        let stream = &mut self.stream;
        let name = self.display_name.as_str();
        self.prefix.probe(size, name, |n| {
            let mut reader = stream
                .take()
                .ok_or_else(|| unavailable(name, "a signature probing stream"))?;
            // Whatever was read, even on failure, goes back in front of the rest
            let mut buffer = Vec::with_capacity(n);
            let read = Read::take(&mut reader, n as u64).read_to_end(&mut buffer);
            let prefix = Bytes::from(buffer);
            *stream = Some(Box::new(Cursor::new(prefix.clone()).chain(reader)));
            read.map_err(|source| signature_read_error(name, n, source))?;
            Ok(prefix)
        })
    }
}

/// A write-only output stream
pub struct OutputStreamResource {
    stream: Option<Box<dyn Write + Send>>,
    content_type: String,
    content_subtype: Option<String>,
    display_name: String,
}

impl OutputStreamResource {
    /// Wrap `writer` as a resource carrying `content_type`
    pub fn new<W>(
        writer: W,
        display_name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            stream: Some(Box::new(writer)),
            content_type: content_type.into(),
            content_subtype: None,
            display_name: display_name.into(),
        }
    }

    /// Declare the content subtype
    pub fn with_content_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.content_subtype = Some(subtype.into());
        self
    }
}

impl BundleResource for OutputStreamResource {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn content_subtype(&self) -> Option<&str> {
        self.content_subtype.as_deref()
    }

    fn is_input(&self) -> bool {
        false
    }

    fn is_output(&self) -> bool {
        true
    }

    fn input_stream(&mut self) -> Result<Box<dyn BufRead + Send>> {
        Err(unavailable(&self.display_name, "an input stream"))
    }

    fn output_stream(&mut self) -> Result<Box<dyn Write + Send>> {
        self.stream
            .take()
            .ok_or_else(|| unavailable(&self.display_name, "an output stream"))
    }

    fn seekable_stream(&mut self) -> Result<Box<dyn SeekableStream>> {
        Err(unavailable(&self.display_name, "a seekable stream"))
    }

    fn signature_probing_stream(&mut self, _size: usize) -> Result<SignatureProbingStream> {
        Err(unavailable(&self.display_name, "a signature probing stream"))
    }
}

/// A seekable input stream.
///
/// Probing reads the prefix and seeks back to where the stream was.
pub struct SeekableStreamResource {
    stream: Option<Box<dyn SeekableStream>>,
    content_type: String,
    content_subtype: Option<String>,
    display_name: String,
    prefix: SignaturePrefix,
}

impl SeekableStreamResource {
    /// Wrap `stream` as a resource carrying `content_type`
    pub fn new<S>(
        stream: S,
        display_name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self
    where
        S: Read + Seek + Send + 'static,
    {
        Self {
            stream: Some(Box::new(stream)),
            content_type: content_type.into(),
            content_subtype: None,
            display_name: display_name.into(),
            prefix: SignaturePrefix::new(),
        }
    }

    /// Declare the content subtype
    pub fn with_content_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.content_subtype = Some(subtype.into());
        self
    }
}

impl BundleResource for SeekableStreamResource {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn content_subtype(&self) -> Option<&str> {
        self.content_subtype.as_deref()
    }

    fn is_input(&self) -> bool {
        true
    }

    fn is_output(&self) -> bool {
        false
    }

    fn has_seekable_stream(&self) -> bool {
        self.stream.is_some()
    }

    fn input_stream(&mut self) -> Result<Box<dyn BufRead + Send>> {
        let stream = self.seekable_stream()?;
        Ok(Box::new(BufReader::new(stream)))
    }

    fn output_stream(&mut self) -> Result<Box<dyn Write + Send>> {
        Err(unavailable(&self.display_name, "an output stream"))
    }

    fn seekable_stream(&mut self) -> Result<Box<dyn SeekableStream>> {
        self.stream
            .take()
            .ok_or_else(|| unavailable(&self.display_name, "a seekable stream"))
    }

    fn signature_probing_stream(&mut self, size: usize) -> Result<SignatureProbingStream> {
        let stream = &mut self.stream;
        let name = self.display_name.as_str();
        self.prefix.probe(size, name, |n| {
            let reader = stream
                .as_mut()
                .ok_or_else(|| unavailable(name, "a signature probing stream"))?;
            let start = reader
                .stream_position()
                .map_err(|source| signature_read_error(name, n, source))?;
            let prefix = read_prefix(reader, n, name)?;
            reader
                .seek(SeekFrom::Start(start))
                .map_err(|source| signature_read_error(name, n, source))?;
            Ok(prefix)
        })
    }
}
