//! Bounded, reusable signature-probing buffers.
//!
//! Resolution inspects a fixed-size prefix of a resource to let each
//! candidate codec test its magic bytes. The prefix is read from the
//! underlying resource once, cached on the resource in a [`SignaturePrefix`],
//! and handed out as [`SignatureProbingStream`] views. Once a prefix size has
//! been established for a resource, asking for a larger one is an error
//! rather than a silent second read.

use crate::error::{CodecError, Result};
use bytes::Bytes;
use std::io::{self, BufRead, Read};

/// A readable view over a cached signature prefix, with mark/reset.
///
/// Reads never go past the cached prefix. Every view starts at position 0.
#[derive(Debug, Clone)]
pub struct SignatureProbingStream {
    prefix: Bytes,
    position: usize,
    mark: usize,
}

impl SignatureProbingStream {
    /// Create a view over `prefix`
    pub fn new(prefix: Bytes) -> Self {
        Self {
            prefix,
            position: 0,
            mark: 0,
        }
    }

    /// Number of prefix bytes available (may be less than the requested
    /// probe size for short resources)
    pub fn len(&self) -> usize {
        self.prefix.len()
    }

    /// Whether the resource was empty
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty()
    }

    /// The whole prefix, independent of the read position
    pub fn as_bytes(&self) -> &[u8] {
        &self.prefix
    }

    /// Current read position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Remember the current position
    pub fn mark(&mut self) {
        self.mark = self.position;
    }

    /// Return to the last mark (position 0 if never marked)
    pub fn reset(&mut self) {
        self.position = self.mark;
    }

    /// Whether the prefix starts with `magic`
    pub fn starts_with(&self, magic: &[u8]) -> bool {
        self.prefix.starts_with(magic)
    }
}

impl Read for SignatureProbingStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = &self.prefix[self.position..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }
}

impl BufRead for SignatureProbingStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(&self.prefix[self.position..])
    }

    fn consume(&mut self, amt: usize) {
        self.position = (self.position + amt).min(self.prefix.len());
    }
}

/// Per-resource cache of the signature prefix.
///
/// The first successful request establishes the prefix size; later requests
/// of the same or a smaller size reuse the cached bytes, larger ones fail
/// with [`CodecError::ProbeSizeViolation`].
#[derive(Debug, Default)]
pub struct SignaturePrefix {
    established: Option<(usize, Bytes)>,
}

impl SignaturePrefix {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// The established prefix size, if any
    pub fn established_size(&self) -> Option<usize> {
        self.established.as_ref().map(|(size, _)| *size)
    }

    /// Get a probing view of at most `requested` bytes.
    ///
    /// `fill` is called only when no prefix has been established yet, with
    /// the requested size, and must return at most that many bytes.
    ///
    /// # Errors
    ///
    /// - [`CodecError::InvalidProbeSize`] if `requested` is 0
    /// - [`CodecError::ProbeSizeViolation`] if `requested` exceeds the established size
    /// - whatever `fill` returns
    pub fn probe<F>(
        &mut self,
        requested: usize,
        resource: &str,
        fill: F,
    ) -> Result<SignatureProbingStream>
    where
        F: FnOnce(usize) -> Result<Bytes>,
    {
        if requested == 0 {
            return Err(CodecError::InvalidProbeSize {
                resource: resource.to_string(),
            });
        }

        match &self.established {
            Some((established, prefix)) => {
                if requested > *established {
                    return Err(CodecError::ProbeSizeViolation {
                        requested,
                        established: *established,
                    });
                }
                Ok(SignatureProbingStream::new(prefix.clone()))
            }
            None => {
                let prefix = fill(requested)?;
                tracing::trace!(
                    resource,
                    requested,
                    read = prefix.len(),
                    "established signature prefix"
                );
                self.established = Some((requested, prefix.clone()));
                Ok(SignatureProbingStream::new(prefix))
            }
        }
    }
}

/// Read up to `size` bytes from `reader`, stopping early only at EOF.
pub fn read_prefix<R: Read + ?Sized>(reader: &mut R, size: usize, resource: &str) -> Result<Bytes> {
    let mut buffer = Vec::with_capacity(size);
    Read::take(&mut *reader, size as u64)
        .read_to_end(&mut buffer)
        .map_err(|source| signature_read_error(resource, size, source))?;
    Ok(Bytes::from(buffer))
}

/// Wrap an I/O failure met while probing `resource` for `size` bytes
pub(crate) fn signature_read_error(resource: &str, size: usize, source: io::Error) -> CodecError {
    CodecError::ProbeIo {
        resource: resource.to_string(),
        size,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Cursor;

    #[test]
    fn test_mark_reset() {
        let mut stream = SignatureProbingStream::new(Bytes::from_static(b"BAM\x01rest"));
        stream.mark();
        let mut magic = [0u8; 4];
        stream.read_exact(&mut magic).unwrap();
        assert_eq!(&magic, b"BAM\x01");
        assert_eq!(stream.position(), 4);
        stream.reset();
        assert_eq!(stream.position(), 0);
        assert_eq!(stream.fill_buf().unwrap(), b"BAM\x01rest");
    }

    #[test]
    fn test_reads_stop_at_prefix_end() {
        let mut stream = SignatureProbingStream::new(Bytes::from_static(b"ab"));
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"ab");
        assert_eq!(stream.read(&mut [0u8; 8]).unwrap(), 0);
    }

    #[test]
    fn test_prefix_fetched_once() {
        let calls = Cell::new(0);
        let mut cache = SignaturePrefix::new();
        let fill = |n: usize| {
            calls.set(calls.get() + 1);
            read_prefix(&mut Cursor::new(vec![7u8; 100]), n, "test")
        };

        let first = cache.probe(16, "test", fill).unwrap();
        assert_eq!(first.len(), 16);

        let second = cache
            .probe(8, "test", |_| panic!("prefix must be reused"))
            .unwrap();
        // Smaller requests see the whole cached prefix
        assert_eq!(second.len(), 16);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.established_size(), Some(16));
    }

    #[test]
    fn test_larger_request_is_violation() {
        let mut cache = SignaturePrefix::new();
        cache
            .probe(4, "test", |n| read_prefix(&mut Cursor::new(b"CRAM\x03\x01"), n, "test"))
            .unwrap();

        let err = cache
            .probe(6, "test", |_| panic!("must not re-read"))
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::ProbeSizeViolation {
                requested: 6,
                established: 4
            }
        ));
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut cache = SignaturePrefix::new();
        let err = cache
            .probe(0, "empty", |_| Ok(Bytes::new()))
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidProbeSize { .. }));
        assert_eq!(cache.established_size(), None);
    }

    #[test]
    fn test_short_resource() {
        let mut cache = SignaturePrefix::new();
        let stream = cache
            .probe(1024, "short", |n| read_prefix(&mut Cursor::new(b">chr1\nACGT\n"), n, "short"))
            .unwrap();
        assert_eq!(stream.as_bytes(), b">chr1\nACGT\n");
        // The requested size is what gets established
        assert_eq!(cache.established_size(), Some(1024));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_requests_never_grow(
                first in 1usize..256,
                later in proptest::collection::vec(1usize..512, 1..8),
            ) {
                let data = vec![1u8; 1024];
                let mut cache = SignaturePrefix::new();
                cache.probe(first, "p", |n| read_prefix(&mut Cursor::new(&data), n, "p")).unwrap();

                for size in later {
                    let result = cache.probe(size, "p", |_| panic!("re-read"));
                    if size <= first {
                        prop_assert_eq!(result.unwrap().len(), first);
                    } else {
                        let is_violation =
                            matches!(result, Err(CodecError::ProbeSizeViolation { .. }));
                        prop_assert!(is_violation);
                    }
                }
            }
        }
    }
}
