//! Bundles: the described I/O operation handed to a resolver
//!
//! A [`Bundle`] groups named [`BundleResource`]s by content type, with one
//! content type designated primary. Resolvers only ever look at the primary
//! resource; secondary resources (an index, a dictionary) are there for the
//! selected codec.
//!
//! # Example
//!
//! ```
//! use biometal_codecs::bundle::{Bundle, BundleBuilder, Locator, PathResource};
//! use biometal_codecs::format::content_types::{ALIGNED_READS, READS_INDEX};
//!
//! let bundle = BundleBuilder::new()
//!     .add_primary(PathResource::new(Locator::new("sample.bam")?, ALIGNED_READS))
//!     .add_secondary(PathResource::new(Locator::new("sample.bam.bai")?, READS_INDEX))
//!     .build()?;
//!
//! assert_eq!(bundle.primary_content_type(), ALIGNED_READS);
//! assert_eq!(bundle.content_types().count(), 2);
//! # Ok::<(), biometal_codecs::CodecError>(())
//! ```

pub mod locator;
pub mod probe;
pub mod resource;

pub use locator::Locator;
pub use probe::{SignaturePrefix, SignatureProbingStream};
pub use resource::{
    BundleResource, InputStreamResource, OutputStreamResource, PathResource, SeekableStream,
    SeekableStreamResource,
};

use crate::error::{CodecError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, Write};
use std::path::Path;

/// A keyed collection of resources with one primary content type.
pub struct Bundle {
    primary_content_type: String,
    resources: BTreeMap<String, Box<dyn BundleResource>>,
}

impl Bundle {
    /// Bundle holding a single primary resource
    pub fn from_resource<R: BundleResource + 'static>(resource: R) -> Self {
        let primary_content_type = resource.content_type().to_string();
        let mut resources: BTreeMap<String, Box<dyn BundleResource>> = BTreeMap::new();
        resources.insert(primary_content_type.clone(), Box::new(resource));
        Self {
            primary_content_type,
            resources,
        }
    }

    /// Bundle for a single locator
    pub fn from_locator(locator: Locator, content_type: &str) -> Self {
        Self::from_resource(PathResource::new(locator, content_type))
    }

    /// Bundle for a single local path
    pub fn from_path(path: impl AsRef<Path>, content_type: &str) -> Self {
        Self::from_locator(Locator::from_path(path), content_type)
    }

    /// Bundle for a single input stream
    pub fn from_input_stream<R>(reader: R, display_name: &str, content_type: &str) -> Self
    where
        R: BufRead + Send + 'static,
    {
        Self::from_resource(InputStreamResource::new(reader, display_name, content_type))
    }

    /// Bundle for a single output stream
    pub fn from_output_stream<W>(writer: W, display_name: &str, content_type: &str) -> Self
    where
        W: Write + Send + 'static,
    {
        Self::from_resource(OutputStreamResource::new(writer, display_name, content_type))
    }

    /// The primary content type
    pub fn primary_content_type(&self) -> &str {
        &self.primary_content_type
    }

    /// Resource carrying `content_type`
    ///
    /// # Errors
    ///
    /// [`CodecError::MissingResource`] if the bundle has none.
    pub fn resource_for_content_type(&self, content_type: &str) -> Result<&dyn BundleResource> {
        self.resources
            .get(content_type)
            .map(|r| &**r)
            .ok_or_else(|| missing(content_type))
    }

    /// Mutable access to the resource carrying `content_type`
    pub fn resource_for_content_type_mut(
        &mut self,
        content_type: &str,
    ) -> Result<&mut dyn BundleResource> {
        match self.resources.get_mut(content_type) {
            Some(resource) => Ok(resource.as_mut()),
            None => Err(missing(content_type)),
        }
    }

    /// The primary resource
    pub fn primary_resource_mut(&mut self) -> Result<&mut dyn BundleResource> {
        match self.resources.get_mut(&self.primary_content_type) {
            Some(resource) => Ok(resource.as_mut()),
            None => Err(missing(&self.primary_content_type)),
        }
    }

    /// Whether a resource carries `content_type`
    pub fn has_resource(&self, content_type: &str) -> bool {
        self.resources.contains_key(content_type)
    }

    /// Every content type in the bundle, in sorted order
    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("primary_content_type", &self.primary_content_type)
            .field(
                "resources",
                &self
                    .resources
                    .iter()
                    .map(|(ct, r)| (ct.as_str(), r.display_name()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn missing(content_type: &str) -> CodecError {
    CodecError::MissingResource {
        content_type: content_type.to_string(),
    }
}

/// Builder enforcing one primary resource and unique content types.
#[derive(Default)]
pub struct BundleBuilder {
    primary: Vec<Box<dyn BundleResource>>,
    secondary: Vec<Box<dyn BundleResource>>,
}

impl BundleBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the primary resource
    pub fn add_primary<R: BundleResource + 'static>(mut self, resource: R) -> Self {
        self.primary.push(Box::new(resource));
        self
    }

    /// Add a secondary resource
    pub fn add_secondary<R: BundleResource + 'static>(mut self, resource: R) -> Self {
        self.secondary.push(Box::new(resource));
        self
    }

    /// Build the bundle
    ///
    /// # Errors
    ///
    /// [`CodecError::InvalidInput`] unless exactly one primary resource was
    /// added and every content type appears once.
    pub fn build(self) -> Result<Bundle> {
        if self.primary.len() != 1 {
            return Err(CodecError::InvalidInput {
                msg: format!(
                    "A bundle requires exactly one primary resource, found {}",
                    self.primary.len()
                ),
            });
        }

        let primary_content_type = self.primary[0].content_type().to_string();
        let mut resources = BTreeMap::new();

        for resource in self.primary.into_iter().chain(self.secondary) {
            let content_type = resource.content_type().to_string();
            if resources.contains_key(&content_type) {
                return Err(CodecError::InvalidInput {
                    msg: format!("Duplicate resource for content type {}", content_type),
                });
            }
            resources.insert(content_type, resource);
        }

        Ok(Bundle {
            primary_content_type,
            resources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::content_types::{ALIGNED_READS, READS_INDEX};
    use std::io::Cursor;

    #[test]
    fn test_single_resource_bundle() {
        let bundle = Bundle::from_path("sample.bam", ALIGNED_READS);
        assert_eq!(bundle.primary_content_type(), ALIGNED_READS);
        let resource = bundle.resource_for_content_type(ALIGNED_READS).unwrap();
        assert_eq!(resource.display_name(), "sample.bam");
        assert!(matches!(
            bundle.resource_for_content_type(READS_INDEX),
            Err(CodecError::MissingResource { .. })
        ));
    }

    #[test]
    fn test_builder_requires_one_primary() {
        let err = BundleBuilder::new()
            .add_secondary(PathResource::new(Locator::from_path("a.bai"), READS_INDEX))
            .build()
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidInput { .. }));

        let err = BundleBuilder::new()
            .add_primary(PathResource::new(Locator::from_path("a.bam"), ALIGNED_READS))
            .add_primary(PathResource::new(Locator::from_path("b.bam"), ALIGNED_READS))
            .build()
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidInput { .. }));
    }

    #[test]
    fn test_builder_rejects_duplicate_content_type() {
        let err = BundleBuilder::new()
            .add_primary(PathResource::new(Locator::from_path("a.bam"), ALIGNED_READS))
            .add_secondary(InputStreamResource::new(
                Cursor::new(Vec::new()),
                "stdin",
                ALIGNED_READS,
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidInput { .. }));
    }

    #[test]
    fn test_primary_resource_mut() {
        let stream = Cursor::new(b"@HD\tVN:1.6\n".to_vec());
        let mut bundle = Bundle::from_input_stream(stream, "stdin", ALIGNED_READS);
        let resource = bundle.primary_resource_mut().unwrap();
        let probe = resource.signature_probing_stream(3).unwrap();
        assert_eq!(probe.as_bytes(), b"@HD");
    }
}
