//! Codec registry
//!
//! A [`Registry`] owns one [`CategoryResolver`] per supported category and
//! routes each registered codec to the resolver for its category. Build one
//! at startup, register everything, then share it by reference:
//!
//! ```
//! use biometal_codecs::bundle::Bundle;
//! use biometal_codecs::format::{content_types, Category};
//! use biometal_codecs::{Registry, Version};
//!
//! let registry = Registry::with_builtin_codecs()?;
//!
//! let bundle = Bundle::from_path("out.vcf.gz", content_types::VARIANT_CONTEXTS);
//! let codec = registry.variants().resolve_for_encoding(&bundle, Version::NEWEST)?;
//! assert_eq!(codec.version(), Version::new(4, 3, 0));
//! # Ok::<(), biometal_codecs::CodecError>(())
//! ```

pub mod resolver;

pub use resolver::CategoryResolver;

use crate::codec::HtsCodec;
use crate::codecs::builtin_codecs;
use crate::error::{CodecError, Result};
use crate::format::Category;
use std::sync::Arc;
use tracing::info;

/// Dispatcher owning one resolver per supported category.
///
/// Registration needs `&mut self`; resolution works through `&self`, so a
/// registry that is no longer being modified can be shared across threads.
pub struct Registry {
    reads: CategoryResolver,
    variants: CategoryResolver,
    haploid_reference: CategoryResolver,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create a registry with no codecs
    pub fn new() -> Self {
        Self {
            reads: CategoryResolver::new(Category::AlignedReads),
            variants: CategoryResolver::new(Category::Variants),
            haploid_reference: CategoryResolver::new(Category::HaploidReference),
        }
    }

    /// Create a registry holding every built-in codec
    pub fn with_builtin_codecs() -> Result<Self> {
        let mut registry = Self::new();
        registry.discover(builtin_codecs())?;
        Ok(registry)
    }

    /// Register every codec yielded by `source`.
    ///
    /// Stops at the first codec that cannot be registered. Returns the number
    /// of codecs registered.
    pub fn discover<I>(&mut self, source: I) -> Result<usize>
    where
        I: IntoIterator<Item = Arc<dyn HtsCodec>>,
    {
        let mut count = 0;
        for codec in source {
            self.register_codec(codec)?;
            count += 1;
        }
        info!(count, "Registered discovered codecs");
        Ok(count)
    }

    /// Route `codec` to the resolver for its category.
    ///
    /// Returns the codec it replaced, if any.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnsupportedCategory`] for categories without a resolver,
    /// or whatever [`CategoryResolver::register_codec`] rejects.
    pub fn register_codec(
        &mut self,
        codec: Arc<dyn HtsCodec>,
    ) -> Result<Option<Arc<dyn HtsCodec>>> {
        match codec.category() {
            Category::AlignedReads => self.reads.register_codec(codec),
            Category::Variants => self.variants.register_codec(codec),
            Category::HaploidReference => self.haploid_reference.register_codec(codec),
            other => Err(CodecError::UnsupportedCategory(other)),
        }
    }

    /// Resolver for `category`
    pub fn resolver(&self, category: Category) -> Result<&CategoryResolver> {
        match category {
            Category::AlignedReads => Ok(&self.reads),
            Category::Variants => Ok(&self.variants),
            Category::HaploidReference => Ok(&self.haploid_reference),
            other => Err(CodecError::UnsupportedCategory(other)),
        }
    }

    /// Resolver for aligned reads
    pub fn reads(&self) -> &CategoryResolver {
        &self.reads
    }

    /// Resolver for variants
    pub fn variants(&self) -> &CategoryResolver {
        &self.variants
    }

    /// Resolver for haploid references
    pub fn haploid_reference(&self) -> &CategoryResolver {
        &self.haploid_reference
    }

    /// Every registered codec across categories
    pub fn codecs(&self) -> Vec<Arc<dyn HtsCodec>> {
        let mut all = self.reads.codecs();
        all.extend(self.variants.codecs());
        all.extend(self.haploid_reference.codecs());
        all
    }
}
