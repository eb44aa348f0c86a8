//! Registry of raster codecs used when decoding image records.

use crate::raster::{EmbeddedImageCodec, ImageFileCodec, LegacyEmbeddedImageCodec, RasterCodec};
use crate::{Error, Result};

/// Ordered set of raster codecs, selected by magic prefix.
///
/// Registration order decides which codec wins when one magic is a prefix
/// of another. Codecs cannot be removed.
#[derive(Debug, Default)]
pub struct CodecRegistry {
    codecs: Vec<Box<dyn RasterCodec>>,
}

impl CodecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in codecs: embedded PNG, PNG file,
    /// then the older `GoImage` spelling of embedded PNG.
    pub fn with_builtin_codecs() -> Self {
        let mut registry = Self::new();
        registry.codecs.push(Box::new(EmbeddedImageCodec));
        registry.codecs.push(Box::new(ImageFileCodec));
        registry.codecs.push(Box::new(LegacyEmbeddedImageCodec));
        registry
    }

    /// Add a codec. Its magic must be non-empty and not already registered.
    pub fn register(&mut self, codec: impl RasterCodec + 'static) -> Result<&mut Self> {
        let magic = codec.magic();
        if magic.is_empty() || self.codecs.iter().any(|c| c.magic() == magic) {
            return Err(Error::InvalidMagic(magic.to_string()));
        }
        log::debug!("Registered image codec {:?}", magic);
        self.codecs.push(Box::new(codec));
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Magic prefixes in registration order.
    pub fn magics(&self) -> impl Iterator<Item = &str> {
        self.codecs.iter().map(|c| c.magic())
    }

    /// The first codec whose magic is a prefix of `line`.
    pub fn find(&self, line: &str) -> Option<&dyn RasterCodec> {
        self.codecs
            .iter()
            .find(|c| line.starts_with(c.magic()))
            .map(|c| &**c)
    }
}
