//! Raster images placed on slides, and their text protocol codecs.
//!
//! A [`Raster`] only has to produce pixels. Serialization is optional: the
//! default methods report [`Error::NotSerializable`], so a raster type that is
//! only ever built in code can skip them. Rasters that do support the text
//! protocol come with a [`RasterCodec`] which is registered with a
//! [`CodecRegistry`](crate::CodecRegistry) and selected by its magic prefix.

use crate::protocol::LineSource;
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// A raster image that may be able to write itself in text form.
pub trait Raster: fmt::Debug + Send + Sync {
    /// Decode the pixels of the image.
    fn raster(&self) -> Result<DynamicImage>;

    /// Write the text protocol payload, one or more lines each ending with `\n`.
    /// The first line starts with [`Raster::magic`].
    fn encode(&self, _w: &mut dyn Write) -> Result<()> {
        Err(Error::NotSerializable)
    }

    /// The prefix identifying the payload of this raster type.
    fn magic(&self) -> Result<&str> {
        Err(Error::NotSerializable)
    }
}

/// Decoder for one serializable raster type.
pub trait RasterCodec: fmt::Debug + Send + Sync {
    /// Non-empty prefix of the first payload line.
    fn magic(&self) -> &str;

    /// Consume exactly the payload lines and build the raster.
    fn decode(&self, lines: &mut dyn LineSource) -> Result<Arc<dyn Raster>>;
}

/// Encode an image as PNG.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Read the next line and strip `magic` followed by a single space.
fn payload_line(lines: &mut dyn LineSource, magic: &str) -> Result<String> {
    let line = lines.read_line()?.ok_or_else(|| Error::UnexpectedEof {
        line: lines.line_number(),
        expected: magic.to_string(),
    })?;
    match line.strip_prefix(magic) {
        Some(rest) if rest.starts_with(' ') => Ok(rest[1..].trim().to_string()),
        _ => Err(Error::Protocol {
            line: lines.line_number(),
            expected: format!("{} <payload>", magic),
            found: line,
        }),
    }
}

/// An in-memory image, serialized as a base64-encoded PNG on a single line.
#[derive(Clone, PartialEq)]
pub struct EmbeddedImage {
    image: DynamicImage,
}

impl EmbeddedImage {
    pub const MAGIC: &'static str = "Png";

    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Decode an embedded image from PNG bytes.
    pub fn from_png(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
        Ok(Self { image })
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

impl fmt::Debug for EmbeddedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedImage")
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .field("color", &self.image.color())
            .finish()
    }
}

impl Raster for EmbeddedImage {
    fn raster(&self) -> Result<DynamicImage> {
        Ok(self.image.clone())
    }

    fn encode(&self, w: &mut dyn Write) -> Result<()> {
        let png = encode_png(&self.image)?;
        writeln!(w, "{} {}", Self::MAGIC, STANDARD.encode(png))?;
        Ok(())
    }

    fn magic(&self) -> Result<&str> {
        Ok(Self::MAGIC)
    }
}

/// Codec for [`EmbeddedImage`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedImageCodec;

impl RasterCodec for EmbeddedImageCodec {
    fn magic(&self) -> &str {
        EmbeddedImage::MAGIC
    }

    fn decode(&self, lines: &mut dyn LineSource) -> Result<Arc<dyn Raster>> {
        decode_embedded(lines, EmbeddedImage::MAGIC)
    }
}

/// Reads embedded images written under the older `GoImage` magic.
///
/// The payload is the same base64 PNG. Decoded images are written back with
/// [`EmbeddedImage::MAGIC`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyEmbeddedImageCodec;

impl LegacyEmbeddedImageCodec {
    pub const MAGIC: &'static str = "GoImage";
}

impl RasterCodec for LegacyEmbeddedImageCodec {
    fn magic(&self) -> &str {
        Self::MAGIC
    }

    fn decode(&self, lines: &mut dyn LineSource) -> Result<Arc<dyn Raster>> {
        decode_embedded(lines, Self::MAGIC)
    }
}

fn decode_embedded(lines: &mut dyn LineSource, magic: &str) -> Result<Arc<dyn Raster>> {
    let payload = payload_line(lines, magic)?;
    let png = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| Error::ImageError(format!("invalid base64 payload: {}", e)))?;
    Ok(Arc::new(EmbeddedImage::from_png(&png)?))
}

/// A PNG file on disk. It is read on first use and kept in memory afterwards.
#[derive(Clone)]
pub struct ImageFile {
    path: PathBuf,
    cache: OnceLock<DynamicImage>,
}

impl ImageFile {
    pub const MAGIC: &'static str = "File";

    /// Refer to a file without reading it yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceLock::new(),
        }
    }

    /// Refer to a file and read it immediately, so a missing or broken file fails early.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let file = Self::new(path);
        file.raster()?;
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<DynamicImage> {
        log::debug!("Reading image file {}", self.path.display());
        let file = File::open(&self.path).map_err(|e| {
            Error::ImageError(format!("cannot open {}: {}", self.path.display(), e))
        })?;
        image::load(BufReader::new(file), ImageFormat::Png)
            .map_err(|e| Error::ImageError(format!("{}: {}", self.path.display(), e)))
    }
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("path", &self.path)
            .field("loaded", &self.cache.get().is_some())
            .finish()
    }
}

impl Raster for ImageFile {
    fn raster(&self) -> Result<DynamicImage> {
        if let Some(image) = self.cache.get() {
            return Ok(image.clone());
        }
        let image = self.read()?;
        Ok(self.cache.get_or_init(|| image).clone())
    }

    fn encode(&self, w: &mut dyn Write) -> Result<()> {
        writeln!(w, "{} {}", Self::MAGIC, self.path.display())?;
        Ok(())
    }

    fn magic(&self) -> Result<&str> {
        Ok(Self::MAGIC)
    }
}

/// Codec for [`ImageFile`]. Decoding reads the referenced file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFileCodec;

impl RasterCodec for ImageFileCodec {
    fn magic(&self) -> &str {
        ImageFile::MAGIC
    }

    fn decode(&self, lines: &mut dyn LineSource) -> Result<Arc<dyn Raster>> {
        let path = payload_line(lines, ImageFile::MAGIC)?;
        if path.is_empty() {
            return Err(Error::ImageError("missing image file path".to_string()));
        }
        Ok(Arc::new(ImageFile::load(path)?))
    }
}
