//! Core slide model, raster codecs, and the line-oriented slide text protocol
//! for appending slides to PowerPoint files.

pub mod error;
pub mod protocol;
pub mod raster;
pub mod registry;
pub mod types;

pub use error::{AddStep, Error, Result};
pub use protocol::{decode_slides, encode_slides, LineReader, LineSource, SlideDecoder};
pub use image::DynamicImage;
pub use raster::{
    EmbeddedImage, EmbeddedImageCodec, ImageFile, ImageFileCodec, LegacyEmbeddedImageCodec,
    Raster, RasterCodec,
};
pub use registry::CodecRegistry;
pub use types::{
    simple_items, simple_lines, Emu, Font, Image, Item, ItemBox, Line, LineElement, Rgb, Slide,
    TextBox, DPI, INCH, MILLIMETER,
};
