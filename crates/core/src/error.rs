//! Error types for slide decoding and PPTX editing.

use std::fmt;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The stages of appending a slide, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddStep {
    /// Registering the slide part in `[Content_Types].xml`.
    ContentTypes,
    /// Adding the slide relationship to `ppt/_rels/presentation.xml.rels`.
    PresentationRelationships,
    /// Building and staging `ppt/slides/slideN.xml`.
    SlidePart,
    /// Staging the picture files under `ppt/media/`.
    Media,
    /// Staging `ppt/slides/_rels/slideN.xml.rels`.
    SlideRelationships,
    /// Appending to the slide id list in `ppt/presentation.xml`.
    SlideList,
}

impl fmt::Display for AddStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddStep::ContentTypes => "content types",
            AddStep::PresentationRelationships => "presentation relationships",
            AddStep::SlidePart => "slide part",
            AddStep::Media => "media",
            AddStep::SlideRelationships => "slide relationships",
            AddStep::SlideList => "slide list",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while decoding slides or editing a presentation.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open, read, or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing or writing error.
    #[error("XML error: {0}")]
    XmlError(String),

    /// Raster image could not be decoded or encoded.
    #[error("Image error: {0}")]
    ImageError(String),

    /// An element the editor relies on is missing from a part.
    #[error("{part}: cannot find <{element}>")]
    MissingElement { part: String, element: String },

    /// An attribute the editor relies on is missing or malformed.
    #[error("{part}: invalid attribute {attribute}: {message}")]
    InvalidAttribute {
        part: String,
        attribute: String,
        message: String,
    },

    /// No free identifier was found within the search window.
    #[error("{0}: failed to create a unique id")]
    IdentifierExhausted(String),

    /// A text protocol line did not match the expected record.
    #[error("line {line}: expected {expected:?}, got {found:?}")]
    Protocol {
        line: usize,
        expected: String,
        found: String,
    },

    /// A text protocol literal could not be parsed.
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// The input ended in the middle of a record.
    #[error("line {line}: unexpected end of input, expected {expected:?}")]
    UnexpectedEof { line: usize, expected: String },

    /// An image record was decoded with an empty codec registry.
    #[error("no image decoders are registered")]
    NoDecoders,

    /// No registered codec matches the image payload.
    #[error("line {line}: unknown image decoder: {prefix}")]
    UnknownDecoder { line: usize, prefix: String },

    /// A codec was registered with a magic that is empty or already taken.
    #[error("invalid image codec magic: {0:?}")]
    InvalidMagic(String),

    /// A registered codec failed to decode its payload.
    #[error("line {line}: {message}")]
    Codec { line: usize, message: String },

    /// The raster type does not support the text protocol.
    #[error("this image type is not serializable")]
    NotSerializable,

    /// A part was staged twice with different content.
    #[error("part already staged: {0}")]
    PartConflict(String),

    /// Appending a slide failed at the given step.
    #[error("slide {slide}: {step}: {source}")]
    AddFailed {
        slide: usize,
        step: AddStep,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with the slide number and the step that failed.
    pub fn in_step(self, slide: usize, step: AddStep) -> Self {
        Error::AddFailed {
            slide,
            step,
            source: Box::new(self),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::ImageError(e.to_string())
    }
}
