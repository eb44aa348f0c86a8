//! Domain types describing slide content to be appended to a presentation.

use crate::raster::Raster;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// English Metric Unit, the length unit used for positions and sizes on a slide.
pub type Emu = u64;

/// One millimeter in EMU.
pub const MILLIMETER: Emu = 36_000;

/// One inch in EMU.
pub const INCH: Emu = 914_400;

/// Resolution used to convert image pixels into EMU.
pub const DPI: Emu = 96;

/// Content of a slide which can be appended to a presentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slide {
    /// Text boxes, in shape-tree order.
    pub text_boxes: Vec<TextBox>,

    /// Boxes of indented items, rendered after the text boxes.
    pub item_boxes: Vec<ItemBox>,

    /// Pictures, rendered last. They are stored as PNG media.
    pub images: Vec<Image>,

    /// Slide layout id. Zero selects the default layout 1.
    pub master: u32,
}

impl Slide {
    /// Create an empty slide using the default layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// The slide layout number referenced by the slide relationships.
    pub fn layout(&self) -> u32 {
        self.master.max(1)
    }
}

/// A text box placed on a slide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBox {
    pub x: Emu,
    pub y: Emu,

    /// Lines of (colored) text.
    pub lines: Vec<Line>,

    /// Mark this text box as the slide title placeholder.
    pub title: bool,

    /// Font for every run in the box. `None` inherits the defaults.
    pub font: Option<Font>,
}

impl TextBox {
    /// Create a text box at the given position with plain text split at newlines.
    pub fn new(x: Emu, y: Emu, text: &str) -> Self {
        Self {
            x,
            y,
            lines: simple_lines(text),
            ..Self::default()
        }
    }
}

/// A line is one paragraph made of one or more differently colored runs.
pub type Line = Vec<LineElement>;

/// A piece of text with an optional color.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineElement {
    pub text: String,

    /// Text color. `None` keeps the color from the layout.
    pub color: Option<Rgb>,
}

impl LineElement {
    /// Create an uncolored element.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
        }
    }

    /// Create an element with an explicit color.
    pub fn colored(text: impl Into<String>, color: Rgb) -> Self {
        Self {
            text: text.into(),
            color: Some(color),
        }
    }
}

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Format as `RRGGBB` with uppercase hex digits.
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Parse exactly six hex digits, in either case.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Font used by all runs of a text box.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Font {
    /// Typeface, e.g. "Courier New". Empty keeps the default typeface.
    pub name: String,

    /// Size in points. Zero keeps the default size.
    pub size: f64,
}

impl Font {
    pub fn new(name: impl Into<String>, size: f64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Smallest and largest sizes a text run accepts, in hundredths of a point.
    pub const MIN_SIZE_HUNDREDTHS: u32 = 100;
    pub const MAX_SIZE_HUNDREDTHS: u32 = 400_000;

    /// Size in hundredths of a point, or `None` if the size is unset.
    ///
    /// Set sizes are clamped to the range a text run accepts.
    pub fn size_hundredths(&self) -> Option<u32> {
        let sz = (self.size * 100.0).round();
        if sz >= 1.0 {
            let max = f64::from(Self::MAX_SIZE_HUNDREDTHS);
            Some((sz.min(max) as u32).max(Self::MIN_SIZE_HUNDREDTHS))
        } else {
            None
        }
    }
}

/// A text box of indented items, like a bulleted list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemBox {
    pub x: Emu,
    pub y: Emu,
    pub width: Emu,
    pub height: Emu,
    pub items: Vec<Item>,
}

/// One line of an item box with its indentation level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
    pub level: u32,
    pub text: String,
}

impl Item {
    pub fn new(level: u32, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// A picture placed on a slide.
#[derive(Debug, Clone)]
pub struct Image {
    pub x: Emu,
    pub y: Emu,
    pub raster: Arc<dyn Raster>,
}

impl Image {
    pub fn new(x: Emu, y: Emu, raster: impl Raster + 'static) -> Self {
        Self {
            x,
            y,
            raster: Arc::new(raster),
        }
    }
}

/// Images are equal when they sit at the same position and decode to the same pixels.
impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        if self.x != other.x || self.y != other.y {
            return false;
        }
        if Arc::ptr_eq(&self.raster, &other.raster) {
            return true;
        }
        match (self.raster.raster(), other.raster.raster()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Split text at newlines into uncolored lines.
pub fn simple_lines(text: &str) -> Vec<Line> {
    text.split('\n')
        .map(|s| vec![LineElement::new(s)])
        .collect()
}

/// Split text at newlines into items. The level is the number of leading dashes.
pub fn simple_items(text: &str) -> Vec<Item> {
    text.split('\n')
        .map(|line| {
            let text = line.trim_start_matches('-');
            let level = (line.len() - text.len()) as u32;
            Item::new(level, text)
        })
        .collect()
}
