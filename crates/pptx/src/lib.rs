//! Incremental PPTX (Office Open XML) editor.
//!
//! Appends slides to a presentation package and rewrites it with every
//! untouched entry copied byte for byte.

pub mod container;
pub mod fragment;
pub mod ids;
pub mod parts;
pub mod template;
pub mod xml;

pub use container::{AddedSlide, Container};
pub use parts::{Part, PartStore};
pub use template::template_archive;
pub use xml::{Element, Node, XmlDocument};
