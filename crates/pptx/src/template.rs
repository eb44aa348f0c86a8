//! Bundled minimal presentation used to create new files.
//!
//! It has one master, two layouts (1: title and content, 2: blank), a theme,
//! and an empty slide list.

use pptadd_core::{Error, Result};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const PARTS: &[(&str, &str)] = &[
    ("[Content_Types].xml", include_str!("../template/content_types.xml")),
    ("_rels/.rels", include_str!("../template/root.rels")),
    ("docProps/app.xml", include_str!("../template/app.xml")),
    ("ppt/presentation.xml", include_str!("../template/presentation.xml")),
    (
        "ppt/_rels/presentation.xml.rels",
        include_str!("../template/presentation.xml.rels"),
    ),
    ("ppt/presProps.xml", include_str!("../template/presProps.xml")),
    (
        "ppt/slideMasters/slideMaster1.xml",
        include_str!("../template/slideMaster1.xml"),
    ),
    (
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        include_str!("../template/slideMaster1.xml.rels"),
    ),
    (
        "ppt/slideLayouts/slideLayout1.xml",
        include_str!("../template/slideLayout1.xml"),
    ),
    (
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        include_str!("../template/slideLayout.xml.rels"),
    ),
    (
        "ppt/slideLayouts/slideLayout2.xml",
        include_str!("../template/slideLayout2.xml"),
    ),
    (
        "ppt/slideLayouts/_rels/slideLayout2.xml.rels",
        include_str!("../template/slideLayout.xml.rels"),
    ),
    ("ppt/theme/theme1.xml", include_str!("../template/theme1.xml")),
];

/// Build the template package as ZIP bytes.
pub fn template_archive() -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, content) in PARTS {
        zip.start_file(*name, options)
            .map_err(|e| Error::ZipError(format!("template {}: {}", name, e)))?;
        zip.write_all(content.trim_end().as_bytes())?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| Error::ZipError(format!("template: {}", e)))?;
    Ok(cursor.into_inner())
}
