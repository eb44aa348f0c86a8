//! In-memory overlay of package parts that differ from the source archive.

use crate::xml::XmlDocument;
use pptadd_core::{Error, Result};
use std::collections::btree_map::{self, BTreeMap};
use std::io::{Read, Seek};
use zip::result::ZipError;
use zip::ZipArchive;

/// Pending content of one archive entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// An XML part loaded for editing or built from scratch.
    Xml(XmlDocument),
    /// Opaque bytes, such as media files.
    Blob(Vec<u8>),
}

impl Part {
    /// Serialize the part as it will be stored in the archive.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Part::Xml(doc) => doc.to_bytes(),
            Part::Blob(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Overlay mapping archive paths to their new content.
///
/// Each path holds at most one in-memory state. Existing parts are edited
/// through [`PartStore::xml_mut`], which loads them from the archive once and
/// hands out the same tree on every later call.
#[derive(Debug, Default)]
pub struct PartStore {
    parts: BTreeMap<String, Part>,
}

impl PartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the XML tree of a part for mutation, loading it from `archive` on first use.
    pub fn xml_mut<R: Read + Seek>(
        &mut self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<&mut XmlDocument> {
        if !self.parts.contains_key(path) {
            let bytes = read_entry(archive, path)?;
            let doc = XmlDocument::parse(&bytes).map_err(|e| match e {
                Error::XmlError(msg) => Error::XmlError(format!("{}: {}", path, msg)),
                other => other,
            })?;
            log::debug!("Loaded {} for editing", path);
            self.parts.insert(path.to_string(), Part::Xml(doc));
        }
        match self.parts.get_mut(path) {
            Some(Part::Xml(doc)) => Ok(doc),
            _ => Err(Error::PartConflict(path.to_string())),
        }
    }

    /// Stage a new part. Staging the same path twice is an error.
    pub fn stage(&mut self, path: impl Into<String>, part: Part) -> Result<()> {
        match self.parts.entry(path.into()) {
            btree_map::Entry::Occupied(e) => Err(Error::PartConflict(e.key().clone())),
            btree_map::Entry::Vacant(e) => {
                log::debug!("Staged {}", e.key());
                e.insert(part);
                Ok(())
            }
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.parts.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&Part> {
        self.parts.get(path)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Staged parts ordered by path.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Part)> {
        self.parts.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Read the decompressed bytes of an archive entry.
pub fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>> {
    let mut file = archive.by_name(path).map_err(|e| match e {
        ZipError::FileNotFound => {
            Error::ZipError(format!("{}: file does not exist in the package", path))
        }
        e => Error::ZipError(format!("{}: {}", path, e)),
    })?;
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf)?;
    Ok(buf)
}
