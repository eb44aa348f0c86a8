//! Appending slides to an existing PPTX package.
//!
//! A [`Container`] reads the source archive lazily: only the parts that a new
//! slide has to reference are parsed, edited and staged in a [`PartStore`].
//! [`Container::close`] writes a new archive where every other entry is copied
//! as raw compressed bytes, then renames it over the target path.

use crate::fragment::{slide_document, slide_relationships, REL_SLIDE};
use crate::ids::{count_slide_parts, next_relationship_id, next_slide_list_id};
use crate::parts::{Part, PartStore};
use crate::template::template_archive;
use crate::xml::Element;
use pptadd_core::raster::encode_png;
use pptadd_core::{AddStep, DynamicImage, Error, Result, Slide};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const CONTENT_TYPES: &str = "[Content_Types].xml";
pub const PRESENTATION: &str = "ppt/presentation.xml";
pub const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";

pub const SLIDE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Identifiers assigned to a slide by [`Container::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedSlide {
    /// 1-based slide number.
    pub number: usize,
    /// Archive path of the slide part, e.g. `ppt/slides/slide5.xml`.
    pub part_name: String,
    /// Relationship id of the slide in the presentation relationships.
    pub relationship_id: String,
    /// Id of the slide in the presentation slide list.
    pub slide_id: u32,
}

fn missing(part: &str, element: &str) -> Error {
    Error::MissingElement {
        part: part.to_string(),
        element: element.to_string(),
    }
}

/// A presentation being extended with new slides.
pub struct Container<R: Read + Seek> {
    path: PathBuf,
    archive: ZipArchive<R>,
    parts: PartStore,
    slide_count: Option<usize>,
}

impl Container<BufReader<File>> {
    /// Open an existing package. [`Container::close`] replaces it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::IoError(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        Self::from_reader(BufReader::new(file), path)
    }
}

impl Container<Cursor<Vec<u8>>> {
    /// Start from the bundled template. [`Container::close`] writes the result to `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        log::debug!("Creating {} from the template", path.display());
        Self::from_reader(Cursor::new(template_archive()?), path)
    }
}

impl<R: Read + Seek> Container<R> {
    /// Use any seekable source; the result is written to `path` on close.
    pub fn from_reader(reader: R, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let archive = ZipArchive::new(reader).map_err(|e| {
            Error::ZipError(format!("{}: failed to open ZIP: {}", path.display(), e))
        })?;
        log::debug!("Opened {} with {} entries", path.display(), archive.len());
        Ok(Self {
            path,
            archive,
            parts: PartStore::new(),
            slide_count: None,
        })
    }

    /// The target path written by [`Container::close`].
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Slides in the source archive plus slides added so far.
    pub fn slide_count(&self) -> usize {
        self.slide_count
            .unwrap_or_else(|| count_slide_parts(self.archive.file_names()))
    }

    /// Parts staged so far.
    pub fn parts(&self) -> &PartStore {
        &self.parts
    }

    /// Append a slide.
    ///
    /// On error, the failed step is named in [`Error::AddFailed`]. Parts staged by
    /// earlier steps stay staged and the slide number is not reused, so the
    /// container should be aborted.
    pub fn add(&mut self, slide: &Slide) -> Result<AddedSlide> {
        let number = self.slide_count() + 1;
        self.slide_count = Some(number);
        let part_name = format!("ppt/slides/slide{}.xml", number);
        log::debug!("Adding slide {} as {}", number, part_name);

        self.register_content_type(&part_name, !slide.images.is_empty())
            .map_err(|e| e.in_step(number, AddStep::ContentTypes))?;
        let relationship_id = self
            .add_presentation_relationship(number)
            .map_err(|e| e.in_step(number, AddStep::PresentationRelationships))?;
        let rasters = self
            .stage_slide_part(slide, &part_name)
            .map_err(|e| e.in_step(number, AddStep::SlidePart))?;
        let targets = self
            .stage_media(number, &rasters)
            .map_err(|e| e.in_step(number, AddStep::Media))?;
        self.stage_slide_relationships(number, slide.layout(), &targets)
            .map_err(|e| e.in_step(number, AddStep::SlideRelationships))?;
        let slide_id = self
            .append_to_slide_list(&relationship_id)
            .map_err(|e| e.in_step(number, AddStep::SlideList))?;

        log::info!(
            "Added slide {} ({}, id {}, {} text boxes, {} item boxes, {} images)",
            number,
            relationship_id,
            slide_id,
            slide.text_boxes.len(),
            slide.item_boxes.len(),
            slide.images.len()
        );
        Ok(AddedSlide {
            number,
            part_name,
            relationship_id,
            slide_id,
        })
    }

    fn register_content_type(&mut self, part_name: &str, with_png: bool) -> Result<()> {
        let doc = self.parts.xml_mut(&mut self.archive, CONTENT_TYPES)?;
        let types = doc
            .select_root_mut("Types")
            .ok_or_else(|| missing(CONTENT_TYPES, "Types"))?;

        let has_png = types.children().any(|e| {
            e.name() == "Default"
                && e.attr("Extension")
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("png"))
        });
        if with_png && !has_png {
            types.push(
                Element::new("Default")
                    .with_attr("Extension", "png")
                    .with_attr("ContentType", PNG_CONTENT_TYPE),
            );
        }
        types.push(
            Element::new("Override")
                .with_attr("PartName", format!("/{}", part_name))
                .with_attr("ContentType", SLIDE_CONTENT_TYPE),
        );
        Ok(())
    }

    fn add_presentation_relationship(&mut self, number: usize) -> Result<String> {
        let doc = self.parts.xml_mut(&mut self.archive, PRESENTATION_RELS)?;
        let root = doc
            .select_root_mut("Relationships")
            .ok_or_else(|| missing(PRESENTATION_RELS, "Relationships"))?;

        let id = next_relationship_id(root, PRESENTATION_RELS, number)?;
        root.push(
            Element::new("Relationship")
                .with_attr("Id", &id)
                .with_attr("Type", REL_SLIDE)
                .with_attr("Target", format!("slides/slide{}.xml", number)),
        );
        Ok(id)
    }

    /// Build and stage the slide part. Returns the decoded rasters of its images.
    fn stage_slide_part(&mut self, slide: &Slide, part_name: &str) -> Result<Vec<DynamicImage>> {
        if self.archive.file_names().any(|name| name == part_name) {
            return Err(Error::PartConflict(part_name.to_string()));
        }
        let rasters = slide
            .images
            .iter()
            .map(|image| image.raster.raster())
            .collect::<Result<Vec<_>>>()?;
        let sizes: Vec<(u32, u32)> = rasters.iter().map(|r| (r.width(), r.height())).collect();

        let doc = slide_document(slide, &sizes)?;
        self.parts.stage(part_name, Part::Xml(doc))?;
        Ok(rasters)
    }

    /// Stage one PNG per image. Returns the targets relative to the slide part.
    fn stage_media(&mut self, number: usize, rasters: &[DynamicImage]) -> Result<Vec<String>> {
        let mut targets = Vec::with_capacity(rasters.len());
        for (i, raster) in rasters.iter().enumerate() {
            let file_name = format!("slide{}image{}.png", number, i);
            let png = encode_png(raster)?;
            self.parts
                .stage(format!("ppt/media/{}", file_name), Part::Blob(png))?;
            targets.push(format!("../media/{}", file_name));
        }
        Ok(targets)
    }

    fn stage_slide_relationships(
        &mut self,
        number: usize,
        layout: u32,
        targets: &[String],
    ) -> Result<()> {
        let path = format!("ppt/slides/_rels/slide{}.xml.rels", number);
        self.parts
            .stage(path, Part::Xml(slide_relationships(layout, targets)))
    }

    fn append_to_slide_list(&mut self, relationship_id: &str) -> Result<u32> {
        let doc = self.parts.xml_mut(&mut self.archive, PRESENTATION)?;
        let list = doc
            .select_root_mut("p:presentation")
            .ok_or_else(|| missing(PRESENTATION, "p:presentation"))?
            .child_mut("p:sldIdLst")
            .ok_or_else(|| missing(PRESENTATION, "p:sldIdLst"))?;

        let id = next_slide_list_id(list, PRESENTATION)?;
        list.push(
            Element::new("p:sldId")
                .with_attr("id", id)
                .with_attr("r:id", relationship_id),
        );
        Ok(id)
    }

    /// Write the updated package and replace the target path.
    ///
    /// The new archive is written to a temporary file in the target directory
    /// and renamed over the target only after it is complete. On error the
    /// target is left untouched and the temporary file is removed.
    pub fn close(mut self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut builder = tempfile::Builder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // Same as a plain create: 0666 minus the umask.
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }
        let temp = builder.tempfile_in(&dir).map_err(|e| {
            Error::IoError(std::io::Error::new(
                e.kind(),
                format!("cannot create a temporary file in {}: {}", dir.display(), e),
            ))
        })?;

        let writer = self.write_into(BufWriter::new(temp))?;
        let temp = writer.into_inner().map_err(|e| Error::IoError(e.into_error()))?;
        match std::fs::metadata(&self.path) {
            Ok(meta) => temp.as_file().set_permissions(meta.permissions())?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        temp.as_file().sync_all()?;

        let Container { path, archive, .. } = self;
        drop(archive);
        temp.persist(&path).map_err(|e| {
            Error::IoError(std::io::Error::new(
                e.error.kind(),
                format!("cannot replace {}: {}", path.display(), e.error),
            ))
        })?;
        log::info!("Saved {}", path.display());
        Ok(())
    }

    /// Discard all staged changes.
    pub fn abort(self) {
        log::debug!(
            "Discarding {} staged parts for {}",
            self.parts.len(),
            self.path.display()
        );
    }

    /// Copy untouched entries, then write every staged part.
    fn write_into<W: Write + Seek>(&mut self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut copied = 0;
        for i in 0..self.archive.len() {
            let file = self
                .archive
                .by_index_raw(i)
                .map_err(|e| Error::ZipError(format!("entry {}: {}", i, e)))?;
            if self.parts.contains(file.name()) {
                continue;
            }
            let name = file.name().to_string();
            zip.raw_copy_file(file)
                .map_err(|e| Error::ZipError(format!("{}: {}", name, e)))?;
            copied += 1;
        }

        for (name, part) in self.parts.iter() {
            zip.start_file(name, options)
                .map_err(|e| Error::ZipError(format!("{}: {}", name, e)))?;
            zip.write_all(&part.to_bytes()?)?;
        }

        let writer = zip
            .finish()
            .map_err(|e| Error::ZipError(format!("{}: {}", self.path.display(), e)))?;
        log::debug!(
            "Copied {} entries, wrote {} staged parts",
            copied,
            self.parts.len()
        );
        Ok(writer)
    }
}
