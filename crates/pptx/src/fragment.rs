//! XML fragments for new slides: shapes, pictures, and the slide skeleton.
//!
//! Every builder returns an [`Element`] tree; user text only ever enters as
//! text nodes or attribute values, so the writer escapes it.

use crate::xml::{Element, XmlDocument};
use pptadd_core::{
    Emu, Error, Font, Image, Item, ItemBox, LineElement, Result, Slide, TextBox, DPI, INCH,
};

pub const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
pub const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const NS_A14: &str = "http://schemas.microsoft.com/office/drawing/2010/main";
pub const NS_PACKAGE_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

pub const REL_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
pub const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Extent given to text boxes. PowerPoint resizes them to fit on first render.
pub const TEXT_BOX_EXTENT: Emu = 360_000;

/// The layout is always the first relationship of a new slide.
pub const LAYOUT_RELATIONSHIP_ID: &str = "rId1";

/// Path of the shape tree inside a slide part.
pub const SHAPE_TREE: &str = "p:cSld/p:spTree";

/// Deepest paragraph level DrawingML accepts in `a:pPr lvl`.
pub const MAX_ITEM_LEVEL: u32 = 8;

const USE_LOCAL_DPI_EXT: &str = "{28A0092B-C50C-407E-A947-70E740481C1C}";
const HIDDEN_FILL_EXT: &str = "{909E8E84-426E-40DD-AFC4-6F175D3DCCD1}";

/// Relationship id of the `index`th picture in its slide's relationships part.
pub fn image_relationship_id(index: usize) -> String {
    format!("rId{}", index + 2)
}

/// Convert a pixel length at the fixed resolution into EMU.
pub fn pixels_to_emu(px: u32) -> Emu {
    Emu::from(px) * INCH / DPI
}

fn offset_and_extent(x: Emu, y: Emu, cx: Emu, cy: Emu) -> Element {
    Element::new("a:xfrm")
        .with_child(Element::new("a:off").with_attr("x", x).with_attr("y", y))
        .with_child(Element::new("a:ext").with_attr("cx", cx).with_attr("cy", cy))
}

fn rect_geometry() -> Element {
    Element::new("a:prstGeom")
        .with_attr("prst", "rect")
        .with_child(Element::new("a:avLst"))
}

fn color_fill(hex: &str) -> Element {
    Element::new("a:solidFill").with_child(Element::new("a:srgbClr").with_attr("val", hex))
}

/// A slide without shapes.
pub fn minimal_slide() -> XmlDocument {
    let group = Element::new("p:nvGrpSpPr")
        .with_child(Element::new("p:cNvPr").with_attr("id", 1).with_attr("name", ""))
        .with_child(Element::new("p:cNvGrpSpPr"))
        .with_child(Element::new("p:nvPr"));
    let group_xfrm = Element::new("a:xfrm")
        .with_child(Element::new("a:off").with_attr("x", 0).with_attr("y", 0))
        .with_child(Element::new("a:ext").with_attr("cx", 0).with_attr("cy", 0))
        .with_child(Element::new("a:chOff").with_attr("x", 0).with_attr("y", 0))
        .with_child(Element::new("a:chExt").with_attr("cx", 0).with_attr("cy", 0));

    let root = Element::new("p:sld")
        .with_attr("xmlns:a", NS_A)
        .with_attr("xmlns:p", NS_P)
        .with_attr("xmlns:r", NS_R)
        .with_child(
            Element::new("p:cSld").with_child(
                Element::new("p:spTree")
                    .with_child(group)
                    .with_child(Element::new("p:grpSpPr").with_child(group_xfrm)),
            ),
        )
        .with_child(Element::new("p:clrMapOvr").with_child(Element::new("a:masterClrMapping")));
    XmlDocument::new(root)
}

/// Run properties, or `None` when the run keeps every default.
fn run_properties(font: Option<&Font>, element: &LineElement) -> Option<Element> {
    let size = font.and_then(Font::size_hundredths);
    let typeface = font.map(|f| f.name.as_str()).filter(|name| !name.is_empty());
    if size.is_none() && typeface.is_none() && element.color.is_none() {
        return None;
    }

    let mut props = Element::new("a:rPr").with_attr("lang", "en-US").with_attr("dirty", 0);
    if let Some(sz) = size {
        props.set_attr("sz", sz);
    }
    if let Some(color) = element.color {
        props.push(color_fill(&color.to_hex()));
    }
    if let Some(name) = typeface {
        props.push(Element::new("a:latin").with_attr("typeface", name));
        props.push(Element::new("a:cs").with_attr("typeface", name));
    }
    Some(props)
}

fn text_run(text: &str, props: Option<Element>) -> Element {
    let mut run = Element::new("a:r");
    if let Some(props) = props {
        run.push(props);
    }
    run.with_child(Element::new("a:t").with_text(text))
}

/// A text box. `id` is the shape id in the slide, `index` its position among the text boxes.
pub fn text_box_shape(text_box: &TextBox, id: u32, index: usize) -> Element {
    let mut nv_pr = Element::new("p:nvPr");
    if text_box.title {
        nv_pr.push(Element::new("p:ph").with_attr("type", "title"));
    }
    let non_visual = Element::new("p:nvSpPr")
        .with_child(
            Element::new("p:cNvPr")
                .with_attr("id", id)
                .with_attr("name", format!("TextBox {}", index + 1)),
        )
        .with_child(Element::new("p:cNvSpPr").with_attr("txBox", 1))
        .with_child(nv_pr);
    let shape_props = Element::new("p:spPr")
        .with_child(offset_and_extent(
            text_box.x,
            text_box.y,
            TEXT_BOX_EXTENT,
            TEXT_BOX_EXTENT,
        ))
        .with_child(rect_geometry())
        .with_child(Element::new("a:noFill"));

    let mut body = Element::new("p:txBody").with_child(
        Element::new("a:bodyPr")
            .with_attr("wrap", "none")
            .with_attr("rtlCol", 0)
            .with_child(Element::new("a:spAutoFit")),
    );
    body.push(Element::new("a:lstStyle"));
    for line in &text_box.lines {
        let paragraph = body.push(Element::new("a:p"));
        for element in line {
            paragraph.push(text_run(
                &element.text,
                run_properties(text_box.font.as_ref(), element),
            ));
        }
    }
    if text_box.lines.is_empty() {
        body.push(Element::new("a:p"));
    }

    Element::new("p:sp")
        .with_child(non_visual)
        .with_child(shape_props)
        .with_child(body)
}

fn item_paragraph(item: &Item) -> Element {
    Element::new("a:p")
        .with_child(Element::new("a:pPr").with_attr("lvl", item.level.min(MAX_ITEM_LEVEL)))
        .with_child(text_run(&item.text, None))
}

/// An item box, rendered as the body placeholder of the layout.
pub fn item_box_shape(item_box: &ItemBox, id: u32, index: usize) -> Element {
    let non_visual = Element::new("p:nvSpPr")
        .with_child(
            Element::new("p:cNvPr")
                .with_attr("id", id)
                .with_attr("name", format!("ItemBox {}", index + 1)),
        )
        .with_child(Element::new("p:cNvSpPr"))
        .with_child(Element::new("p:nvPr").with_child(Element::new("p:ph").with_attr("idx", 1)));
    let shape_props = Element::new("p:spPr").with_child(offset_and_extent(
        item_box.x,
        item_box.y,
        item_box.width,
        item_box.height,
    ));

    let mut body = Element::new("p:txBody")
        .with_child(Element::new("a:bodyPr"))
        .with_child(Element::new("a:lstStyle"));
    for item in &item_box.items {
        body.push(item_paragraph(item));
    }
    if item_box.items.is_empty() {
        body.push(Element::new("a:p"));
    }

    Element::new("p:sp")
        .with_child(non_visual)
        .with_child(shape_props)
        .with_child(body)
}

/// A picture referencing its media part through `relationship_id`.
///
/// `size` is the raster size in pixels.
pub fn picture_shape(
    image: &Image,
    size: (u32, u32),
    id: u32,
    index: usize,
    relationship_id: &str,
) -> Element {
    let non_visual = Element::new("p:nvPicPr")
        .with_child(
            Element::new("p:cNvPr")
                .with_attr("id", id)
                .with_attr("name", format!("Picture {}", index + 1)),
        )
        .with_child(
            Element::new("p:cNvPicPr")
                .with_child(Element::new("a:picLocks").with_attr("noChangeAspect", 1)),
        )
        .with_child(Element::new("p:nvPr"));

    let blip = Element::new("a:blip")
        .with_attr("r:embed", relationship_id)
        .with_child(
            Element::new("a:extLst").with_child(
                Element::new("a:ext").with_attr("uri", USE_LOCAL_DPI_EXT).with_child(
                    Element::new("a14:useLocalDpi")
                        .with_attr("xmlns:a14", NS_A14)
                        .with_attr("val", 0),
                ),
            ),
        );
    let fill = Element::new("p:blipFill")
        .with_child(blip)
        .with_child(Element::new("a:srcRect"))
        .with_child(Element::new("a:stretch").with_child(Element::new("a:fillRect")));

    let hidden_fill = Element::new("a:extLst").with_child(
        Element::new("a:ext").with_attr("uri", HIDDEN_FILL_EXT).with_child(
            Element::new("a14:hiddenFill")
                .with_attr("xmlns:a14", NS_A14)
                .with_child(color_fill("FFFFFF")),
        ),
    );
    let shape_props = Element::new("p:spPr")
        .with_attr("bwMode", "auto")
        .with_child(offset_and_extent(
            image.x,
            image.y,
            pixels_to_emu(size.0),
            pixels_to_emu(size.1),
        ))
        .with_child(rect_geometry())
        .with_child(Element::new("a:noFill"))
        .with_child(hidden_fill);

    Element::new("p:pic")
        .with_child(non_visual)
        .with_child(fill)
        .with_child(shape_props)
}

/// The complete slide part: text boxes, then item boxes, then pictures.
///
/// `picture_sizes` holds the pixel size of each image of the slide, in order.
/// Shape ids are numbered from 2, after the group shape of the tree.
pub fn slide_document(slide: &Slide, picture_sizes: &[(u32, u32)]) -> Result<XmlDocument> {
    if picture_sizes.len() != slide.images.len() {
        return Err(Error::ImageError(format!(
            "{} images but {} picture sizes",
            slide.images.len(),
            picture_sizes.len()
        )));
    }

    let mut doc = minimal_slide();
    let tree = doc
        .root_mut()
        .find_mut(SHAPE_TREE)
        .ok_or_else(|| Error::MissingElement {
            part: "slide template".to_string(),
            element: SHAPE_TREE.to_string(),
        })?;

    let mut ids = 2u32..;
    let mut next_id = || ids.next().unwrap_or(u32::MAX);
    for (i, text_box) in slide.text_boxes.iter().enumerate() {
        tree.push(text_box_shape(text_box, next_id(), i));
    }
    for (i, item_box) in slide.item_boxes.iter().enumerate() {
        tree.push(item_box_shape(item_box, next_id(), i));
    }
    for (i, (image, size)) in slide.images.iter().zip(picture_sizes).enumerate() {
        tree.push(picture_shape(
            image,
            *size,
            next_id(),
            i,
            &image_relationship_id(i),
        ));
    }
    Ok(doc)
}

/// The relationships part of a new slide: its layout, then one entry per picture.
pub fn slide_relationships(layout: u32, media_targets: &[String]) -> XmlDocument {
    let mut root = Element::new("Relationships")
        .with_attr("xmlns", NS_PACKAGE_RELATIONSHIPS)
        .with_child(
            Element::new("Relationship")
                .with_attr("Id", LAYOUT_RELATIONSHIP_ID)
                .with_attr("Type", REL_SLIDE_LAYOUT)
                .with_attr("Target", format!("../slideLayouts/slideLayout{}.xml", layout)),
        );
    for (i, target) in media_targets.iter().enumerate() {
        root.push(
            Element::new("Relationship")
                .with_attr("Id", image_relationship_id(i))
                .with_attr("Type", REL_IMAGE)
                .with_attr("Target", target),
        );
    }
    XmlDocument::new(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pptadd_core::{DynamicImage, EmbeddedImage, Rgb};

    fn ids_in(el: &Element, out: &mut Vec<String>) {
        if el.name() == "p:cNvPr" {
            out.extend(el.attr("id").map(str::to_string));
        }
        for child in el.children() {
            ids_in(child, out);
        }
    }

    fn image() -> Image {
        Image::new(10, 20, EmbeddedImage::new(DynamicImage::new_rgb8(96, 48)))
    }

    #[test]
    fn test_minimal_slide_layout() {
        let doc = minimal_slide();
        let root = doc.root();
        assert_eq!(root.name(), "p:sld");
        assert_eq!(root.attr("xmlns:p"), Some(NS_P));
        let tree = root.find(SHAPE_TREE).unwrap();
        let names: Vec<_> = tree.children().map(Element::name).collect();
        assert_eq!(names, vec!["p:nvGrpSpPr", "p:grpSpPr"]);
        assert!(root.find("p:clrMapOvr/a:masterClrMapping").is_some());
    }

    #[test]
    fn test_plain_text_box_has_no_run_properties() {
        let shape = text_box_shape(&TextBox::new(100, 200, "a\nb"), 2, 0);
        assert_eq!(
            shape.find("p:nvSpPr/p:cNvPr").unwrap().attr("name"),
            Some("TextBox 1")
        );
        let off = shape.find("p:spPr/a:xfrm/a:off").unwrap();
        assert_eq!((off.attr("x"), off.attr("y")), (Some("100"), Some("200")));
        let ext = shape.find("p:spPr/a:xfrm/a:ext").unwrap();
        assert_eq!(ext.attr("cx"), Some("360000"));

        let body = shape.child("p:txBody").unwrap();
        assert_eq!(body.children().filter(|e| e.name() == "a:p").count(), 2);
        assert!(body.find("a:p/a:r/a:rPr").is_none());
        assert_eq!(body.find("a:p/a:r/a:t").unwrap().text(), "a");
        assert!(shape.find("p:nvSpPr/p:nvPr/p:ph").is_none());
    }

    #[test]
    fn test_title_font_and_color() {
        let text_box = TextBox {
            x: 0,
            y: 0,
            lines: vec![vec![
                LineElement::colored("red", Rgb::new(255, 0, 0)),
                LineElement::new("plain"),
            ]],
            title: true,
            font: Some(Font::new("Courier New", 20.0)),
        };
        let shape = text_box_shape(&text_box, 5, 3);
        assert_eq!(
            shape.find("p:nvSpPr/p:nvPr/p:ph").unwrap().attr("type"),
            Some("title")
        );

        let runs: Vec<_> = shape
            .find("p:txBody/a:p")
            .unwrap()
            .children()
            .collect();
        assert_eq!(runs.len(), 2);
        let props = runs[0].child("a:rPr").unwrap();
        assert_eq!(props.attr("sz"), Some("2000"));
        assert_eq!(
            props.find("a:solidFill/a:srgbClr").unwrap().attr("val"),
            Some("FF0000")
        );
        assert_eq!(props.child("a:latin").unwrap().attr("typeface"), Some("Courier New"));
        assert_eq!(props.child("a:cs").unwrap().attr("typeface"), Some("Courier New"));
        assert!(runs[1].find("a:rPr/a:solidFill").is_none());
    }

    #[test]
    fn test_item_box_levels() {
        let item_box = ItemBox {
            x: 1,
            y: 2,
            width: 3,
            height: 4,
            items: vec![
                Item::new(0, "top"),
                Item::new(2, "deep"),
                Item::new(12, "deeper"),
            ],
        };
        let shape = item_box_shape(&item_box, 3, 0);
        assert_eq!(
            shape.find("p:nvSpPr/p:nvPr/p:ph").unwrap().attr("idx"),
            Some("1")
        );
        let ext = shape.find("p:spPr/a:xfrm/a:ext").unwrap();
        assert_eq!((ext.attr("cx"), ext.attr("cy")), (Some("3"), Some("4")));
        let levels: Vec<_> = shape
            .child("p:txBody")
            .unwrap()
            .children()
            .filter(|e| e.name() == "a:p")
            .map(|p| p.find("a:pPr").unwrap().attr("lvl").unwrap().to_string())
            .collect();
        assert_eq!(levels, vec!["0", "2", "8"]);
    }

    #[test]
    fn test_picture_extent_uses_dpi() {
        let shape = picture_shape(&image(), (96, 48), 4, 0, "rId2");
        let ext = shape.find("p:spPr/a:xfrm/a:ext").unwrap();
        assert_eq!(ext.attr("cx"), Some("914400"));
        assert_eq!(ext.attr("cy"), Some("457200"));
        assert_eq!(
            shape.find("p:blipFill/a:blip").unwrap().attr("r:embed"),
            Some("rId2")
        );
        assert_eq!(shape.find("p:spPr").unwrap().attr("bwMode"), Some("auto"));
    }

    #[test]
    fn test_slide_document_shape_ids_are_unique() {
        let mut slide = Slide::new();
        slide.text_boxes.push(TextBox::new(0, 0, "one"));
        slide.text_boxes.push(TextBox::new(0, 0, "two"));
        slide.item_boxes.push(ItemBox::default());
        slide.images.push(image());

        let doc = slide_document(&slide, &[(96, 48)]).unwrap();
        let mut ids = Vec::new();
        ids_in(doc.root(), &mut ids);
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);

        let tree = doc.root().find(SHAPE_TREE).unwrap();
        let kinds: Vec<_> = tree.children().map(Element::name).skip(2).collect();
        assert_eq!(kinds, vec!["p:sp", "p:sp", "p:sp", "p:pic"]);

        assert!(slide_document(&slide, &[]).is_err());
    }

    #[test]
    fn test_slide_relationships() {
        let doc = slide_relationships(3, &["../media/slide2image0.png".to_string()]);
        let rels: Vec<_> = doc.root().children().collect();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].attr("Id"), Some("rId1"));
        assert_eq!(
            rels[0].attr("Target"),
            Some("../slideLayouts/slideLayout3.xml")
        );
        assert_eq!(rels[1].attr("Id"), Some("rId2"));
        assert_eq!(rels[1].attr("Type"), Some(REL_IMAGE));
    }

    #[test]
    fn test_text_is_escaped_on_write() {
        let shape = text_box_shape(&TextBox::new(0, 0, "<b>&</b>"), 2, 0);
        let bytes = XmlDocument::new(shape).to_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("&lt;b&gt;&amp;&lt;/b&gt;"));
    }
}
