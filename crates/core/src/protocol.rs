//! Line-oriented text form of a list of slides.
//!
//! This is a flat description of slides to be appended, not a decoder for
//! PPTX files. Every record starts with a keyword on its own line:
//!
//! ```text
//! Slide
//!  Master 1
//!  TextBox
//!   Position [1080000, 720000]
//!   Line 000000 "alpha " FF0000 "beta"
//!   Title true
//!   Font {"Name":"Courier New","Size":22.0}
//!  ItemBox
//!   Position [1080000, 2160000, 7200000, 3600000]
//!   Item {"Level":0,"Text":"first"}
//!   Item {"Level":1,"Text":"nested"}
//!  Image
//!   Position [2160000, 720000]
//!   File path/to/picture.png
//! ```
//!
//! Leading and trailing whitespace is ignored, as are blank lines.

use crate::registry::CodecRegistry;
use crate::types::{Emu, Font, Image, Item, ItemBox, Line, LineElement, Rgb, Slide, TextBox};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufRead, Write};

/// Line input with one line of lookahead.
///
/// Lines are returned trimmed. Line numbers are 1-based and refer to the most
/// recently read or peeked line.
pub trait LineSource {
    /// Consume the next line. `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>>;

    /// Look at the next line without consuming it.
    fn peek(&mut self) -> Result<Option<&str>>;

    fn line_number(&self) -> usize;
}

/// [`LineSource`] over any buffered reader.
pub struct LineReader<R> {
    inner: R,
    peeked: Option<Option<String>>,
    line: usize,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            peeked: None,
            line: 0,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = String::new();
        loop {
            buf.clear();
            if self.inner.read_line(&mut buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let trimmed = buf.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }
}

impl<R: BufRead> LineSource for LineReader<R> {
    fn read_line(&mut self) -> Result<Option<String>> {
        match self.peeked.take() {
            Some(line) => Ok(line),
            None => self.next_line(),
        }
    }

    fn peek(&mut self) -> Result<Option<&str>> {
        if self.peeked.is_none() {
            let line = self.next_line()?;
            self.peeked = Some(line);
        }
        Ok(self.peeked.as_ref().and_then(|l| l.as_deref()))
    }

    fn line_number(&self) -> usize {
        self.line
    }
}

/// Encode slides to their text form.
pub fn encode_slides<W: Write>(slides: &[Slide], w: &mut W) -> Result<()> {
    for slide in slides {
        encode_slide(slide, w)?;
    }
    Ok(())
}

fn encode_slide<W: Write>(slide: &Slide, w: &mut W) -> Result<()> {
    writeln!(w, "Slide")?;
    writeln!(w, " Master {}", slide.master)?;
    for tb in &slide.text_boxes {
        encode_text_box(tb, w)?;
    }
    for ib in &slide.item_boxes {
        encode_item_box(ib, w)?;
    }
    for im in &slide.images {
        encode_image(im, w)?;
    }
    Ok(())
}

fn encode_text_box<W: Write>(tb: &TextBox, w: &mut W) -> Result<()> {
    writeln!(w, " TextBox")?;
    writeln!(w, "  Position {}", position(&[tb.x, tb.y]))?;
    for line in &tb.lines {
        write!(w, "  Line")?;
        for el in line {
            let color = el.color.unwrap_or(Rgb::BLACK);
            write!(w, " {} {}", color.to_hex(), json(&el.text)?)?;
        }
        writeln!(w)?;
    }
    writeln!(w, "  Title {}", json(&tb.title)?)?;
    writeln!(w, "  Font {}", json(&tb.font)?)?;
    Ok(())
}

fn encode_item_box<W: Write>(ib: &ItemBox, w: &mut W) -> Result<()> {
    writeln!(w, " ItemBox")?;
    writeln!(
        w,
        "  Position {}",
        position(&[ib.x, ib.y, ib.width, ib.height])
    )?;
    for item in &ib.items {
        writeln!(w, "  Item {}", json(item)?)?;
    }
    Ok(())
}

fn encode_image<W: Write>(im: &Image, w: &mut W) -> Result<()> {
    // Fail before writing anything for rasters without a text form.
    im.raster.magic()?;
    let mut payload = Vec::new();
    im.raster.encode(&mut payload)?;

    writeln!(w, " Image")?;
    writeln!(w, "  Position {}", position(&[im.x, im.y]))?;
    for line in payload.split(|&b| b == b'\n').filter(|l| !l.is_empty()) {
        w.write_all(b"  ")?;
        w.write_all(line)?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

fn position(values: &[Emu]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

fn json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value).map_err(std::io::Error::from)?)
}

/// Decode slides from their text form, using `registry` for image payloads.
pub fn decode_slides<R: BufRead>(input: R, registry: &CodecRegistry) -> Result<Vec<Slide>> {
    SlideDecoder::new(registry).decode(input)
}

/// Decoder for the text form of slides.
#[derive(Debug, Clone, Copy)]
pub struct SlideDecoder<'a> {
    registry: &'a CodecRegistry,
}

impl<'a> SlideDecoder<'a> {
    pub fn new(registry: &'a CodecRegistry) -> Self {
        Self { registry }
    }

    /// Decode all slides from a buffered reader.
    pub fn decode<R: BufRead>(&self, input: R) -> Result<Vec<Slide>> {
        self.decode_lines(&mut LineReader::new(input))
    }

    /// Decode all slides until the end of input.
    pub fn decode_lines(&self, lines: &mut dyn LineSource) -> Result<Vec<Slide>> {
        let mut slides = Vec::new();
        while lines.peek()?.is_some() {
            slides.push(self.decode_slide(lines)?);
        }
        log::debug!("Decoded {} slides", slides.len());
        Ok(slides)
    }

    fn decode_slide(&self, lines: &mut dyn LineSource) -> Result<Slide> {
        expect(lines, "Slide")?;
        let mut slide = Slide::default();
        loop {
            let kw = match lines.peek()? {
                Some(line) => keyword(line).to_string(),
                None => break,
            };
            match kw.as_str() {
                "TextBox" => slide.text_boxes.push(decode_text_box(lines)?),
                "ItemBox" => slide.item_boxes.push(decode_item_box(lines)?),
                "Image" => slide.images.push(self.decode_image(lines)?),
                "Master" => slide.master = field(lines, "Master")?,
                _ => break,
            }
        }
        Ok(slide)
    }

    fn decode_image(&self, lines: &mut dyn LineSource) -> Result<Image> {
        expect(lines, "Image")?;
        let [x, y]: [Emu; 2] = field(lines, "Position")?;

        let payload = lines.peek()?.map(str::to_string);
        let payload = payload.ok_or_else(|| Error::UnexpectedEof {
            line: lines.line_number(),
            expected: "image payload".to_string(),
        })?;
        if self.registry.is_empty() {
            return Err(Error::NoDecoders);
        }
        let codec = self
            .registry
            .find(&payload)
            .ok_or_else(|| Error::UnknownDecoder {
                line: lines.line_number(),
                prefix: keyword(&payload).chars().take(32).collect(),
            })?;

        let raster = codec.decode(lines).map_err(|e| match e {
            Error::Protocol { .. } | Error::UnexpectedEof { .. } | Error::Syntax { .. } => e,
            other => Error::Codec {
                line: lines.line_number(),
                message: other.to_string(),
            },
        })?;
        Ok(Image { x, y, raster })
    }
}

fn decode_text_box(lines: &mut dyn LineSource) -> Result<TextBox> {
    expect(lines, "TextBox")?;
    let [x, y]: [Emu; 2] = field(lines, "Position")?;
    let mut tb = TextBox {
        x,
        y,
        ..TextBox::default()
    };
    while matches!(lines.peek()?, Some(l) if keyword(l) == "Line") {
        tb.lines.push(decode_line(lines)?);
    }
    tb.title = field(lines, "Title")?;
    tb.font = field::<Option<Font>>(lines, "Font")?;
    Ok(tb)
}

fn decode_item_box(lines: &mut dyn LineSource) -> Result<ItemBox> {
    expect(lines, "ItemBox")?;
    let [x, y, width, height]: [Emu; 4] = field(lines, "Position")?;
    let mut ib = ItemBox {
        x,
        y,
        width,
        height,
        items: Vec::new(),
    };
    while matches!(lines.peek()?, Some(l) if keyword(l) == "Item") {
        ib.items.push(field::<Item>(lines, "Item")?);
    }
    Ok(ib)
}

/// Parse `Line RRGGBB "text" RRGGBB "text" ...`.
fn decode_line(lines: &mut dyn LineSource) -> Result<Line> {
    let rest = keyword_line(lines, "Line")?;
    let lino = lines.line_number();
    let syntax = |message: String| Error::Syntax {
        line: lino,
        message,
    };

    let mut line = Line::new();
    let mut rest = rest.trim_start();
    while !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (hex, tail) = rest.split_at(end);
        let color = Rgb::from_hex(hex)
            .ok_or_else(|| syntax(format!("expected RRGGBB color, got {:?}", hex)))?;

        let tail = tail.trim_start();
        let mut stream = serde_json::Deserializer::from_str(tail).into_iter::<String>();
        let text = match stream.next() {
            Some(Ok(text)) => text,
            Some(Err(e)) => return Err(syntax(format!("invalid quoted text: {}", e))),
            None => return Err(syntax(format!("missing text after color {}", hex))),
        };
        rest = tail[stream.byte_offset()..].trim_start();
        line.push(LineElement::colored(text, color));
    }
    Ok(line)
}

/// First whitespace-separated token of a line.
fn keyword(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

/// Read a line which must equal `kw`.
fn expect(lines: &mut dyn LineSource, kw: &str) -> Result<()> {
    match lines.read_line()? {
        Some(line) if line == kw => Ok(()),
        Some(line) => Err(Error::Protocol {
            line: lines.line_number(),
            expected: kw.to_string(),
            found: line,
        }),
        None => Err(Error::UnexpectedEof {
            line: lines.line_number(),
            expected: kw.to_string(),
        }),
    }
}

/// Read a line starting with keyword `kw` and return the rest.
fn keyword_line(lines: &mut dyn LineSource, kw: &str) -> Result<String> {
    match lines.read_line()? {
        Some(line) if keyword(&line) == kw => Ok(line[kw.len()..].trim().to_string()),
        Some(line) => Err(Error::Protocol {
            line: lines.line_number(),
            expected: kw.to_string(),
            found: line,
        }),
        None => Err(Error::UnexpectedEof {
            line: lines.line_number(),
            expected: kw.to_string(),
        }),
    }
}

/// Read `kw <json>` and parse the value.
fn field<T: DeserializeOwned>(lines: &mut dyn LineSource, kw: &str) -> Result<T> {
    let rest = keyword_line(lines, kw)?;
    serde_json::from_str(&rest).map_err(|e| Error::Syntax {
        line: lines.line_number(),
        message: format!("{}: {}", kw, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{EmbeddedImage, Raster};
    use crate::types::{simple_items, INCH, MILLIMETER};
    use image::{DynamicImage, GrayImage, Luma};

    fn gradient() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(16, 8, |x, y| {
            Luma([(x * 16 + y) as u8])
        }))
    }

    fn encode(slides: &[Slide]) -> String {
        let mut out = Vec::new();
        encode_slides(slides, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn decode(text: &str) -> Result<Vec<Slide>> {
        decode_slides(text.as_bytes(), &CodecRegistry::with_builtin_codecs())
    }

    fn example_slide(n: usize) -> Slide {
        Slide {
            master: 0,
            text_boxes: vec![
                TextBox {
                    x: 30 * MILLIMETER,
                    y: 20 * MILLIMETER,
                    lines: vec![vec![LineElement::colored(
                        format!("Slide {}: alpha beta gamma", n),
                        Rgb::BLACK,
                    )]],
                    title: true,
                    font: None,
                },
                TextBox {
                    x: 30 * MILLIMETER,
                    y: 90 * MILLIMETER,
                    lines: vec![
                        vec![
                            LineElement::colored("red ", Rgb::new(0xff, 0, 0)),
                            LineElement::colored("and \"quoted\" blue", Rgb::new(0, 0, 0xff)),
                        ],
                        vec![LineElement::colored("  ", Rgb::BLACK)],
                        vec![],
                    ],
                    title: false,
                    font: Some(Font::new("Courier New", 22.0)),
                },
            ],
            item_boxes: vec![ItemBox {
                x: INCH,
                y: 2 * INCH,
                width: 6 * INCH,
                height: 3 * INCH,
                items: simple_items("first\n-second\n--third"),
            }],
            images: vec![Image::new(
                60 * MILLIMETER,
                20 * MILLIMETER,
                EmbeddedImage::new(gradient()),
            )],
        }
    }

    #[test]
    fn test_roundtrip_two_slides() {
        let slides = vec![example_slide(1), example_slide(2)];
        let text = encode(&slides);
        let decoded = decode(&text).unwrap();
        assert_eq!(decoded, slides);
        assert_eq!(encode(&decoded), text);
    }

    #[test]
    fn test_uncolored_text_decodes_as_black() {
        let mut text_box = TextBox::new(0, 0, "plain\nlines");
        text_box.lines[1][0].color = Some(Rgb::BLACK);
        let slide = Slide {
            text_boxes: vec![text_box],
            ..Slide::new()
        };

        let text = encode(&[slide]);
        assert!(text.contains("Line 000000 \"plain\"\n"));
        let decoded = decode(&text).unwrap();
        let lines = &decoded[0].text_boxes[0].lines;
        assert_eq!(lines[0][0].color, Some(Rgb::BLACK));
        assert_eq!(lines[1][0].color, Some(Rgb::BLACK));
        assert_eq!(encode(&decoded), text);
    }

    #[test]
    fn test_encoded_layout() {
        let slide = Slide {
            master: 2,
            text_boxes: vec![TextBox {
                x: 1080000,
                y: 720000,
                lines: vec![vec![
                    LineElement::new("Hello"),
                    LineElement::colored("World", Rgb::new(0x12, 0x34, 0xab)),
                ]],
                title: true,
                font: Some(Font::new("", 22.0)),
            }],
            item_boxes: vec![ItemBox {
                x: 1,
                y: 2,
                width: 3,
                height: 4,
                items: vec![Item::new(1, "x")],
            }],
            images: vec![],
        };
        assert_eq!(
            encode(&[slide]),
            "Slide\n Master 2\n TextBox\n  Position [1080000, 720000]\n  \
             Line 000000 \"Hello\" 1234AB \"World\"\n  Title true\n  \
             Font {\"Name\":\"\",\"Size\":22.0}\n ItemBox\n  Position [1, 2, 3, 4]\n  \
             Item {\"Level\":1,\"Text\":\"x\"}\n"
        );
    }

    #[test]
    fn test_hello_scenario() {
        let slide = Slide {
            master: 0,
            text_boxes: vec![TextBox {
                x: 1080000,
                y: 720000,
                lines: vec![vec![LineElement::colored("Hello", Rgb::BLACK)]],
                title: true,
                font: None,
            }],
            item_boxes: vec![ItemBox {
                x: 1080000,
                y: 2160000,
                width: 7200000,
                height: 3600000,
                items: vec![Item::new(0, "one"), Item::new(1, "two")],
            }],
            images: vec![Image::new(0, 0, EmbeddedImage::new(gradient()))],
        };
        let decoded = decode(&encode(&[slide.clone()])).unwrap();
        assert_eq!(decoded.len(), 1);
        let got = &decoded[0];
        assert_eq!(got.master, 0);
        assert_eq!(got.text_boxes, slide.text_boxes);
        assert!(got.text_boxes[0].title);
        assert_eq!(got.item_boxes, slide.item_boxes);
        assert_eq!(got.images[0].raster.raster().unwrap(), gradient());
    }

    #[test]
    fn test_decode_go_style_input() {
        // Indentation, lowercase colors and an integer font size are accepted.
        let text = "Slide\n Master 0\n TextBox\n  Position [1080000, 720000]\n   \
                    Line 00ff00 \"Slide 1\"\n  Title true\n  Font {\"Name\":\"\",\"Size\":0}\n";
        let slides = decode(text).unwrap();
        assert_eq!(slides.len(), 1);
        let tb = &slides[0].text_boxes[0];
        assert_eq!(tb.x, 1080000);
        assert_eq!(
            tb.lines,
            vec![vec![LineElement::colored("Slide 1", Rgb::new(0, 0xff, 0))]]
        );
        assert_eq!(tb.font, Some(Font::new("", 0.0)));
    }

    #[test]
    fn test_empty_input_has_no_slides() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("\n  \n").unwrap().is_empty());
    }

    #[test]
    fn test_slide_without_master_ends_at_next_slide() {
        let slides = decode("Slide\nSlide\n Master 3\n").unwrap();
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].master, 0);
        assert_eq!(slides[1].master, 3);
    }

    #[test]
    fn test_unknown_record_stops_slide() {
        let err = decode("Slide\n Master 1\n Shape\n").unwrap_err();
        match err {
            Error::Protocol {
                line,
                expected,
                found,
            } => {
                assert_eq!(line, 3);
                assert_eq!(expected, "Slide");
                assert_eq!(found, "Shape");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_field_reports_line() {
        let err = decode("Slide\n TextBox\n  Title true\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 3: expected \"Position\", got \"Title true\""
        );
    }

    #[test]
    fn test_eof_inside_record_is_error() {
        let err = decode("Slide\n TextBox\n  Position [1, 2]\n").unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof { ref expected, .. } if expected == "Title"));
    }

    #[test]
    fn test_bad_json_is_syntax_error() {
        let err = decode("Slide\n ItemBox\n  Position [1, 2]\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 3, .. }));
    }

    #[test]
    fn test_bad_line_color() {
        let err = decode("Slide\n TextBox\n  Position [1, 2]\n  Line red \"x\"\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 4, .. }));
    }

    #[test]
    fn test_unknown_image_decoder() {
        let err = decode("Slide\n Image\n  Position [1, 2]\n  Gif R0lGOD\n").unwrap_err();
        match err {
            Error::UnknownDecoder { line, prefix } => {
                assert_eq!(line, 4);
                assert_eq!(prefix, "Gif");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_no_decoders_registered() {
        let err = decode_slides(
            "Slide\n Image\n  Position [1, 2]\n  Png AAAA\n".as_bytes(),
            &CodecRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoDecoders));
    }

    #[test]
    fn test_codec_failure_carries_line() {
        let err = decode("Slide\n Image\n  Position [1, 2]\n  Png notbase64!\n").unwrap_err();
        assert!(matches!(err, Error::Codec { line: 4, .. }));
    }

    #[derive(Debug)]
    struct Generated;

    impl Raster for Generated {
        fn raster(&self) -> Result<DynamicImage> {
            Ok(gradient())
        }
    }

    #[test]
    fn test_unserializable_image_fails_encoding() {
        let slide = Slide {
            images: vec![Image::new(0, 0, Generated)],
            ..Slide::default()
        };
        let mut out = Vec::new();
        let err = encode_slides(&[slide], &mut out).unwrap_err();
        assert!(matches!(err, Error::NotSerializable));
    }

    #[test]
    fn test_line_reader_peek_and_numbers() {
        let mut reader = LineReader::new("a\n\n  b  \r\nc".as_bytes());
        assert_eq!(reader.peek().unwrap(), Some("a"));
        assert_eq!(reader.line_number(), 1);
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("a"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("b"));
        assert_eq!(reader.line_number(), 3);
        assert_eq!(reader.peek().unwrap(), Some("c"));
        assert_eq!(reader.peek().unwrap(), Some("c"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("c"));
        assert_eq!(reader.peek().unwrap(), None);
        assert_eq!(reader.read_line().unwrap(), None);
    }
}
