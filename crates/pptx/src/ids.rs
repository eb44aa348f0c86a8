//! Allocation of identifiers that must stay unique within a part.

use crate::xml::Element;
use pptadd_core::{Error, Result};
use std::collections::HashSet;

/// The first id used in an empty slide list.
pub const SLIDE_LIST_BASE: u32 = 256;

/// Slide list ids must stay below 2^31.
pub const SLIDE_LIST_MAX: u32 = 2_147_483_647;

/// How many candidate relationship ids are tried before giving up.
pub const ID_SEARCH_WINDOW: usize = 10_000;

const SLIDE_PREFIX: &str = "ppt/slides/slide";

/// Whether an archive entry is a slide part, `ppt/slides/slide<N>.xml`.
pub fn is_slide_part(name: &str) -> bool {
    name.strip_prefix(SLIDE_PREFIX)
        .and_then(|rest| rest.strip_suffix(".xml"))
        .map_or(false, |n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Count the slide parts among the entry names of an archive.
pub fn count_slide_parts<'a>(names: impl IntoIterator<Item = &'a str>) -> usize {
    names.into_iter().filter(|n| is_slide_part(n)).count()
}

/// The lowest `rId<N>` with `N >= start` not used by any relationship in `rels`.
///
/// `part` names the relationships part in errors.
pub fn next_relationship_id(rels: &Element, part: &str, start: usize) -> Result<String> {
    let mut used = HashSet::new();
    for rel in rels.children() {
        let id = rel.attr("Id").ok_or_else(|| Error::InvalidAttribute {
            part: part.to_string(),
            attribute: "Id".to_string(),
            message: format!("<{}> has no id", rel.name()),
        })?;
        used.insert(id);
    }

    (0..ID_SEARCH_WINDOW)
        .map(|i| format!("rId{}", start + i))
        .find(|id| !used.contains(id.as_str()))
        .ok_or_else(|| Error::IdentifierExhausted(part.to_string()))
}

/// An id greater than every `<p:sldId id>` in `list`, or the base id for an empty list.
pub fn next_slide_list_id(list: &Element, part: &str) -> Result<u32> {
    let mut next = SLIDE_LIST_BASE;
    for entry in list.children().filter(|e| e.name() == "p:sldId") {
        let invalid = |message: String| Error::InvalidAttribute {
            part: part.to_string(),
            attribute: "id".to_string(),
            message,
        };
        let value = entry
            .attr("id")
            .ok_or_else(|| invalid("a slide in the list has no id".to_string()))?;
        let id: u32 = value
            .parse()
            .map_err(|_| invalid(format!("not an integer: {:?}", value)))?;
        if id >= next {
            next = id
                .checked_add(1)
                .ok_or_else(|| Error::IdentifierExhausted(part.to_string()))?;
        }
    }
    if next > SLIDE_LIST_MAX {
        return Err(Error::IdentifierExhausted(part.to_string()));
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rels(ids: &[&str]) -> Element {
        ids.iter().fold(Element::new("Relationships"), |root, id| {
            root.with_child(Element::new("Relationship").with_attr("Id", id))
        })
    }

    fn slide_list(ids: &[&str]) -> Element {
        ids.iter().fold(Element::new("p:sldIdLst"), |root, id| {
            root.with_child(Element::new("p:sldId").with_attr("id", id))
        })
    }

    #[test]
    fn test_is_slide_part() {
        assert!(is_slide_part("ppt/slides/slide1.xml"));
        assert!(is_slide_part("ppt/slides/slide12.xml"));
        assert!(!is_slide_part("ppt/slides/_rels/slide1.xml.rels"));
        assert!(!is_slide_part("ppt/slides/slide.xml"));
        assert!(!is_slide_part("ppt/slideLayouts/slideLayout1.xml"));
        assert_eq!(
            count_slide_parts([
                "ppt/slides/slide1.xml",
                "ppt/slides/slide2.xml",
                "ppt/slides/_rels/slide2.xml.rels",
                "ppt/presentation.xml",
            ]),
            2
        );
    }

    #[test]
    fn test_relationship_id_starts_at_slide_number() {
        let root = rels(&["rId1", "rId2", "rId3"]);
        assert_eq!(next_relationship_id(&root, "p.rels", 2).unwrap(), "rId4");
        assert_eq!(next_relationship_id(&root, "p.rels", 7).unwrap(), "rId7");
        assert_eq!(next_relationship_id(&rels(&[]), "p.rels", 1).unwrap(), "rId1");
    }

    #[test]
    fn test_relationship_id_skips_gaps_in_order() {
        let root = rels(&["rId5", "rId7"]);
        assert_eq!(next_relationship_id(&root, "p.rels", 5).unwrap(), "rId6");
    }

    #[test]
    fn test_relationship_without_id_is_an_error() {
        let root = Element::new("Relationships").with_child(Element::new("Relationship"));
        let err = next_relationship_id(&root, "p.rels", 1).unwrap_err();
        assert!(matches!(err, Error::InvalidAttribute { ref attribute, .. } if attribute == "Id"));
    }

    #[test]
    fn test_relationship_window_exhausted() {
        let ids: Vec<String> = (1..=ID_SEARCH_WINDOW).map(|i| format!("rId{}", i)).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let err = next_relationship_id(&rels(&refs), "p.rels", 1).unwrap_err();
        assert_eq!(err.to_string(), "p.rels: failed to create a unique id");
    }

    #[test]
    fn test_slide_list_id() {
        assert_eq!(next_slide_list_id(&slide_list(&[]), "p.xml").unwrap(), 256);
        assert_eq!(
            next_slide_list_id(&slide_list(&["256", "300", "257"]), "p.xml").unwrap(),
            301
        );
        assert_eq!(next_slide_list_id(&slide_list(&["5"]), "p.xml").unwrap(), 256);
    }

    #[test]
    fn test_slide_list_id_errors() {
        let missing = Element::new("p:sldIdLst").with_child(Element::new("p:sldId"));
        assert!(next_slide_list_id(&missing, "p.xml").is_err());
        assert!(next_slide_list_id(&slide_list(&["abc"]), "p.xml").is_err());
        assert!(matches!(
            next_slide_list_id(&slide_list(&["2147483647"]), "p.xml"),
            Err(Error::IdentifierExhausted(_))
        ));
    }
}
