//! XML normalization: raw feed text → owned element tree.
//!
//! Feeds are bounded documents (one vendor export per run), so the whole
//! tree is materialized up front. Extraction then works with plain
//! child/descendant lookups instead of event-loop state.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ParseError;

/// One element of the parsed document: tag name, attributes, concatenated
/// text content, and child elements in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn new(name: String, attributes: BTreeMap<String, String>) -> Self {
        Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// The element's own text content, trimmed.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// First direct child with the given tag, if any.
    #[must_use]
    pub fn child(&self, tag: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == tag)
    }

    /// Trimmed text of the first direct child with the given tag.
    ///
    /// Absence of the child is not an error — it yields the empty string,
    /// which downstream numeric parsing turns into zero.
    #[must_use]
    pub fn child_text(&self, tag: &str) -> &str {
        self.child(tag).map_or("", XmlElement::text)
    }

    /// Every descendant (any depth, excluding `self`) with the given tag,
    /// in document order.
    #[must_use]
    pub fn descendants(&self, tag: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        self.collect_descendants(tag, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, tag: &str, out: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if child.name == tag {
                out.push(child);
            }
            child.collect_descendants(tag, out);
        }
    }

    /// Attribute value, or the empty string when absent.
    #[must_use]
    pub fn attr(&self, name: &str) -> &str {
        self.attributes.get(name).map_or("", String::as_str)
    }
}

/// Parse a feed document into its root element.
///
/// Strips a leading byte-order mark. Never attempts partial recovery: any
/// malformed-XML condition fails the whole document.
///
/// # Errors
///
/// Returns [`ParseError`] with the parser diagnostic and byte position on
/// malformed input, a missing root, trailing content after the root, or a
/// document truncated before the root closes.
pub fn parse_document(raw: &str) -> Result<XmlElement, ParseError> {
    let cleaned = raw.trim_start_matches('\u{feff}');

    let mut reader = Reader::from_str(cleaned);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if root.is_some() && stack.is_empty() {
                    return Err(ParseError::TrailingContent {
                        position: reader.buffer_position(),
                    });
                }
                stack.push(element_from_start(&e, &reader)?);
            }
            Ok(Event::Empty(e)) => {
                if root.is_some() && stack.is_empty() {
                    return Err(ParseError::TrailingContent {
                        position: reader.buffer_position(),
                    });
                }
                let element = element_from_start(&e, &reader)?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(_)) => {
                // quick-xml rejects mismatched end tags before we get here,
                // so the stack cannot be empty.
                let Some(finished) = stack.pop() else {
                    return Err(ParseError::Malformed {
                        position: reader.buffer_position(),
                        reason: "unexpected closing tag".to_string(),
                    });
                };
                attach(&mut stack, &mut root, finished);
            }
            Ok(Event::Text(e)) => {
                if let Some(top) = stack.last_mut() {
                    let text = e.unescape().map_err(|err| ParseError::Malformed {
                        position: reader.buffer_position(),
                        reason: err.to_string(),
                    })?;
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::Eof) => break,
            // Declaration, comments, processing instructions, doctype.
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::Malformed {
                    position: reader.buffer_position(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if !stack.is_empty() {
        return Err(ParseError::UnexpectedEof);
    }
    root.ok_or(ParseError::NoRoot)
}

fn element_from_start<R>(
    start: &BytesStart<'_>,
    reader: &Reader<R>,
) -> Result<XmlElement, ParseError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut attributes = BTreeMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ParseError::Malformed {
            position: reader.buffer_position(),
            reason: e.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ParseError::Malformed {
                position: reader.buffer_position(),
                reason: e.to_string(),
            })?
            .into_owned();
        attributes.insert(key, value);
    }

    Ok(XmlElement::new(name, attributes))
}

fn attach(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, element: XmlElement) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else {
        *root = Some(element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_document() {
        let root = parse_document("<SHOP><SHOPITEM id=\"1\"><CODE>A1</CODE></SHOPITEM></SHOP>")
            .unwrap();
        assert_eq!(root.name, "SHOP");
        let item = root.child("SHOPITEM").unwrap();
        assert_eq!(item.attr("id"), "1");
        assert_eq!(item.child_text("CODE"), "A1");
    }

    #[test]
    fn strips_leading_bom() {
        let root = parse_document("\u{feff}<SHOP/>").unwrap();
        assert_eq!(root.name, "SHOP");
    }

    #[test]
    fn absent_child_yields_empty_text() {
        let root = parse_document("<SHOP><SHOPITEM/></SHOP>").unwrap();
        let item = root.child("SHOPITEM").unwrap();
        assert_eq!(item.child_text("NAME"), "");
        assert!(item.child("NAME").is_none());
    }

    #[test]
    fn cdata_content_is_captured() {
        let root =
            parse_document("<SHOP><DESC><![CDATA[Tea <b>blend</b>]]></DESC></SHOP>").unwrap();
        assert_eq!(root.child_text("DESC"), "Tea <b>blend</b>");
    }

    #[test]
    fn descendants_searches_any_depth() {
        let root = parse_document(
            "<SHOP><GROUP><SHOPITEM><CODE>A</CODE></SHOPITEM></GROUP>\
             <SHOPITEM><CODE>B</CODE></SHOPITEM></SHOP>",
        )
        .unwrap();
        let items = root.descendants("SHOPITEM");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].child_text("CODE"), "A");
        assert_eq!(items[1].child_text("CODE"), "B");
    }

    #[test]
    fn entity_references_are_unescaped() {
        let root = parse_document("<SHOP><NAME>Tea &amp; Herbs</NAME></SHOP>").unwrap();
        assert_eq!(root.child_text("NAME"), "Tea & Herbs");
    }

    #[test]
    fn truncated_document_fails() {
        let result = parse_document("<SHOP><SHOPITEM><CODE>A1</CODE>");
        assert!(result.is_err(), "expected a parse error, got: {result:?}");
    }

    #[test]
    fn mismatched_tags_fail() {
        let result = parse_document("<SHOP><A></B></SHOP>");
        assert!(matches!(result, Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn empty_input_has_no_root() {
        assert!(matches!(parse_document(""), Err(ParseError::NoRoot)));
        assert!(matches!(
            parse_document("<?xml version=\"1.0\"?>"),
            Err(ParseError::NoRoot)
        ));
    }

    #[test]
    fn second_root_element_is_rejected() {
        let result = parse_document("<SHOP/><SHOP/>");
        assert!(matches!(result, Err(ParseError::TrailingContent { .. })));
    }

    #[test]
    fn xml_declaration_is_ignored() {
        let root = parse_document("<?xml version=\"1.0\" encoding=\"UTF-8\"?><SHOP/>").unwrap();
        assert_eq!(root.name, "SHOP");
    }
}
