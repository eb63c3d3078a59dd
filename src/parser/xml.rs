use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use thiserror::Error;

/// Prefix under which element attributes are stored on a node
pub const ATTRIBUTE_PREFIX: &str = "attr_prefix_";

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("malformed markup: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed markup: <{0}> is never closed")]
    Unclosed(String),

    #[error("malformed markup: no root element")]
    Empty,
}

/// Element of an attributed node tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    /// Attributes keyed as `attr_prefix_<name>`
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn from_start(start: &BytesStart) -> Result<Self, MarkupError> {
        let mut node = XmlNode {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Default::default()
        };

        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref());
            let value = attr.unescape_value()?;
            node.attributes
                .insert(format!("{}{}", ATTRIBUTE_PREFIX, key), value.into_owned());
        }

        Ok(node)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&format!("{}{}", ATTRIBUTE_PREFIX, name))
            .map(String::as_str)
    }
}

/// Parse markup into a tree rooted at its first top-level element
pub fn parse_markup(markup: &str) -> Result<XmlNode, MarkupError> {
    let mut reader = Reader::from_str(markup);
    reader.trim_text(true);

    let mut open: Vec<XmlNode> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => open.push(XmlNode::from_start(e)?),
            Event::Empty(ref e) => {
                let node = XmlNode::from_start(e)?;
                attach(&mut open, &mut root, node);
            }
            Event::End(_) => {
                // end tag names are checked by the reader
                if let Some(node) = open.pop() {
                    attach(&mut open, &mut root, node);
                }
            }
            Event::Text(ref t) => {
                if let Some(parent) = open.last_mut() {
                    parent.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(ref c) => {
                if let Some(parent) = open.last_mut() {
                    parent.text.push_str(&String::from_utf8_lossy(c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(node) = open.pop() {
        return Err(MarkupError::Unclosed(node.name));
    }
    root.ok_or(MarkupError::Empty)
}

fn attach(open: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    match open.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attributes_with_prefix() {
        let node = parse_markup(r#"<steps id="0" last="2"><step id="2" type="ActionStep"/></steps>"#)
            .unwrap();
        assert_eq!(node.name, "steps");
        assert_eq!(node.attributes["attr_prefix_last"], "2");
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].attribute("type"), Some("ActionStep"));
    }

    #[test]
    fn test_parse_decodes_text_entities() {
        let node = parse_markup(
            r#"<step id="2"><parameterizedString isformatted="true">&lt;DIV&gt;Open app&lt;/DIV&gt;</parameterizedString></step>"#,
        )
        .unwrap();
        assert_eq!(node.children[0].text, "<DIV>Open app</DIV>");
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        assert!(parse_markup(r#"<steps><step id="1"></steps>"#).is_err());
    }

    #[test]
    fn test_parse_rejects_unclosed_root() {
        assert!(parse_markup(r#"<steps id="0"><step id="1"/>"#).is_err());
    }

    #[test]
    fn test_parse_empty_markup() {
        assert!(matches!(parse_markup("   "), Err(MarkupError::Empty)));
    }
}
