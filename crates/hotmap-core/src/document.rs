//! Document module - a small element tree over quick-xml.
//!
//! Descriptors are tiny compared to what they describe, so we read
//! the whole file into an owned tree and let the mapping and wiring
//! models walk it. DTDs are recorded but never fetched or validated.

use crate::error::{DescriptorError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::Path;

/// A parsed descriptor document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Raw content of the `<!DOCTYPE ...>` declaration, if present.
    pub doctype: Option<String>,

    /// The single root element.
    pub root: Element,
}

/// One XML element with its attributes and children, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// A child of an element. Whitespace-only text never becomes a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Document {
    /// Reads and parses a descriptor from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| DescriptorError::io(path, e))?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parses descriptor text. `origin` only shows up in error messages.
    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut doctype = None;

        loop {
            match reader.read_event() {
                Ok(Event::DocType(decl)) => {
                    doctype = Some(String::from_utf8_lossy(&decl).trim().to_string());
                }
                Ok(Event::Start(start)) => {
                    stack.push(open_element(&start, origin)?);
                }
                Ok(Event::Empty(start)) => {
                    let element = open_element(&start, origin)?;
                    attach(&mut stack, &mut root, element, origin)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| DescriptorError::xml(origin, "unexpected end tag"))?;
                    attach(&mut stack, &mut root, element, origin)?;
                }
                Ok(Event::Text(text)) => {
                    let text = text.unescape().map_err(|e| DescriptorError::xml(origin, e))?;
                    push_text(&mut stack, &text);
                }
                Ok(Event::CData(data)) => {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    push_text(&mut stack, &text);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(DescriptorError::xml(
                        origin,
                        format!("at byte {}: {}", reader.buffer_position(), e),
                    ));
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(DescriptorError::xml(
                origin,
                format!("element <{}> is never closed", open.name),
            ));
        }

        let root = root.ok_or_else(|| DescriptorError::xml(origin, "document has no root element"))?;
        Ok(Self { doctype, root })
    }
}

fn open_element(start: &BytesStart<'_>, origin: &str) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| DescriptorError::xml(origin, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| DescriptorError::xml(origin, e))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    origin: &str,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(element));
        return Ok(());
    }

    if root.is_some() {
        return Err(DescriptorError::xml(origin, "multiple root elements"));
    }
    *root = Some(element);
    Ok(())
}

fn push_text(stack: &mut [Element], text: &str) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    // Text outside the root element carries no meaning for us.
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Text(trimmed.to_string()));
    }
}

impl Element {
    /// Returns the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns an attribute only when it has non-blank content.
    pub fn non_blank_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Iterates over child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Iterates over child elements whose name is one of `names`.
    pub fn elements_named<'a>(&'a self, names: &'a [&'a str]) -> impl Iterator<Item = &'a Element> {
        self.elements()
            .filter(move |element| names.contains(&element.name.as_str()))
    }

    /// Returns the first child element with the given name.
    pub fn first_element(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    /// All descendant text, whitespace-collapsed into single spaces.
    pub fn text(&self) -> String {
        let mut parts = Vec::new();
        collect_text(self, &mut parts);
        parts
            .iter()
            .flat_map(|part| part.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn collect_text<'a>(element: &'a Element, parts: &mut Vec<&'a str>) {
    for child in &element.children {
        match child {
            Node::Text(text) => parts.push(text),
            Node::Element(nested) => collect_text(nested, parts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const MAPPER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE mapper PUBLIC "-//mybatis.org//DTD Mapper 3.0//EN" "http://mybatis.org/dtd/mybatis-3-mapper.dtd">
<mapper namespace="app.UserMapper">
    <select id="findAll" resultType="User">
        SELECT * FROM users WHERE age &gt; 18
    </select>
    <sql id="cols"><![CDATA[ id, name ]]></sql>
</mapper>"#;

    #[test]
    fn test_parse_doctype_and_root() {
        let doc = Document::parse(MAPPER, "inline").unwrap();
        assert!(doc.doctype.as_deref().unwrap().starts_with("mapper PUBLIC"));
        assert_eq!(doc.root.name, "mapper");
        assert_eq!(doc.root.attr("namespace"), Some("app.UserMapper"));
        assert_eq!(doc.root.elements().count(), 2);
    }

    #[test]
    fn test_text_is_unescaped_and_collapsed() {
        let doc = Document::parse(MAPPER, "inline").unwrap();
        let select = doc.root.first_element("select").unwrap();
        assert_eq!(select.text(), "SELECT * FROM users WHERE age > 18");

        let sql = doc.root.first_element("sql").unwrap();
        assert_eq!(sql.text(), "id, name");
    }

    #[test]
    fn test_mismatched_end_tag_is_an_error() {
        let result = Document::parse("<mapper><select></mapper>", "broken");
        assert!(matches!(result, Err(DescriptorError::Xml { .. })));
    }

    #[test]
    fn test_unclosed_root_is_an_error() {
        let result = Document::parse("<mapper namespace=\"a\"><sql id=\"x\"/>", "broken");
        assert!(matches!(result, Err(DescriptorError::Xml { .. })));
    }

    #[test]
    fn test_empty_input_has_no_root() {
        assert!(Document::parse("   ", "empty").is_err());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let result = Document::read(&dir.path().join("missing.xml"));
        assert!(matches!(result, Err(DescriptorError::Io { .. })));
    }

    #[test]
    fn test_read_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("UserMapper.xml");
        fs::write(&path, MAPPER).unwrap();

        let doc = Document::read(&path).unwrap();
        assert_eq!(doc.root.name, "mapper");
    }

    #[test]
    fn test_non_blank_attr() {
        let doc = Document::parse(r#"<beans><bean id="  " class="x.Y"/></beans>"#, "inline").unwrap();
        let bean = doc.root.first_element("bean").unwrap();
        assert_eq!(bean.non_blank_attr("id"), None);
        assert_eq!(bean.non_blank_attr("class"), Some("x.Y"));
    }
}
