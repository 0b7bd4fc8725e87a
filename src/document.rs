//! Archive document tree
//!
//! Parses the XML interchange document into a small owned element tree
//! that the loader walks section by section. Only the pieces the loader
//! needs are kept: qualified names, attributes, text, and comments (the
//! equipment availability marker lives in a comment).

use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{ArchiveError, Result};

/// Attribute carrying the polymorphic type tag
pub const TYPE_ATTRIBUTE: &str = "xsi:type";

/// Attribute carrying an entity's ID
pub const ID_ATTRIBUTE: &str = "id";

/// A parsed archive document
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    root: Element,
}

impl Document {
    /// Parse a document from its text
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let source = text.into();
        let root = parse_tree(&source)?;
        Ok(Self { source, root })
    }

    /// Read and parse a document from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(fs::read_to_string(path)?)
    }

    /// The raw document text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The root element
    pub fn root(&self) -> &Element {
        &self.root
    }
}

/// A node inside an element
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

/// An XML element with its attributes and children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    /// Create an empty element (mostly useful for building fixtures)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Qualified name, including any namespace prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without namespace prefix
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The namespaced type tag, if the element carries one
    pub fn type_tag(&self) -> Option<&str> {
        self.attribute(TYPE_ATTRIBUTE)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(k, _)| k.ends_with(":type"))
                    .map(|(_, v)| v.as_str())
            })
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// The entity ID; its absence is a structural error
    pub fn id(&self) -> Result<&str> {
        self.attribute(ID_ATTRIBUTE)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ArchiveError::structural(self.local_name(), "element has no id attribute")
            })
    }

    /// Human-readable description for log lines and errors
    pub fn describe(&self) -> String {
        match self.attribute(ID_ATTRIBUTE) {
            Some(id) => format!("{} '{}'", self.local_name(), id),
            None => self.local_name().to_string(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    /// Direct child elements
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Direct child elements with the given local name
    pub fn children_named<'a, 'b>(&'a self, local: &'b str) -> impl Iterator<Item = &'a Element> + 'b
    where
        'a: 'b,
    {
        self.elements().filter(move |e| e.local_name() == local)
    }

    pub fn child(&self, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.local_name() == local)
    }

    /// Concatenated, trimmed text content
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                out.push_str(t);
            }
        }
        out.trim().to_string()
    }

    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.children.iter().filter_map(|n| match n {
            Node::Comment(c) => Some(c.as_str()),
            _ => None,
        })
    }

    pub fn push_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((key.into(), value.into()));
    }

    pub fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    // --- Field extraction ---

    /// Text of an optional child, `None` when absent or blank
    pub fn optional_text(&self, field: &str) -> Option<String> {
        self.child(field).map(Element::text).filter(|t| !t.is_empty())
    }

    pub fn required_text(&self, field: &str) -> Result<String> {
        self.optional_text(field)
            .ok_or_else(|| self.missing(field))
    }

    /// Texts of every child with the given name
    pub fn texts(&self, field: &str) -> Vec<String> {
        self.children_named(field)
            .map(Element::text)
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn parse_optional<T>(&self, field: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.optional_text(field) {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|e| self.invalid(field, &raw, e)),
            None => Ok(None),
        }
    }

    pub fn parse_required<T>(&self, field: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.parse_optional(field)?
            .ok_or_else(|| self.missing(field))
    }

    /// Boolean child accepting `true`/`false`/`1`/`0`
    pub fn optional_bool(&self, field: &str) -> Result<Option<bool>> {
        match self.optional_text(field).as_deref() {
            None => Ok(None),
            Some("true") | Some("1") => Ok(Some(true)),
            Some("false") | Some("0") => Ok(Some(false)),
            Some(other) => Err(self.invalid(field, other, "expected a boolean")),
        }
    }

    pub fn optional_timestamp(&self, field: &str) -> Result<Option<DateTime<FixedOffset>>> {
        match self.optional_text(field) {
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(Some)
                .map_err(|e| self.invalid(field, &raw, e)),
            None => Ok(None),
        }
    }

    pub fn required_timestamp(&self, field: &str) -> Result<DateTime<FixedOffset>> {
        self.optional_timestamp(field)?
            .ok_or_else(|| self.missing(field))
    }

    pub fn missing(&self, field: &str) -> ArchiveError {
        ArchiveError::MissingField {
            element: self.describe(),
            field: field.to_string(),
        }
    }

    pub fn invalid(&self, field: &str, value: &str, message: impl Display) -> ArchiveError {
        ArchiveError::InvalidValue {
            element: self.describe(),
            field: field.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        }
    }
}

fn start_element(start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.push_attribute(key, value);
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(ArchiveError::structural(
            element.local_name(),
            "document has more than one root element",
        )),
    }
}

fn parse_tree(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(start_element(&start)?),
            Event::Empty(start) => {
                let element = start_element(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                // quick-xml has already matched the end tag against the open one
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element)?;
                }
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.push(Node::Text(text.unescape()?.into_owned()));
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.push(Node::Text(String::from_utf8_lossy(&data).into_owned()));
                }
            }
            Event::Comment(comment) => {
                if let Some(top) = stack.last_mut() {
                    top.push(Node::Comment(String::from_utf8_lossy(&comment).into_owned()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ArchiveError::structural(open.local_name(), "element is never closed"));
    }
    root.ok_or_else(|| ArchiveError::structural("document", "document has no root element"))
}
