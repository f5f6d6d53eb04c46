//! Response payloads and their text encoding.
//!
//! The decoding format is chosen from the *request URL*: anything whose URL contains `json`
//! is decoded as JSON, everything else (xml, rss, atom) as XML. Cached text carries no tag;
//! its format is recovered from the first byte (`<` means XML).

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, escape::escape};
use serde_json::Value;

use crate::error::{FeedError, FeedResult};

/// Wire format of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Xml,
    Json,
}

impl Format {
    /// Format implied by a request URL.
    ///
    /// A plain substring match: `json` anywhere in the URL, query included, selects JSON.
    #[must_use]
    pub fn for_url(url: &str) -> Self {
        if url.contains("json") {
            Self::Json
        } else {
            Self::Xml
        }
    }

    /// Format of previously encoded payload text.
    #[must_use]
    pub fn sniff(text: &str) -> Self {
        if text.starts_with('<') {
            Self::Xml
        } else {
            Self::Json
        }
    }
}

/// A node inside an XML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An XML element with its attributes and children, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Attribute value by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element called `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// Concatenated direct text content.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }

    fn push_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write_to(out),
                XmlNode::Text(t) => out.push_str(&escape(t.as_str())),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// A decoded API response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Xml(XmlElement),
    Json(Value),
}

impl Payload {
    /// Decode `body` in the format implied by the request `url`.
    pub fn decode_for_url(url: &str, body: &[u8]) -> FeedResult<Self> {
        Self::decode(Format::for_url(url), body)
    }

    /// Decode cached text, recovering the format from its first byte.
    pub fn decode_cached(text: &str) -> FeedResult<Self> {
        Self::decode(Format::sniff(text), text.as_bytes())
    }

    /// Decode `body` as `format`.
    ///
    /// Malformed bodies and bodies that decode to nothing are rejected.
    pub fn decode(format: Format, body: &[u8]) -> FeedResult<Self> {
        let text = std::str::from_utf8(body).map_err(FeedError::invalid_response)?;
        if text.trim().is_empty() {
            return Err(FeedError::invalid_response("empty body"));
        }

        match format {
            Format::Json => {
                let value: Value = serde_json::from_str(text).map_err(FeedError::invalid_response)?;
                if is_falsy(&value) {
                    return Err(FeedError::invalid_response(format!(
                        "empty JSON document: {value}"
                    )));
                }
                Ok(Self::Json(value))
            }
            Format::Xml => {
                let root = parse_xml(text)?;
                if root.is_empty() {
                    return Err(FeedError::invalid_response(format!(
                        "empty XML element <{}>",
                        root.name
                    )));
                }
                Ok(Self::Xml(root))
            }
        }
    }

    /// Canonical text form, used for cache storage.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Xml(root) => {
                let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
                root.write_to(&mut out);
                out
            }
        }
    }

    #[must_use]
    pub const fn format(&self) -> Format {
        match self {
            Self::Xml(_) => Format::Xml,
            Self::Json(_) => Format::Json,
        }
    }

    /// Scalar field of the top-level record as text.
    ///
    /// `None` when the field is missing or empty.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<String> {
        let text = match self {
            Self::Xml(root) => root.child(name).map(XmlElement::text)?,
            Self::Json(value) => match value.get(name)? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            },
        };
        (!text.is_empty()).then_some(text)
    }

    /// Result list of a search response.
    ///
    /// JSON documents carry it under `results`; Atom feeds as `entry` elements.
    #[must_use]
    pub fn results(&self) -> Option<Vec<Self>> {
        match self {
            Self::Json(value) => value
                .get("results")?
                .as_array()
                .map(|items| items.iter().cloned().map(Self::Json).collect()),
            Self::Xml(root) => {
                let entries: Vec<Self> = root
                    .elements()
                    .filter(|e| e.name == "entry")
                    .cloned()
                    .map(Self::Xml)
                    .collect();
                (!entries.is_empty()).then_some(entries)
            }
        }
    }
}

/// Values a loosely-typed caller would treat as "nothing came back".
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Bool(true) | Value::Object(_) => false,
    }
}

fn parse_xml(text: &str) -> FeedResult<XmlElement> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event().map_err(FeedError::invalid_response)? {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => {
                let element = element_from(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| FeedError::invalid_response("unmatched end tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(raw) => {
                let text = raw.unescape().map_err(FeedError::invalid_response)?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(raw) => {
                let text = std::str::from_utf8(&raw).map_err(FeedError::invalid_response)?;
                push_text(&mut stack, text)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(FeedError::invalid_response(format!(
            "unclosed element <{}>",
            open.name
        )));
    }
    root.ok_or_else(|| FeedError::invalid_response("no root element"))
}

fn element_from(start: &BytesStart<'_>) -> FeedResult<XmlElement> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(FeedError::invalid_response)?
        .to_string();

    let mut element = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(FeedError::invalid_response)?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(FeedError::invalid_response)?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(FeedError::invalid_response)?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> FeedResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
    } else if root.is_some() {
        return Err(FeedError::invalid_response("multiple root elements"));
    } else {
        *root = Some(element);
    }
    Ok(())
}

/// Whitespace-only runs are layout, not content, and are dropped.
fn push_text(stack: &mut [XmlElement], text: &str) -> FeedResult<()> {
    if text.trim().is_empty() {
        return Ok(());
    }
    match stack.last_mut() {
        Some(parent) => {
            parent.push_text(text);
            Ok(())
        }
        None => Err(FeedError::invalid_response("text outside the root element")),
    }
}
