//! The element tree produced by the binary XML decoder.
//!
//! The tree keeps what is needed to reproduce the XML text: namespace-qualified element and
//! attribute names, resolved attribute values and child order. Namespace declarations are
//! kept as ordinary `xmlns:prefix` attributes of the element that opened them, so a tree
//! decoded from binary XML and one parsed from the equivalent text compare equal.

use std::io::Cursor;

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, Event},
    Reader, Writer,
};

use crate::{error::xml_error, Result};

/// Namespace of the `android:` attributes.
pub const ANDROID_NAMESPACE: &str = "http://schemas.android.com/apk/res/android";

const XMLNS: &str = "xmlns";

/// One attribute with its value rendered as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Local name
    pub name: String,
    /// Namespace prefix, `xmlns` for namespace declarations
    pub prefix: Option<String>,
    /// Namespace URI the prefix is bound to
    pub namespace_uri: Option<String>,
    /// Rendered value
    pub value: String,
}

impl XmlAttribute {
    /// `prefix:name`, or `name` without a prefix.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.name)
    }

    /// Returns `true` for `xmlns:prefix` declarations.
    #[must_use]
    pub fn is_namespace_declaration(&self) -> bool {
        self.prefix.as_deref() == Some(XMLNS)
    }
}

/// One element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    /// Local name
    pub name: String,
    /// Namespace prefix
    pub prefix: Option<String>,
    /// Namespace URI
    pub namespace_uri: Option<String>,
    /// Attributes in document order, namespace declarations first
    pub attributes: Vec<XmlAttribute>,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Creates an element without namespace.
    #[must_use]
    pub fn new(name: &str) -> Self {
        XmlElement {
            name: name.to_string(),
            ..XmlElement::default()
        }
    }

    /// `prefix:name`, or `name` without a prefix.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.name)
    }

    /// Value of the attribute `name` that has no namespace.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.namespace_uri.is_none() && attr.prefix.is_none() && attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Value of the attribute `name` in namespace `uri`.
    #[must_use]
    pub fn attribute_ns(&self, uri: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.namespace_uri.as_deref() == Some(uri) && attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Value of `android:name`-style attributes.
    #[must_use]
    pub fn android_attribute(&self, name: &str) -> Option<&str> {
        self.attribute_ns(ANDROID_NAMESPACE, name)
    }

    /// Children with local name `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// First child with local name `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    fn write(&self, writer: &mut Writer<Cursor<Vec<u8>>>) -> Result<()> {
        let name = self.qualified_name();
        let mut start = BytesStart::new(name.as_str());
        for attr in &self.attributes {
            let key = attr.qualified_name();
            start.push_attribute((key.as_str(), attr.value.as_str()));
        }

        if self.children.is_empty() {
            writer
                .write_event(Event::Empty(start))
                .map_err(xml_error)?;
            return Ok(());
        }

        writer
            .write_event(Event::Start(start))
            .map_err(xml_error)?;
        for child in &self.children {
            child.write(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))
            .map_err(xml_error)?;
        Ok(())
    }
}

/// A decoded XML document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlDocument {
    /// Top-level elements; well-formed documents have exactly one
    pub roots: Vec<XmlElement>,
}

impl XmlDocument {
    /// The first top-level element.
    #[must_use]
    pub fn root(&self) -> Option<&XmlElement> {
        self.roots.first()
    }

    /// Decodes binary XML.
    ///
    /// # Errors
    /// See [`crate::axml::parse`].
    pub fn from_axml(data: &[u8]) -> Result<Self> {
        super::parse(data)
    }

    /// Decodes binary XML, or plain text XML when `data` does not start like binary XML.
    ///
    /// # Errors
    /// Returns the binary decoder's errors, or [`crate::Error::XmlError`] for text that is
    /// neither valid UTF-8 nor well-formed XML.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if super::is_axml(data) {
            return Self::from_axml(data);
        }

        log::debug!("Input is not binary XML, parsing it as text");
        let text = std::str::from_utf8(data).map_err(xml_error)?;
        Self::parse_text(text)
    }

    /// Parses plain text XML into the same tree shape the binary decoder produces.
    ///
    /// Comments, processing instructions and text content are dropped.
    ///
    /// # Errors
    /// Returns [`crate::Error::XmlError`] for malformed input.
    pub fn parse_text(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut document = XmlDocument::default();
        let mut stack: Vec<XmlElement> = Vec::new();
        // prefix bindings per open element
        let mut scopes: Vec<Vec<(String, String)>> = Vec::new();

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(start) => {
                    let (element, bindings) = Self::text_element(&start, &scopes)?;
                    scopes.push(bindings);
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let (element, _) = Self::text_element(&start, &scopes)?;
                    attach(&mut document, &mut stack, element);
                }
                Event::End(_) => {
                    scopes.pop();
                    if let Some(element) = stack.pop() {
                        attach(&mut document, &mut stack, element);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(xml_error(format!("{} unclosed elements", stack.len())));
        }
        Ok(document)
    }

    fn text_element(
        start: &BytesStart,
        scopes: &[Vec<(String, String)>],
    ) -> Result<(XmlElement, Vec<(String, String)>)> {
        let mut bindings = Vec::new();
        let mut raw_attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_error)?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(xml_error)?
                .to_string();
            let value = attr.unescape_value().map_err(xml_error)?.into_owned();
            let (prefix, name) = split_name(&key);
            if prefix == Some(XMLNS) {
                bindings.push((name.to_string(), value.clone()));
            }
            raw_attributes.push((key, value));
        }

        let resolve = |prefix: &str| -> Option<String> {
            bindings
                .iter()
                .rev()
                .chain(scopes.iter().rev().flat_map(|scope| scope.iter().rev()))
                .find(|(bound, _)| bound == prefix)
                .map(|(_, uri)| uri.clone())
        };

        let qualified = std::str::from_utf8(start.name().as_ref())
            .map_err(xml_error)?
            .to_string();
        let (prefix, name) = split_name(&qualified);
        let mut element = XmlElement {
            name: name.to_string(),
            prefix: prefix.map(str::to_string),
            namespace_uri: prefix.and_then(resolve),
            ..XmlElement::default()
        };

        for (key, value) in raw_attributes {
            let (prefix, name) = split_name(&key);
            let namespace_uri = match prefix {
                Some(XMLNS) | None => None,
                Some(prefix) => resolve(prefix),
            };
            element.attributes.push(XmlAttribute {
                name: name.to_string(),
                prefix: prefix.map(str::to_string),
                namespace_uri,
                value,
            });
        }

        Ok((element, bindings))
    }

    /// Serialises the tree as indented XML text with a `1.0`/`utf-8` declaration.
    ///
    /// # Errors
    /// Returns [`crate::Error::XmlError`] if writing fails.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_error)?;
        for root in &self.roots {
            root.write(&mut writer)?;
        }

        String::from_utf8(writer.into_inner().into_inner()).map_err(xml_error)
    }
}

/// Appends a finished element to its parent, or to the document roots.
pub(crate) fn attach(document: &mut XmlDocument, stack: &mut [XmlElement], element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => document.roots.push(element),
    }
}

fn split_name(qualified: &str) -> (Option<&str>, &str) {
    match qualified.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, qualified),
    }
}

fn qualify(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{name}"),
        _ => name.to_string(),
    }
}
