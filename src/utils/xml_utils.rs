//! XML utility functions
//!
//! Small helpers over quick-xml for the descriptor and sub-product header
//! files: an indenting element builder and a reader producing a plain
//! element tree.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::errors::{FexError, FexResult};

/// Incremental XML document builder
pub struct XmlBuilder {
    writer: Writer<Vec<u8>>,
    location: String,
}

impl XmlBuilder {
    /// Start a document; `location` names it in error messages
    pub fn new(location: &str) -> FexResult<Self> {
        let mut builder = XmlBuilder {
            writer: Writer::new_with_indent(Vec::new(), b' ', 4),
            location: location.to_string(),
        };
        builder.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(builder)
    }

    fn write(&mut self, event: Event<'_>) -> FexResult<()> {
        self.writer
            .write_event(event)
            .map_err(|e| FexError::format(self.location.clone(), e.to_string()))
    }

    /// Open an element
    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> FexResult<()> {
        let mut start = BytesStart::new(name);
        for attr in attributes {
            start.push_attribute(*attr);
        }
        self.write(Event::Start(start))
    }

    /// Close an element
    pub fn end(&mut self, name: &str) -> FexResult<()> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// Write an element holding only text
    pub fn text_element(&mut self, name: &str, value: &str) -> FexResult<()> {
        self.write(Event::Start(BytesStart::new(name)))?;
        self.write(Event::Text(BytesText::new(value)))?;
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// Write an element with attributes and no content
    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> FexResult<()> {
        let mut start = BytesStart::new(name);
        for attr in attributes {
            start.push_attribute(*attr);
        }
        self.write(Event::Empty(start))
    }

    /// Finish the document and return its text
    pub fn finish(self) -> FexResult<String> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|_| FexError::format(self.location, "Invalid UTF-8 in XML"))
    }
}

/// Parsed XML element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Attribute value by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child with the given name
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }
}

fn element_from(start: &BytesStart<'_>, location: &str) -> FexResult<XmlElement> {
    let mut element = XmlElement {
        name: String::from_utf8_lossy(start.name().as_ref()).to_string(),
        ..XmlElement::default()
    };
    for attr in start.attributes() {
        let attr = attr.map_err(|e| FexError::format(location, e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value()
            .map_err(|e| FexError::format(location, e.to_string()))?
            .to_string();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Parse a document into its root element
///
/// # Arguments
/// * `xml` - Document text
/// * `location` - Name of the document, used in error messages
pub fn parse_xml(xml: &str, location: &str) -> FexResult<XmlElement> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => stack.push(element_from(e, location)?),
            Ok(Event::Empty(ref e)) => {
                let element = element_from(e, location)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(|e| FexError::format(location, e.to_string()))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::End(_)) => {
                let element = stack.pop()
                    .ok_or_else(|| FexError::format(location, "Unbalanced closing tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(FexError::format(location, format!(
                "XML error at position {}: {}", reader.buffer_position(), e))),
        }
    }

    if !stack.is_empty() {
        return Err(FexError::format(location, "Unexpected end of document"));
    }
    root.ok_or_else(|| FexError::format(location, "Document has no root element"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_output_parses_back() {
        let mut xml = XmlBuilder::new("test").unwrap();
        xml.start("root", &[("version", "2")]).unwrap();
        xml.text_element("name", "a < b").unwrap();
        xml.empty("item", &[("id", "1")]).unwrap();
        xml.empty("item", &[("id", "2")]).unwrap();
        xml.end("root").unwrap();
        let text = xml.finish().unwrap();

        let root = parse_xml(&text, "test").unwrap();
        assert_eq!(root.name, "root");
        assert_eq!(root.attribute("version"), Some("2"));
        assert_eq!(root.child_text("name"), Some("a < b"));
        let ids: Vec<_> = root.children_named("item").filter_map(|i| i.attribute("id")).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn truncated_document_is_a_format_error() {
        let err = parse_xml("<root><name>x</name>", "broken.xml").unwrap_err();
        assert!(matches!(err, FexError::Format { .. }));
        assert!(err.to_string().contains("broken.xml"));
    }
}
