//! Owned XML tree parsed with quick-xml, plus the XPath subset evaluator.

pub mod xpath;

use quick_xml::events::Event;
use quick_xml::Reader;

/// One XML element: name, attributes in document order, direct text, children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified element name as written.
    pub name: String,
    /// Attributes in document order, `xmlns` declarations included.
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text content, trimmed.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn named(name: String) -> Self {
        XmlElement {
            name,
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Looks up an attribute value by exact name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attributes without namespace declarations; comparison works on these.
    pub fn comparable_attributes(&self) -> impl Iterator<Item = &(String, String)> {
        self.attributes
            .iter()
            .filter(|(name, _)| name != "xmlns" && !name.starts_with("xmlns:"))
    }

    /// Child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }
}

/// Parses a complete XML document into its root element.
pub fn parse_document(input: &str) -> Result<XmlElement, String> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let element = element_from_start(&start)?;
                stack.push(element);
            }
            Ok(Event::Empty(start)) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                if let Some(current) = stack.last_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|error| format!("invalid xml text: {error}"))?;
                    current.text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::End(_)) => {
                let Some(mut element) = stack.pop() else {
                    return Err("unexpected closing tag".to_string());
                };
                element.text = element.text.trim().to_string();
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => return Err(format!("invalid xml: {error}")),
        }
    }

    if !stack.is_empty() {
        return Err("unexpected end of xml document".to_string());
    }
    root.ok_or_else(|| "xml document has no root element".to_string())
}

fn element_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<XmlElement, String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = XmlElement::named(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|error| format!("invalid xml attribute: {error}"))?;
        let name = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|error| format!("invalid xml attribute value: {error}"))?
            .into_owned();
        element.attributes.push((name, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut Vec<XmlElement>,
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), String> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err("xml document has multiple root elements".to_string());
    }
    *root = Some(element);
    Ok(())
}
