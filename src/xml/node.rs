use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::io::Write;

use super::XmlError;

/// An XML element: attributes, optional text and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<XmlNode>,
    pub text: Option<String>,
    /// Emit `text` as a CDATA section.
    pub cdata: bool,
}

fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

fn write_err(e: impl Display) -> XmlError {
    XmlError::Write(e.to_string())
}

fn parse_err(e: impl Display) -> XmlError {
    XmlError::Parse(e.to_string())
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.attributes.insert(name.into(), value.to_string());
        self
    }

    /// Set the attribute only when a value is present.
    pub fn with_opt_attr<V: Display>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with_attr(name, v),
            None => self,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_cdata(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self.cdata = true;
        self
    }

    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Add a `<name>text</name>` child when a value is present.
    pub fn with_opt_text_child<V: Display>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with_child(XmlNode::new(name).with_text(v.to_string())),
            None => self,
        }
    }

    pub fn push(&mut self, child: XmlNode) {
        self.children.push(child);
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn required_attr(&self, name: &str) -> Result<&str, XmlError> {
        self.attr(name).ok_or_else(|| XmlError::MissingAttribute {
            element: self.name.clone(),
            name: name.to_string(),
        })
    }

    /// First child with the given tag.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn required_child(&self, name: &str) -> Result<&XmlNode, XmlError> {
        self.child(name).ok_or_else(|| XmlError::MissingElement {
            parent: self.name.clone(),
            name: name.to_string(),
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text content of the element, empty if none.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(XmlNode::text)
    }

    pub fn required_child_text(&self, name: &str) -> Result<&str, XmlError> {
        self.required_child(name).map(XmlNode::text)
    }

    /// Parse a document and return its root element.
    pub fn parse(input: &str) -> Result<XmlNode, XmlError> {
        let mut reader = Reader::from_str(input);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event().map_err(parse_err)? {
                Event::Start(start) => stack.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let node = Self::from_start(&start)?;
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    let mut node = stack
                        .pop()
                        .ok_or_else(|| XmlError::Parse("unbalanced closing tag".to_string()))?;
                    // Indentation between child elements is layout, not content.
                    if !node.children.is_empty() && node.text.as_deref().is_some_and(is_blank) {
                        node.text = None;
                    }
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        let text = text.unescape().map_err(parse_err)?;
                        if !(top.cdata && is_blank(&text)) {
                            top.text.get_or_insert_with(String::new).push_str(&text);
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        let text = String::from_utf8(data.into_inner().into_owned()).map_err(parse_err)?;
                        if !top.cdata && top.text.as_deref().is_some_and(is_blank) {
                            top.text = None;
                        }
                        top.text.get_or_insert_with(String::new).push_str(&text);
                        top.cdata = true;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::Parse(format!("element <{}> is never closed", open.name)));
        }
        root.ok_or_else(|| XmlError::Parse("document has no root element".to_string()))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<XmlNode, XmlError> {
        let qname = start.name();
        let name = std::str::from_utf8(qname.as_ref()).map_err(parse_err)?;
        let mut node = XmlNode::new(name);
        for attr in start.attributes() {
            let attr = attr.map_err(parse_err)?;
            let key = std::str::from_utf8(attr.key.as_ref()).map_err(parse_err)?.to_string();
            let value = attr.unescape_value().map_err(parse_err)?.into_owned();
            node.attributes.insert(key, value);
        }
        Ok(node)
    }

    fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<(), XmlError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None if root.is_none() => *root = Some(node),
            None => return Err(XmlError::Parse("document has more than one root element".to_string())),
        }
        Ok(())
    }

    /// Compact render, children in insertion order.
    pub fn render(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(write_err)
    }

    /// Indented render for humans.
    pub fn render_pretty(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write_to(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(write_err)
    }

    /// Compact render of [`XmlNode::canonical`].
    pub fn render_canonical(&self) -> Result<String, XmlError> {
        self.canonical()?.render()
    }

    /// Copy of the tree with every child list sorted by its canonical
    /// render, so that sibling order does not affect the output.
    pub fn canonical(&self) -> Result<XmlNode, XmlError> {
        let mut keyed = Vec::with_capacity(self.children.len());
        for child in &self.children {
            let child = child.canonical()?;
            keyed.push((child.render()?, child));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(XmlNode {
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            children: keyed.into_iter().map(|(_, child)| child).collect(),
            text: self.text.clone(),
            cdata: self.cdata,
        })
    }

    fn write_to<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.text.is_none() && self.children.is_empty() {
            return writer.write_event(Event::Empty(start)).map_err(write_err);
        }

        writer.write_event(Event::Start(start)).map_err(write_err)?;
        if let Some(text) = &self.text {
            // A CDATA section cannot carry its own terminator.
            let event = if self.cdata && !text.contains("]]>") {
                Event::CData(BytesCData::new(text.as_str()))
            } else {
                Event::Text(BytesText::new(text))
            };
            writer.write_event(event).map_err(write_err)?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_document() {
        let xml = r#"<?xml version="1.0"?>
            <Entity Type="maltego.Person">
                <Value>Alice &amp; Bob</Value>
                <DisplayInformation><Label Name="bio"><![CDATA[<b>hi</b>]]></Label></DisplayInformation>
                <Weight/>
            </Entity>"#;
        let node = XmlNode::parse(xml).unwrap();

        assert_eq!(node.name, "Entity");
        assert_eq!(node.attr("Type"), Some("maltego.Person"));
        assert_eq!(node.child_text("Value"), Some("Alice & Bob"));

        let label = node.child("DisplayInformation").and_then(|d| d.child("Label")).unwrap();
        assert_eq!(label.text(), "<b>hi</b>");
        assert!(label.cdata);
        assert_eq!(node.child_text("Weight"), Some(""));
    }

    #[test]
    fn test_parse_keeps_significant_whitespace() {
        let xml = "<Entity>\n  <Value>  padded  </Value>\n  <Label>\n    <![CDATA[ x ]]>\n  </Label>\n  <Empty>   </Empty>\n</Entity>";
        let node = XmlNode::parse(xml).unwrap();

        assert_eq!(node.text, None);
        assert_eq!(node.child_text("Value"), Some("  padded  "));
        assert_eq!(node.child_text("Label"), Some(" x "));
        assert_eq!(node.child_text("Empty"), Some("   "));
    }

    #[test]
    fn test_render_escapes_and_keeps_cdata() {
        let node = XmlNode::new("UIMessage")
            .with_attr("MessageType", "Inform")
            .with_text("a < b")
            .with_child(XmlNode::new("Label").with_cdata("<i>x</i>"));
        let out = node.render().unwrap();
        assert_eq!(
            out,
            r#"<UIMessage MessageType="Inform">a &lt; b<Label><![CDATA[<i>x</i>]]></Label></UIMessage>"#
        );
    }

    #[test]
    fn test_canonical_ignores_sibling_order() {
        let a = XmlNode::new("Fields")
            .with_child(XmlNode::new("Field").with_attr("Name", "a"))
            .with_child(XmlNode::new("Field").with_attr("Name", "b"));
        let b = XmlNode::new("Fields")
            .with_child(XmlNode::new("Field").with_attr("Name", "b"))
            .with_child(XmlNode::new("Field").with_attr("Name", "a"));

        assert_ne!(a.render().unwrap(), b.render().unwrap());
        assert_eq!(a.render_canonical().unwrap(), b.render_canonical().unwrap());
    }

    #[test]
    fn test_parse_then_render_round_trip() {
        let node = XmlNode::new("Limits").with_attr("SoftLimit", 12).with_attr("HardLimit", 30);
        let parsed = XmlNode::parse(&node.render().unwrap()).unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn test_parse_rejects_unclosed() {
        assert!(matches!(XmlNode::parse("<Entity><Value>x</Value>"), Err(XmlError::Parse(_))));
        assert!(XmlNode::parse("").is_err());
    }
}
