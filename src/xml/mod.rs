//! Minimal XML tree used to marshal message envelopes.
//!
//! Envelopes map themselves to and from an [`XmlNode`] tree through the
//! [`XmlModel`] trait. Decoding looks children up by name, so element order
//! on the wire does not matter; names are case sensitive.

mod node;

pub use node::XmlNode;

use std::fmt;
use std::str::FromStr;

/// Error type for XML marshalling
#[derive(Debug, Clone, PartialEq)]
pub enum XmlError {
    Parse(String),
    Write(String),
    UnexpectedElement {
        expected: String,
        found: String,
    },
    MissingElement {
        parent: String,
        name: String,
    },
    MissingAttribute {
        element: String,
        name: String,
    },
    InvalidValue {
        element: String,
        name: String,
        value: String,
    },
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlError::Parse(msg) => write!(f, "XML parse error: {}", msg),
            XmlError::Write(msg) => write!(f, "XML write error: {}", msg),
            XmlError::UnexpectedElement { expected, found } => {
                write!(f, "Expected element <{}>, found <{}>", expected, found)
            }
            XmlError::MissingElement { parent, name } => {
                write!(f, "Element <{}> is missing required child <{}>", parent, name)
            }
            XmlError::MissingAttribute { element, name } => {
                write!(f, "Element <{}> is missing required attribute '{}'", element, name)
            }
            XmlError::InvalidValue { element, name, value } => {
                write!(f, "Invalid value {:?} for '{}' on <{}>", value, name, element)
            }
        }
    }
}

impl std::error::Error for XmlError {}

/// Types that marshal to and from an XML element.
pub trait XmlModel: Sized {
    /// Element tag name.
    const TAG: &'static str;

    fn to_node(&self) -> XmlNode;

    fn from_node(node: &XmlNode) -> Result<Self, XmlError>;

    /// Compact wire render, children in insertion order.
    fn render(&self) -> Result<String, XmlError> {
        self.to_node().render()
    }

    fn render_pretty(&self) -> Result<String, XmlError> {
        self.to_node().render_pretty()
    }

    /// Deterministic render used for equality.
    fn render_canonical(&self) -> Result<String, XmlError> {
        self.to_node().render_canonical()
    }

    fn from_xml(input: &str) -> Result<Self, XmlError> {
        let node = XmlNode::parse(input)?;
        Self::from_node(&node)
    }
}

/// Fail unless `node` carries the expected tag.
pub fn expect_tag(node: &XmlNode, tag: &str) -> Result<(), XmlError> {
    if node.name == tag {
        Ok(())
    } else {
        Err(XmlError::UnexpectedElement {
            expected: tag.to_string(),
            found: node.name.clone(),
        })
    }
}

/// Parse an optional attribute through `FromStr`.
pub fn parse_attr<T: FromStr>(node: &XmlNode, name: &str) -> Result<Option<T>, XmlError> {
    node.attr(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| XmlError::InvalidValue {
                element: node.name.clone(),
                name: name.to_string(),
                value: raw.to_string(),
            })
        })
        .transpose()
}

/// Parse the text of an optional child element through `FromStr`.
pub fn parse_child_text<T: FromStr>(node: &XmlNode, name: &str) -> Result<Option<T>, XmlError> {
    node.child_text(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| XmlError::InvalidValue {
                element: node.name.clone(),
                name: name.to_string(),
                value: raw.to_string(),
            })
        })
        .transpose()
}

/// Parse a boolean attribute the way the wire writes them.
pub fn parse_bool_attr(node: &XmlNode, name: &str) -> Result<Option<bool>, XmlError> {
    match node.attr(name) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Err(XmlError::InvalidValue {
                element: node.name.clone(),
                name: name.to_string(),
                value: raw.to_string(),
            }),
        },
    }
}

/// Decode every child of `container` that is tagged `T::TAG`.
pub fn decode_list<T: XmlModel>(container: Option<&XmlNode>) -> Result<Vec<T>, XmlError> {
    match container {
        Some(node) => node.children_named(T::TAG).map(T::from_node).collect(),
        None => Ok(Vec::new()),
    }
}

/// Wrap encoded items in a container element.
pub fn encode_list<'a, T, I>(tag: &str, items: I) -> XmlNode
where
    T: XmlModel + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut container = XmlNode::new(tag);
    for item in items {
        container.push(item.to_node());
    }
    container
}
