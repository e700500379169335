//! Transform exception envelope.

use std::fmt;

use crate::xml::{decode_list, encode_list, expect_tag, parse_attr, XmlError, XmlModel, XmlNode};

/// Error reported back to the client, optionally with a numeric code.
///
/// Transforms may return it directly; the runner keeps the code when it
/// builds the exception envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformException {
    pub code: Option<i64>,
    pub text: String,
}

impl TransformException {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            code: None,
            text: text.into(),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}

impl fmt::Display for TransformException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{}] {}", code, self.text),
            None => f.write_str(&self.text),
        }
    }
}

impl std::error::Error for TransformException {}

impl From<&str> for TransformException {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for TransformException {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl XmlModel for TransformException {
    const TAG: &'static str = "Exception";

    fn to_node(&self) -> XmlNode {
        XmlNode::new(Self::TAG)
            .with_opt_attr("code", self.code)
            .with_text(self.text.as_str())
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        Ok(Self {
            code: parse_attr(node, "code")?,
            text: node.text().to_string(),
        })
    }
}

/// Exceptions raised while running a transform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionMessage {
    pub exceptions: Vec<TransformException>,
}

impl ExceptionMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, exception: impl Into<TransformException>) {
        self.exceptions.push(exception.into());
    }

    /// Record an arbitrary error as a text-only exception.
    pub fn append_error<E: fmt::Display + ?Sized>(&mut self, error: &E) {
        self.exceptions.push(TransformException::new(error.to_string()));
    }
}

impl From<TransformException> for ExceptionMessage {
    fn from(exception: TransformException) -> Self {
        Self {
            exceptions: vec![exception],
        }
    }
}

impl XmlModel for ExceptionMessage {
    const TAG: &'static str = "MaltegoTransformExceptionMessage";

    fn to_node(&self) -> XmlNode {
        XmlNode::new(Self::TAG).with_child(encode_list("Exceptions", &self.exceptions))
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        Ok(Self {
            exceptions: decode_list(node.child("Exceptions"))?,
        })
    }
}
