//! Building blocks shared by the message envelopes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::xml::{expect_tag, XmlError, XmlModel, XmlNode};

/// Matching rules for comparison.
///
/// Controls whether a field takes part when the client decides that two
/// entities are the same and should be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchingRule {
    #[default]
    Strict,
    Loose,
}

impl MatchingRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchingRule::Strict => "strict",
            MatchingRule::Loose => "loose",
        }
    }
}

impl fmt::Display for MatchingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchingRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(MatchingRule::Strict),
            "loose" => Ok(MatchingRule::Loose),
            other => Err(format!("unknown matching rule: {}", other)),
        }
    }
}

/// Input field of a transform request (`<Field Name="...">value</Field>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformField {
    pub name: String,
    pub value: Option<String>,
}

impl TransformField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

impl XmlModel for TransformField {
    const TAG: &'static str = "Field";

    fn to_node(&self) -> XmlNode {
        let node = XmlNode::new(Self::TAG).with_attr("Name", &self.name);
        match &self.value {
            Some(value) => node.with_text(value.as_str()),
            None => node,
        }
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        Ok(Self {
            name: node.required_attr("Name")?.to_string(),
            value: node.text.clone(),
        })
    }
}

/// A named, string-valued datum attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalField {
    pub name: String,
    pub display_name: Option<String>,
    pub matching_rule: MatchingRule,
    pub value: Option<String>,
}

impl AdditionalField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            matching_rule: MatchingRule::Strict,
            value: Some(value.into()),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_matching_rule(mut self, rule: MatchingRule) -> Self {
        self.matching_rule = rule;
        self
    }
}

impl XmlModel for AdditionalField {
    const TAG: &'static str = "Field";

    fn to_node(&self) -> XmlNode {
        let node = XmlNode::new(Self::TAG)
            .with_attr("Name", &self.name)
            .with_opt_attr("DisplayName", self.display_name.as_ref())
            .with_attr("MatchingRule", self.matching_rule);
        match &self.value {
            Some(value) => node.with_text(value.as_str()),
            None => node,
        }
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        let matching_rule = match node.attr("MatchingRule") {
            Some(raw) => raw.parse().map_err(|_| XmlError::InvalidValue {
                element: node.name.clone(),
                name: "MatchingRule".to_string(),
                value: raw.to_string(),
            })?,
            None => MatchingRule::Strict,
        };

        Ok(Self {
            name: node.required_attr("Name")?.to_string(),
            display_name: node.attr("DisplayName").map(str::to_string),
            matching_rule,
            value: node.text.clone(),
        })
    }
}

pub const DEFAULT_LABEL_KIND: &str = "text/text";

/// Display-only annotation of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Mime-like content type, `text/text` unless stated.
    pub kind: String,
    pub name: Option<String>,
    pub text: String,
}

impl Label {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: DEFAULT_LABEL_KIND.to_string(),
            name: Some(name.into()),
            text: text.into(),
        }
    }

    pub fn unnamed(text: impl Into<String>) -> Self {
        Self {
            kind: DEFAULT_LABEL_KIND.to_string(),
            name: None,
            text: text.into(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }
}

impl XmlModel for Label {
    const TAG: &'static str = "Label";

    fn to_node(&self) -> XmlNode {
        XmlNode::new(Self::TAG)
            .with_attr("Type", &self.kind)
            .with_opt_attr("Name", self.name.as_ref())
            .with_cdata(self.text.as_str())
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        Ok(Self {
            kind: node.attr("Type").unwrap_or(DEFAULT_LABEL_KIND).to_string(),
            name: node.attr("Name").map(str::to_string),
            text: node.text().to_string(),
        })
    }
}
