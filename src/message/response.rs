//! Transform response envelope.

use std::fmt;
use std::str::FromStr;

use crate::entity::Entity;
use crate::message::element::EntityElement;
use crate::xml::{decode_list, encode_list, expect_tag, XmlError, XmlModel, XmlNode};

/// Severity of a notification shown by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UIMessageType {
    FatalError,
    PartialError,
    #[default]
    Inform,
    Debug,
}

impl UIMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UIMessageType::FatalError => "FatalError",
            UIMessageType::PartialError => "PartialError",
            UIMessageType::Inform => "Inform",
            UIMessageType::Debug => "Debug",
        }
    }
}

impl fmt::Display for UIMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UIMessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FatalError" => Ok(UIMessageType::FatalError),
            "PartialError" => Ok(UIMessageType::PartialError),
            "Inform" => Ok(UIMessageType::Inform),
            "Debug" => Ok(UIMessageType::Debug),
            other => Err(format!("unknown message type: {}", other)),
        }
    }
}

/// Notification displayed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UIMessage {
    pub kind: UIMessageType,
    pub text: String,
}

impl UIMessage {
    pub fn new(kind: UIMessageType, text: impl Into<String>) -> Self {
        Self { kind, text: text.into() }
    }

    pub fn inform(text: impl Into<String>) -> Self {
        Self::new(UIMessageType::Inform, text)
    }
}

impl XmlModel for UIMessage {
    const TAG: &'static str = "UIMessage";

    fn to_node(&self) -> XmlNode {
        XmlNode::new(Self::TAG)
            .with_attr("MessageType", self.kind)
            .with_text(self.text.as_str())
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        let kind = match node.attr("MessageType") {
            Some(raw) => raw.parse().map_err(|_| XmlError::InvalidValue {
                element: node.name.clone(),
                name: "MessageType".to_string(),
                value: raw.to_string(),
            })?,
            None => UIMessageType::default(),
        };
        Ok(Self {
            kind,
            text: node.text().to_string(),
        })
    }
}

/// Anything a response can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseItem {
    Entity(EntityElement),
    Message(UIMessage),
}

impl From<Entity> for ResponseItem {
    fn from(entity: Entity) -> Self {
        ResponseItem::Entity(entity.into_element())
    }
}

impl From<&Entity> for ResponseItem {
    fn from(entity: &Entity) -> Self {
        ResponseItem::Entity(entity.element().clone())
    }
}

impl From<EntityElement> for ResponseItem {
    fn from(element: EntityElement) -> Self {
        ResponseItem::Entity(element)
    }
}

impl From<UIMessage> for ResponseItem {
    fn from(message: UIMessage) -> Self {
        ResponseItem::Message(message)
    }
}

/// Result of a transform: entities plus optional notifications.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformResponse {
    pub entities: Vec<EntityElement>,
    pub messages: Vec<UIMessage>,
}

impl TransformResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entities are stored as their raw elements.
    pub fn append(&mut self, item: impl Into<ResponseItem>) {
        match item.into() {
            ResponseItem::Entity(element) => self.entities.push(element),
            ResponseItem::Message(message) => self.messages.push(message),
        }
    }

    /// Remove the first equal entity element or message, if any.
    pub fn remove(&mut self, item: impl Into<ResponseItem>) {
        match item.into() {
            ResponseItem::Entity(element) => {
                if let Some(pos) = self.entities.iter().position(|e| *e == element) {
                    self.entities.remove(pos);
                }
            }
            ResponseItem::Message(message) => {
                if let Some(pos) = self.messages.iter().position(|m| *m == message) {
                    self.messages.remove(pos);
                }
            }
        }
    }

    pub fn append_all<I, T>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<ResponseItem>,
    {
        for item in items {
            self.append(item);
        }
    }

    pub fn remove_all<I, T>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<ResponseItem>,
    {
        for item in items {
            self.remove(item);
        }
    }
}

impl XmlModel for TransformResponse {
    const TAG: &'static str = "MaltegoTransformResponseMessage";

    fn to_node(&self) -> XmlNode {
        let mut node = XmlNode::new(Self::TAG).with_child(encode_list("Entities", &self.entities));
        if !self.messages.is_empty() {
            node.push(encode_list("UIMessages", &self.messages));
        }
        node
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        Ok(Self {
            entities: decode_list(Some(node.required_child("Entities")?))?,
            messages: decode_list(node.child("UIMessages"))?,
        })
    }
}
