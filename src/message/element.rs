//! Raw entity element: the untyped container behind every typed entity.

use indexmap::IndexMap;

use crate::message::common::{AdditionalField, Label};
use crate::xml::{decode_list, encode_list, expect_tag, parse_child_text, XmlError, XmlModel, XmlNode};

/// Something that can be appended to or removed from an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityItem {
    Field(AdditionalField),
    Label(Label),
}

impl From<AdditionalField> for EntityItem {
    fn from(field: AdditionalField) -> Self {
        EntityItem::Field(field)
    }
}

impl From<Label> for EntityItem {
    fn from(label: Label) -> Self {
        EntityItem::Label(label)
    }
}

/// XML element describing an entity.
///
/// Fields are keyed by name, so a name is stored at most once. Labels keep
/// their insertion order and may repeat.
#[derive(Debug, Clone, Default)]
pub struct EntityElement {
    pub type_name: String,
    pub fields: IndexMap<String, AdditionalField>,
    pub labels: Vec<Label>,
    pub weight: Option<i64>,
    pub icon_url: Option<String>,
    pub value: Option<String>,
}

impl EntityElement {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Store an item without any validation.
    pub fn append(&mut self, item: impl Into<EntityItem>) {
        match item.into() {
            EntityItem::Field(field) => {
                self.fields.insert(field.name.clone(), field);
            }
            EntityItem::Label(label) => self.labels.push(label),
        }
    }

    /// Remove a field by name, or the first label with the same name.
    /// Missing items are ignored.
    pub fn remove(&mut self, item: impl Into<EntityItem>) {
        match item.into() {
            EntityItem::Field(field) => {
                self.fields.shift_remove(&field.name);
            }
            EntityItem::Label(label) => {
                if let Some(pos) = self.labels.iter().position(|l| l.name == label.name) {
                    self.labels.remove(pos);
                }
            }
        }
    }

    pub fn field(&self, name: &str) -> Option<&AdditionalField> {
        self.fields.get(name)
    }

    /// Raw text of a stored field.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|f| f.value.as_deref())
    }
}

/// Equality compares canonical renders.
impl PartialEq for EntityElement {
    fn eq(&self, other: &Self) -> bool {
        match (self.render_canonical(), other.render_canonical()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl XmlModel for EntityElement {
    const TAG: &'static str = "Entity";

    fn to_node(&self) -> XmlNode {
        let mut node = XmlNode::new(Self::TAG).with_attr("Type", &self.type_name);
        if !self.fields.is_empty() {
            node.push(encode_list("AdditionalFields", self.fields.values()));
        }
        if !self.labels.is_empty() {
            node.push(encode_list("DisplayInformation", &self.labels));
        }
        node.with_opt_text_child("Weight", self.weight)
            .with_opt_text_child("IconURL", self.icon_url.as_ref())
            .with_opt_text_child("Value", self.value.as_ref())
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;

        let fields = decode_list::<AdditionalField>(node.child("AdditionalFields"))?
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect();

        Ok(Self {
            type_name: node.required_attr("Type")?.to_string(),
            fields,
            labels: decode_list(node.child("DisplayInformation"))?,
            weight: parse_child_text(node, "Weight")?,
            icon_url: node.child_text("IconURL").map(str::to_string),
            value: node.child_text("Value").map(str::to_string),
        })
    }
}
