//! Typed entities.
//!
//! An [`Entity`] pairs a raw [`EntityElement`] with the [`EntityVariant`]
//! that declares its fields. Declared fields are read and written through
//! their descriptors, which validate and coerce values; anything else can
//! still be attached with [`Entity::append`] as an ad-hoc field.
//!
//! ```ignore
//! use maltego_message::entity::catalogue;
//!
//! let mut person = catalogue::person().create("Jane Doe");
//! person.set("person.lastname", "Doe")?;
//! assert_eq!(person.get("person.lastname")?.unwrap().to_string(), "Doe");
//! ```

pub mod catalogue;
pub mod registry;
pub mod variant;

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::EntityError;
use crate::field::FieldDescriptor;
use crate::message::common::AdditionalField;
use crate::message::element::{EntityElement, EntityItem};
use crate::value::FieldValue;
use crate::xml::{XmlError, XmlModel};

pub use registry::EntityRegistry;
pub use variant::{EntityVariant, VariantBuilder};

/// Typed view over an entity element.
#[derive(Clone)]
pub struct Entity {
    variant: Arc<EntityVariant>,
    element: EntityElement,
}

impl Entity {
    pub fn new(variant: &Arc<EntityVariant>, value: impl Into<String>) -> Self {
        variant.create(value)
    }

    /// Entity of the base type, carrying only the inherited fields.
    pub fn generic(value: impl Into<String>) -> Self {
        catalogue::base().create(value)
    }

    pub fn from_element(variant: Arc<EntityVariant>, element: EntityElement) -> Self {
        Self { variant, element }
    }

    pub fn variant(&self) -> &Arc<EntityVariant> {
        &self.variant
    }

    /// Read a declared field by wire name.
    ///
    /// Returns `Ok(None)` when the field is declared but not stored.
    pub fn get(&self, wire_name: &str) -> Result<Option<FieldValue>, EntityError> {
        let descriptor = self
            .variant
            .descriptor_for(wire_name)
            .ok_or_else(|| EntityError::UnknownField(wire_name.to_string()))?;
        self.read(descriptor)
    }

    /// Validate, encode and store a declared field by wire name.
    pub fn set(&mut self, wire_name: &str, value: impl Into<FieldValue>) -> Result<(), EntityError> {
        let variant = Arc::clone(&self.variant);
        let descriptor = variant
            .descriptor_for(wire_name)
            .ok_or_else(|| EntityError::UnknownField(wire_name.to_string()))?;
        self.write(descriptor, value.into())
    }

    /// Read a declared field by property id.
    pub fn get_property(&self, property: &str) -> Result<Option<FieldValue>, EntityError> {
        let descriptor = self
            .variant
            .descriptor(property)
            .ok_or_else(|| EntityError::UnknownField(property.to_string()))?;
        self.read(descriptor)
    }

    pub fn set_property(&mut self, property: &str, value: impl Into<FieldValue>) -> Result<(), EntityError> {
        let variant = Arc::clone(&self.variant);
        let descriptor = variant
            .descriptor(property)
            .ok_or_else(|| EntityError::UnknownField(property.to_string()))?;
        self.write(descriptor, value.into())
    }

    /// Builder form of [`Entity::set`].
    pub fn with(mut self, wire_name: &str, value: impl Into<FieldValue>) -> Result<Self, EntityError> {
        self.set(wire_name, value)?;
        Ok(self)
    }

    fn read(&self, descriptor: &FieldDescriptor) -> Result<Option<FieldValue>, EntityError> {
        let raw = if descriptor.is_value() {
            self.element.value.as_deref()
        } else {
            self.element.field_value(descriptor.name())
        };
        match raw {
            Some(raw) if !raw.is_empty() => descriptor.decode(raw).map(Some),
            _ => Ok(None),
        }
    }

    fn write(&mut self, descriptor: &FieldDescriptor, value: FieldValue) -> Result<(), EntityError> {
        let encoded = descriptor.encode(&value)?;
        debug!(
            "Setting {} field '{}' on {} to {:?}",
            descriptor.kind_name(),
            descriptor.name(),
            self.element.type_name,
            encoded
        );

        if descriptor.is_value() {
            self.element.value = encoded;
        } else {
            match encoded {
                Some(text) if !text.is_empty() => self.store(descriptor, text),
                _ => {
                    self.element.fields.shift_remove(descriptor.name());
                }
            }
        }

        if let Some(hook) = descriptor.on_change() {
            hook(self, &value);
        }
        Ok(())
    }

    fn store(&mut self, descriptor: &FieldDescriptor, text: String) {
        if let Some(field) = self.element.fields.get_mut(descriptor.name()) {
            field.value = Some(text);
            return;
        }

        let mut field = AdditionalField::new(descriptor.name(), text).with_matching_rule(descriptor.matching_rule());
        if let Some(display_name) = descriptor.display_name() {
            field = field.with_display_name(display_name);
        }
        self.element.fields.insert(field.name.clone(), field);
    }

    /// Property ids of every declared field.
    pub fn fields(&self) -> Vec<&str> {
        self.variant.properties()
    }

    pub fn type_name(&self) -> &str {
        &self.element.type_name
    }

    pub fn set_type_name(&mut self, type_name: impl Into<String>) {
        self.element.type_name = type_name.into();
    }

    pub fn value(&self) -> Option<&str> {
        self.element.value.as_deref()
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.element.value = Some(value.into());
    }

    pub fn weight(&self) -> Option<i64> {
        self.element.weight
    }

    pub fn set_weight(&mut self, weight: Option<i64>) {
        self.element.weight = weight;
    }

    pub fn icon_url(&self) -> Option<&str> {
        self.element.icon_url.as_deref()
    }

    pub fn set_icon_url(&mut self, icon_url: Option<String>) {
        self.element.icon_url = icon_url;
    }

    pub fn element(&self) -> &EntityElement {
        &self.element
    }

    pub fn into_element(self) -> EntityElement {
        self.element
    }

    /// Add a field or label.
    ///
    /// A field whose name is declared on the variant is decoded and set
    /// through its descriptor, so it is validated. Undeclared fields are
    /// stored as they are.
    pub fn append(&mut self, item: impl Into<EntityItem>) -> Result<(), EntityError> {
        match item.into() {
            EntityItem::Field(field) => {
                let variant = Arc::clone(&self.variant);
                match variant.descriptor_for(&field.name) {
                    Some(descriptor) => {
                        let value = match field.value.as_deref() {
                            Some(raw) if !raw.is_empty() => descriptor.decode(raw)?,
                            _ => FieldValue::Null,
                        };
                        self.write(descriptor, value)
                    }
                    None => {
                        debug!("Appending ad-hoc field '{}' to {}", field.name, self.element.type_name);
                        self.element.append(field);
                        Ok(())
                    }
                }
            }
            EntityItem::Label(label) => {
                self.element.append(label);
                Ok(())
            }
        }
    }

    /// Remove a field by name or a label by name. Missing items are
    /// ignored.
    pub fn remove(&mut self, item: impl Into<EntityItem>) {
        self.element.remove(item);
    }

    /// Append every item in order, stopping at the first failure.
    pub fn append_all<I, T>(&mut self, items: I) -> Result<(), EntityError>
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityItem>,
    {
        for item in items {
            self.append(item)?;
        }
        Ok(())
    }

    pub fn remove_all<I, T>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityItem>,
    {
        for item in items {
            self.remove(item);
        }
    }

    /// Decoded values of every declared field present, keyed by wire name.
    pub fn to_dict(&self) -> Result<IndexMap<String, FieldValue>, EntityError> {
        let mut dict = IndexMap::new();
        for wire_name in self.variant.field_table().keys() {
            if let Some(value) = self.get(wire_name)? {
                dict.insert(wire_name.clone(), value);
            }
        }
        Ok(dict)
    }

    pub fn render(&self) -> Result<String, XmlError> {
        self.element.render()
    }

    pub fn render_canonical(&self) -> Result<String, XmlError> {
        self.element.render_canonical()
    }
}

/// Equality compares canonical renders of the underlying elements.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.element == other.element
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("variant", &self.variant.type_name())
            .field("element", &self.element)
            .finish()
    }
}

impl From<Entity> for EntityElement {
    fn from(entity: Entity) -> Self {
        entity.element
    }
}
