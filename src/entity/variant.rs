//! Entity variants and their flattened field tables.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::entity::catalogue;
use crate::entity::Entity;
use crate::field::{FieldDecl, FieldDescriptor};
use crate::message::element::EntityElement;

pub const DEFAULT_NAMESPACE: &str = "maltego";

/// A concrete entity type: its type name, legacy alias and the fields it
/// declares or inherits.
#[derive(Debug)]
pub struct EntityVariant {
    name: String,
    namespace: String,
    type_name: String,
    alias: String,
    /// property id -> descriptor
    properties: IndexMap<String, FieldDescriptor>,
    /// wire name -> property id
    field_table: IndexMap<String, String>,
    value_property: Option<String>,
}

impl EntityVariant {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fully qualified type name, `namespace.name`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Secondary name the variant is registered under.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn field_table(&self) -> &IndexMap<String, String> {
        &self.field_table
    }

    pub fn descriptor(&self, property: &str) -> Option<&FieldDescriptor> {
        self.properties.get(property)
    }

    /// Descriptor bound to a wire name through the field table.
    pub fn descriptor_for(&self, wire_name: &str) -> Option<&FieldDescriptor> {
        self.field_table
            .get(wire_name)
            .and_then(|property| self.properties.get(property))
    }

    /// Property ids reachable through the field table, without duplicates.
    pub fn properties(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for property in self.field_table.values() {
            if !seen.contains(&property.as_str()) {
                seen.push(property);
            }
        }
        seen
    }

    /// The field that writes through to the entity's top-level value.
    pub fn value_property(&self) -> Option<&FieldDescriptor> {
        self.value_property
            .as_ref()
            .and_then(|property| self.properties.get(property))
    }

    /// New entity of this variant with the given value.
    pub fn create(self: &Arc<Self>, value: impl Into<String>) -> Entity {
        let element = EntityElement::new(self.type_name.as_str()).with_value(value);
        Entity::from_element(Arc::clone(self), element)
    }

    /// Typed view over an existing raw element.
    pub fn wrap(self: &Arc<Self>, element: EntityElement) -> Entity {
        Entity::from_element(Arc::clone(self), element)
    }
}

/// Declares an entity variant.
///
/// Ancestor field tables are merged first, in the order the ancestors were
/// given, then the variant's own declarations. A later entry for the same
/// wire name replaces the earlier binding; every other inherited field
/// stays reachable.
pub struct VariantBuilder {
    name: String,
    namespace: String,
    alias: Option<String>,
    bases: Vec<Arc<EntityVariant>>,
    inherit_base: bool,
    fields: Vec<FieldDecl>,
}

impl VariantBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            alias: None,
            bases: Vec::new(),
            inherit_base: true,
            fields: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Legacy alias; defaults to the bare name.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn extends(mut self, base: &Arc<EntityVariant>) -> Self {
        self.bases.push(Arc::clone(base));
        self
    }

    /// Do not inherit the fields of the base entity when no ancestor is
    /// given.
    pub fn standalone(mut self) -> Self {
        self.inherit_base = false;
        self
    }

    pub fn field(mut self, decl: FieldDecl) -> Self {
        self.fields.push(decl);
        self
    }

    pub fn fields(mut self, decls: impl IntoIterator<Item = FieldDecl>) -> Self {
        self.fields.extend(decls);
        self
    }

    pub fn build(self) -> Arc<EntityVariant> {
        let mut bases = self.bases;
        if bases.is_empty() && self.inherit_base {
            bases.push(catalogue::base());
        }

        let mut properties: IndexMap<String, FieldDescriptor> = IndexMap::new();
        let mut field_table: IndexMap<String, String> = IndexMap::new();

        for base in &bases {
            for (property, descriptor) in &base.properties {
                properties.insert(property.clone(), descriptor.clone());
            }
            for (wire_name, property) in &base.field_table {
                field_table.insert(wire_name.clone(), property.clone());
            }
        }

        for decl in self.fields {
            let descriptor = decl.into_descriptor();
            let property = descriptor.property().to_string();
            field_table.insert(descriptor.name().to_string(), property.clone());
            properties.insert(property, descriptor);
        }

        // Last reachable pivot wins, so a descendant's pivot replaces an
        // inherited one.
        let value_property = field_table
            .values()
            .rev()
            .find(|property| properties.get(*property).is_some_and(FieldDescriptor::is_value))
            .cloned();

        let type_name = format!("{}.{}", self.namespace, self.name);
        let alias = self.alias.unwrap_or_else(|| self.name.clone());

        Arc::new(EntityVariant {
            name: self.name,
            namespace: self.namespace,
            type_name,
            alias,
            properties,
            field_table,
            value_property,
        })
    }
}
