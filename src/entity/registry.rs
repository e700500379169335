//! Entity type registry.
//!
//! Maps a wire type name (or legacy alias) to the variant that declared it.
//! The process-wide registry is written once at start-up with [`install`]
//! and read through [`global`] afterwards; it is never mutated after
//! installation.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::entity::catalogue;
use crate::entity::variant::EntityVariant;
use crate::entity::Entity;
use crate::error::EntityError;
use crate::message::element::EntityElement;

static GLOBAL: OnceLock<EntityRegistry> = OnceLock::new();

/// Install the process-wide registry. Hands the registry back if one is
/// already installed (or [`global`] has already been read).
pub fn install(registry: EntityRegistry) -> Result<(), EntityRegistry> {
    GLOBAL.set(registry)
}

/// Process-wide registry; the built-in catalogue unless one was installed.
pub fn global() -> &'static EntityRegistry {
    GLOBAL.get_or_init(EntityRegistry::with_builtins)
}

/// Lookup table from type name to entity variant.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    variants: HashMap<String, Arc<EntityVariant>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the base entity and the built-in
    /// catalogue.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        catalogue::register_builtins(&mut registry);
        registry
    }

    /// Register a variant under its type name and its alias.
    ///
    /// An existing registration under either name is replaced.
    pub fn register(&mut self, variant: Arc<EntityVariant>) {
        let alias = variant.alias().to_string();
        self.register_as(variant.type_name().to_string(), Arc::clone(&variant));
        if alias != variant.type_name() {
            self.register_as(alias, variant);
        }
    }

    /// Register a variant under an arbitrary name.
    pub fn register_as(&mut self, name: impl Into<String>, variant: Arc<EntityVariant>) {
        let name = name.into();
        debug!("Registering entity variant {} as '{}'", variant.type_name(), name);
        if let Some(previous) = self.variants.insert(name.clone(), variant) {
            debug!("Entity type '{}' was bound to {}, overwritten", name, previous.type_name());
        }
    }

    pub fn lookup(&self, type_name: &str) -> Result<Arc<EntityVariant>, EntityError> {
        self.variants
            .get(type_name)
            .cloned()
            .ok_or_else(|| EntityError::UnknownType(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.variants.contains_key(type_name)
    }

    /// Every registered name, aliases included, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.variants.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Distinct variants, sorted by type name.
    pub fn variants(&self) -> Vec<&Arc<EntityVariant>> {
        let mut variants: Vec<&Arc<EntityVariant>> = Vec::new();
        for variant in self.variants.values() {
            if !variants.iter().any(|v| Arc::ptr_eq(v, variant)) {
                variants.push(variant);
            }
        }
        variants.sort_by(|a, b| a.type_name().cmp(b.type_name()));
        variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Wrap a raw element in the variant registered for its type.
    pub fn decode(&self, element: EntityElement) -> Result<Entity, EntityError> {
        let variant = self.lookup(&element.type_name)?;
        Ok(Entity::from_element(variant, element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::variant::VariantBuilder;
    use crate::field::FieldDecl;

    #[test]
    fn test_register_under_type_and_alias() {
        let mut registry = EntityRegistry::new();
        registry.register(VariantBuilder::new("Person").namespace("acme").build());

        assert!(registry.contains("acme.Person"));
        assert!(registry.contains("Person"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.variants().len(), 1);
    }

    #[test]
    fn test_lookup_unknown_type() {
        let registry = EntityRegistry::new();
        assert_eq!(
            registry.lookup("Nope").unwrap_err(),
            EntityError::UnknownType("Nope".to_string())
        );
    }

    #[test]
    fn test_duplicate_registration_overwrites() {
        let first = VariantBuilder::new("A").standalone().field(FieldDecl::new("one")).build();
        let second = VariantBuilder::new("A").standalone().field(FieldDecl::new("two")).build();

        let mut registry = EntityRegistry::new();
        registry.register_as("A", first);
        registry.register_as("A", Arc::clone(&second));

        let found = registry.lookup("A").unwrap();
        assert!(Arc::ptr_eq(&found, &second));
        assert!(found.descriptor_for("two").is_some());
    }

    #[test]
    fn test_decode_element() {
        let registry = EntityRegistry::with_builtins();
        let element = EntityElement::new("maltego.EmailAddress").with_value("a@b.com");
        let entity = registry.decode(element).unwrap();
        assert_eq!(entity.variant().name(), "EmailAddress");
        assert!(registry.decode(EntityElement::new("acme.Unknown")).is_err());
    }

    #[test]
    fn test_builtin_names_sorted() {
        let registry = EntityRegistry::with_builtins();
        let names = registry.type_names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&"maltego.Entity"));
        assert!(names.contains(&"Phrase"));
    }
}
