//! Entity catalogue loader.
//!
//! Declares extra entity variants from YAML at start-up:
//!
//! ```yaml
//! entities:
//!   - name: Hash
//!     namespace: acme
//!     fields:
//!       - name: hash.value
//!         property: value
//!         is_value: true
//!       - name: hash.algorithm
//!         type: enum
//!         choices: [md5, sha1, sha256]
//!   - name: MalwareHash
//!     namespace: acme
//!     extends: [acme.Hash]
//!     fields:
//!       - name: malware.family
//!         matching_rule: loose
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::entity::registry::EntityRegistry;
use crate::entity::variant::{EntityVariant, VariantBuilder};
use crate::field::{FieldDecl, FieldKind, MatchingRule};

/// Error type for catalogue loading
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Io { path: String, message: String },
    Parse(String),
    UnknownFieldType { entity: String, field: String, kind: String },
    InvalidPattern { entity: String, field: String, reason: String },
    UnknownBase { entity: String, base: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => write!(f, "Failed to read catalogue {}: {}", path, message),
            ConfigError::Parse(msg) => write!(f, "Failed to parse catalogue YAML: {}", msg),
            ConfigError::UnknownFieldType { entity, field, kind } => {
                write!(f, "Entity '{}' field '{}' has unknown type '{}'", entity, field, kind)
            }
            ConfigError::InvalidPattern { entity, field, reason } => {
                write!(f, "Entity '{}' field '{}' has an invalid pattern: {}", entity, field, reason)
            }
            ConfigError::UnknownBase { entity, base } => {
                write!(f, "Entity '{}' extends unknown type '{}'", entity, base)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A field of a catalogue entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub property: Option<String>,
    /// Kind name; `string` when absent, `regex` when only a pattern is set.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub matching_rule: Option<MatchingRule>,
    #[serde(default)]
    pub choices: Vec<serde_yaml::Value>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub is_value: bool,
    /// Prefix the wire name with `link#`.
    #[serde(default)]
    pub link: bool,
}

impl FieldConfig {
    fn to_decl(&self, entity: &str) -> Result<FieldDecl, ConfigError> {
        let kind = self.resolve_kind(entity)?;
        let mut decl = if self.link {
            FieldDecl::link(&self.name)
        } else {
            FieldDecl::new(self.name.as_str())
        };
        decl = decl.kind(kind).matching_rule(self.matching_rule.unwrap_or_default());
        if let Some(display_name) = &self.display_name {
            decl = decl.display_name(display_name.as_str());
        }
        if let Some(property) = &self.property {
            decl = decl.property(property.as_str());
        }
        if self.is_value {
            decl = decl.value_pivot();
        }
        Ok(decl)
    }

    fn resolve_kind(&self, entity: &str) -> Result<FieldKind, ConfigError> {
        let kind = match (&self.kind, &self.pattern) {
            (Some(kind), _) => kind.to_ascii_lowercase(),
            (None, Some(_)) => "regex".to_string(),
            (None, None) => "string".to_string(),
        };

        match kind.as_str() {
            "enum" => Ok(FieldKind::choices(self.choices.iter().map(choice_text))),
            "regex" => {
                let pattern = self.pattern.as_deref().ok_or_else(|| ConfigError::InvalidPattern {
                    entity: entity.to_string(),
                    field: self.name.clone(),
                    reason: "regex fields need a pattern".to_string(),
                })?;
                FieldKind::regex(pattern).map_err(|e| ConfigError::InvalidPattern {
                    entity: entity.to_string(),
                    field: self.name.clone(),
                    reason: e.to_string(),
                })
            }
            other => FieldKind::from_name(other).ok_or_else(|| ConfigError::UnknownFieldType {
                entity: entity.to_string(),
                field: self.name.clone(),
                kind: other.to_string(),
            }),
        }
    }
}

fn choice_text(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
    }
}

/// An entity variant declared in the catalogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    /// Type names of the ancestors, merged in order.
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub standalone: bool,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

impl EntityConfig {
    /// Build the variant, resolving ancestors through `registry`.
    pub fn build(&self, registry: &EntityRegistry) -> Result<Arc<EntityVariant>, ConfigError> {
        let mut builder = VariantBuilder::new(self.name.as_str());
        if let Some(namespace) = &self.namespace {
            builder = builder.namespace(namespace.as_str());
        }
        if let Some(alias) = &self.alias {
            builder = builder.alias(alias.as_str());
        }
        if self.standalone {
            builder = builder.standalone();
        }
        for base in &self.extends {
            let variant = registry.lookup(base).map_err(|_| ConfigError::UnknownBase {
                entity: self.name.clone(),
                base: base.clone(),
            })?;
            builder = builder.extends(&variant);
        }
        for field in &self.fields {
            builder = builder.field(field.to_decl(&self.name)?);
        }
        Ok(builder.build())
    }
}

/// Entity catalogue file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogueConfig {
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

impl CatalogueConfig {
    /// Load a catalogue from a YAML file.
    ///
    /// # Example
    /// ```ignore
    /// use maltego_message::config::CatalogueConfig;
    ///
    /// let catalogue = CatalogueConfig::load_from_file("entities.yaml")?;
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_yaml_str(&contents)?;
        info!("Loaded {} entity declarations from {}", config.entities.len(), path.display());
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Build and register every declared variant, in file order.
    ///
    /// Returns the type names registered.
    pub fn apply(&self, registry: &mut EntityRegistry) -> Result<Vec<String>, ConfigError> {
        let mut registered = Vec::with_capacity(self.entities.len());
        for entity in &self.entities {
            let variant = entity.build(registry)?;
            registered.push(variant.type_name().to_string());
            registry.register(variant);
        }
        info!("Registered {} catalogue entities", registered.len());
        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityError;

    const CATALOGUE: &str = r#"
entities:
  - name: Hash
    namespace: acme
    fields:
      - name: hash.value
        property: value
        is_value: true
      - name: hash.algorithm
        type: enum
        choices: [md5, sha1, 256]
  - name: MalwareHash
    namespace: acme
    extends: [acme.Hash]
    fields:
      - name: malware.family
        matching_rule: loose
      - name: ticket
        pattern: "^INC-[0-9]+$"
"#;

    #[test]
    fn test_apply_catalogue() {
        let config = CatalogueConfig::from_yaml_str(CATALOGUE).unwrap();
        let mut registry = EntityRegistry::new();
        let names = config.apply(&mut registry).unwrap();
        assert_eq!(names, vec!["acme.Hash", "acme.MalwareHash"]);

        let variant = registry.lookup("MalwareHash").unwrap();
        assert!(variant.descriptor_for("hash.algorithm").is_some());
        assert!(variant.descriptor_for("notes#").is_some());

        let mut entity = variant.create("d41d8cd9");
        entity.set("hash.algorithm", 256).unwrap();
        assert!(matches!(
            entity.set("hash.algorithm", "crc"),
            Err(EntityError::ValidationError { .. })
        ));
        assert!(entity.set("ticket", "INC-42").is_ok());
        assert!(entity.set("ticket", "42").is_err());
    }

    #[test]
    fn test_extends_builtin() {
        let yaml = "entities:\n  - name: CorporateEmail\n    namespace: acme\n    extends: [maltego.EmailAddress]\n";
        let mut registry = EntityRegistry::with_builtins();
        CatalogueConfig::from_yaml_str(yaml).unwrap().apply(&mut registry).unwrap();
        let variant = registry.lookup("acme.CorporateEmail").unwrap();
        assert_eq!(variant.value_property().unwrap().name(), "email");
    }

    #[test]
    fn test_unknown_base() {
        let yaml = "entities:\n  - name: Orphan\n    extends: [acme.Missing]\n";
        let err = CatalogueConfig::from_yaml_str(yaml)
            .unwrap()
            .apply(&mut EntityRegistry::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBase { .. }));
    }

    #[test]
    fn test_unknown_type_and_bad_pattern() {
        let yaml = "entities:\n  - name: A\n    fields:\n      - name: f\n        type: blob\n";
        let err = CatalogueConfig::from_yaml_str(yaml)
            .unwrap()
            .apply(&mut EntityRegistry::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFieldType { .. }));

        let yaml = "entities:\n  - name: A\n    fields:\n      - name: f\n        type: regex\n        pattern: \"(\"\n";
        let err = CatalogueConfig::from_yaml_str(yaml)
            .unwrap()
            .apply(&mut EntityRegistry::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            CatalogueConfig::from_yaml_str("entities: [unclosed"),
            Err(ConfigError::Parse(_))
        ));
    }
}
