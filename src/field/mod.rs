//! Field descriptors and declarations.
//!
//! A [`FieldDecl`] is written once per field when an entity variant is
//! declared. Building the variant turns each declaration into a
//! [`FieldDescriptor`] stored under its property id, and records the
//! `wire name -> property id` mapping in the variant's field table.
//!
//! ```ignore
//! use maltego_message::field::{FieldDecl, FieldKind};
//! use maltego_message::MatchingRule;
//!
//! let email = FieldDecl::new("person.email")
//!     .property("email")
//!     .display_name("Email Address")
//!     .matching_rule(MatchingRule::Loose);
//! let style = FieldDecl::link("maltego.link.style").kind(FieldKind::Integer);
//! assert_eq!(style.wire_name(), "link#maltego.link.style");
//! ```

pub mod kind;

use regex::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::entity::Entity;
use crate::error::EntityError;
use crate::value::FieldValue;

pub use crate::message::common::MatchingRule;
pub use kind::{FieldCodec, FieldKind};

/// Namespace token prepended to the wire name of link fields.
pub const LINK_PREFIX: &str = "link#";

/// Callback invoked with the owning entity after every successful set.
pub type ChangeHook = Arc<dyn Fn(&mut Entity, &FieldValue) + Send + Sync>;

/// Derive a property id from a wire name by replacing every run of
/// non-word characters with a single `_`.
pub fn property_id(wire_name: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    NON_WORD
        .get_or_init(|| Regex::new(r"\W+").expect("non-word pattern is valid"))
        .replace_all(wire_name, "_")
        .into_owned()
}

/// A field bound to an entity variant.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: String,
    display_name: Option<String>,
    property: String,
    matching_rule: MatchingRule,
    codec: Arc<dyn FieldCodec>,
    is_value: bool,
    on_change: Option<ChangeHook>,
}

impl FieldDescriptor {
    /// Wire name (the `Name` attribute of the stored field).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn matching_rule(&self) -> MatchingRule {
        self.matching_rule
    }

    pub fn kind_name(&self) -> &'static str {
        self.codec.kind_name()
    }

    /// Whether this field writes through to the entity's top-level value.
    pub fn is_value(&self) -> bool {
        self.is_value
    }

    pub fn on_change(&self) -> Option<&ChangeHook> {
        self.on_change.as_ref()
    }

    /// Validate and encode a value. `Null` encodes to `None` unless the
    /// kind refuses it.
    pub fn encode(&self, value: &FieldValue) -> Result<Option<String>, EntityError> {
        if value.is_null() {
            if !self.codec.accepts_null() {
                return Err(EntityError::ValidationError {
                    field: self.name.clone(),
                    reason: format!("{} field does not accept null", self.codec.kind_name()),
                });
            }
            return Ok(None);
        }
        self.codec.validate_and_encode(&self.name, value).map(Some)
    }

    pub fn decode(&self, raw: &str) -> Result<FieldValue, EntityError> {
        self.codec.decode(&self.name, raw)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("property", &self.property)
            .field("matching_rule", &self.matching_rule)
            .field("kind", &self.codec.kind_name())
            .field("is_value", &self.is_value)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

/// Declaration of a field on an entity variant.
#[derive(Clone)]
pub struct FieldDecl {
    name: String,
    display_name: Option<String>,
    property: Option<String>,
    matching_rule: MatchingRule,
    codec: Arc<dyn FieldCodec>,
    is_value: bool,
    on_change: Option<ChangeHook>,
}

impl FieldDecl {
    /// Declare a string field with strict matching.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            property: None,
            matching_rule: MatchingRule::Strict,
            codec: Arc::new(FieldKind::String),
            is_value: false,
            on_change: None,
        }
    }

    /// Declare a link field; the wire name gets the [`LINK_PREFIX`].
    pub fn link(name: impl AsRef<str>) -> Self {
        Self::new(format!("{}{}", LINK_PREFIX, name.as_ref()))
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Override the derived property id.
    pub fn property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn matching_rule(mut self, rule: MatchingRule) -> Self {
        self.matching_rule = rule;
        self
    }

    pub fn kind(self, kind: FieldKind) -> Self {
        self.codec(Arc::new(kind))
    }

    /// Use a custom codec in place of one of the built-in kinds.
    pub fn codec(mut self, codec: Arc<dyn FieldCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Mark this field as the variant's value pivot.
    pub fn value_pivot(mut self) -> Self {
        self.is_value = true;
        self
    }

    pub fn on_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Entity, &FieldValue) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(hook));
        self
    }

    pub fn wire_name(&self) -> &str {
        &self.name
    }

    /// The explicit property id, or one derived from the wire name.
    pub fn property_id(&self) -> String {
        self.property
            .clone()
            .unwrap_or_else(|| property_id(&self.name))
    }

    pub fn into_descriptor(self) -> FieldDescriptor {
        let property = self.property_id();
        FieldDescriptor {
            name: self.name,
            display_name: self.display_name,
            property,
            matching_rule: self.matching_rule,
            codec: self.codec,
            is_value: self.is_value,
            on_change: self.on_change,
        }
    }
}

impl fmt::Debug for FieldDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDecl")
            .field("name", &self.name)
            .field("property", &self.property_id())
            .field("kind", &self.codec.kind_name())
            .finish()
    }
}
