//! Transform request envelope.

use indexmap::IndexMap;

use crate::entity::registry::{self, EntityRegistry};
use crate::entity::Entity;
use crate::error::EntityError;
use crate::message::common::TransformField;
use crate::message::element::EntityElement;
use crate::xml::{decode_list, encode_list, expect_tag, parse_attr, XmlError, XmlModel, XmlNode};

/// Reserved transform field carrying arguments for a local transform.
pub const LOCAL_ARGUMENTS_KEY: &str = "canari.local.arguments";

pub const DEFAULT_SOFT_LIMIT: u32 = 500;
pub const DEFAULT_HARD_LIMIT: u32 = 10000;

/// How many results the client wants back. Transforms should honour them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Matches the result slider of the client.
    pub soft: u32,
    pub hard: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            soft: DEFAULT_SOFT_LIMIT,
            hard: DEFAULT_HARD_LIMIT,
        }
    }
}

impl XmlModel for Limits {
    const TAG: &'static str = "Limits";

    fn to_node(&self) -> XmlNode {
        XmlNode::new(Self::TAG)
            .with_attr("SoftLimit", self.soft)
            .with_attr("HardLimit", self.hard)
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        Ok(Self {
            soft: parse_attr(node, "SoftLimit")?.unwrap_or(DEFAULT_SOFT_LIMIT),
            hard: parse_attr(node, "HardLimit")?.unwrap_or(DEFAULT_HARD_LIMIT),
        })
    }
}

/// Transform parameters as handed to a transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Params<'a> {
    /// Value of the reserved local-arguments field.
    Arguments(&'a str),
    /// The full parameter map.
    Fields(&'a IndexMap<String, TransformField>),
}

/// Request sent by the client: seed entities, transform fields and limits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformRequest {
    pub entities: Vec<EntityElement>,
    pub parameters: IndexMap<String, TransformField>,
    pub limits: Limits,
}

impl TransformRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: impl Into<EntityElement>) -> Self {
        self.entities.push(entity.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let field = TransformField::new(name, value);
        self.parameters.insert(field.name.clone(), field);
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// The first entity, typed through the process-wide registry.
    pub fn entity(&self) -> Result<Entity, EntityError> {
        self.entity_in(registry::global())
    }

    /// The first entity, typed through `registry`; a generic empty entity
    /// when the request carries none.
    pub fn entity_in(&self, registry: &EntityRegistry) -> Result<Entity, EntityError> {
        match self.entities.first() {
            Some(element) => registry.decode(element.clone()),
            None => Ok(Entity::generic("")),
        }
    }

    /// Local arguments if present, otherwise every transform field.
    pub fn params(&self) -> Params<'_> {
        match self.parameters.get(LOCAL_ARGUMENTS_KEY) {
            Some(field) => Params::Arguments(field.value.as_deref().unwrap_or("")),
            None => Params::Fields(&self.parameters),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(|f| f.value.as_deref())
    }

    /// Value of the first entity.
    pub fn value(&self) -> Result<Option<String>, EntityError> {
        Ok(self.entity()?.value().map(str::to_string))
    }
}

impl XmlModel for TransformRequest {
    const TAG: &'static str = "MaltegoTransformRequestMessage";

    fn to_node(&self) -> XmlNode {
        let mut node = XmlNode::new(Self::TAG).with_child(encode_list("Entities", &self.entities));
        if !self.parameters.is_empty() {
            node.push(encode_list("TransformFields", self.parameters.values()));
        }
        node.with_child(self.limits.to_node())
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;

        let parameters = decode_list::<TransformField>(node.child("TransformFields"))?
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect();
        let limits = match node.child(Limits::TAG) {
            Some(limits) => Limits::from_node(limits)?,
            None => Limits::default(),
        };

        Ok(Self {
            entities: decode_list(Some(node.required_child("Entities")?))?,
            parameters,
            limits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::variant::VariantBuilder;
    use crate::field::FieldDecl;

    const REQUEST: &str = r#"
        <MaltegoTransformRequestMessage>
            <Entities>
                <Entity Type="Person"><Value>Jane Doe</Value></Entity>
                <Entity Type="Person"><Value>John Roe</Value></Entity>
            </Entities>
            <TransformFields>
                <Field Name="api.key">secret</Field>
            </TransformFields>
            <Limits SoftLimit="12"/>
        </MaltegoTransformRequestMessage>"#;

    fn registry() -> EntityRegistry {
        let mut registry = EntityRegistry::new();
        registry.register_as(
            "Person",
            VariantBuilder::new("Person")
                .field(FieldDecl::new("person.fullname").value_pivot())
                .build(),
        );
        registry
    }

    #[test]
    fn test_decode_request() {
        let request = TransformRequest::from_xml(REQUEST).unwrap();
        assert_eq!(request.entities.len(), 2);
        assert_eq!(request.parameter("api.key"), Some("secret"));
        assert_eq!(request.limits, Limits { soft: 12, hard: 10000 });
    }

    #[test]
    fn test_entity_is_first_element_typed() {
        let request = TransformRequest::from_xml(REQUEST).unwrap();
        let entity = request.entity_in(&registry()).unwrap();
        assert_eq!(entity.variant().name(), "Person");
        assert_eq!(entity.value(), Some("Jane Doe"));
    }

    #[test]
    fn test_entity_unknown_type() {
        let request = TransformRequest::from_xml(REQUEST).unwrap();
        let err = request.entity_in(&EntityRegistry::new()).unwrap_err();
        assert_eq!(err, EntityError::UnknownType("Person".to_string()));
    }

    #[test]
    fn test_empty_request_gives_generic_entity() {
        let request = TransformRequest::new();
        let entity = request.entity_in(&EntityRegistry::new()).unwrap();
        assert_eq!(entity.type_name(), "maltego.Entity");
        assert_eq!(entity.value(), Some(""));
    }

    #[test]
    fn test_params() {
        let request = TransformRequest::new().with_parameter("a", "1");
        assert!(matches!(request.params(), Params::Fields(map) if map.len() == 1));

        let local = request.with_parameter(LOCAL_ARGUMENTS_KEY, "-v --fast");
        assert_eq!(local.params(), Params::Arguments("-v --fast"));
    }

    #[test]
    fn test_entities_element_is_required() {
        let err = TransformRequest::from_xml("<MaltegoTransformRequestMessage/>").unwrap_err();
        assert!(matches!(err, XmlError::MissingElement { .. }));
    }

    #[test]
    fn test_default_limits_rendered() {
        let xml = TransformRequest::new().render().unwrap();
        assert!(xml.contains(r#"<Limits HardLimit="10000" SoftLimit="500"/>"#));
        assert!(xml.contains("<Entities/>"));
    }
}
