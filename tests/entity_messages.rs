//! Integration tests for typed entities and the message envelopes

use maltego_message::entity::catalogue;
use maltego_message::message::common::{AdditionalField, Label};
use maltego_message::{
    Entity, EntityElement, EntityError, EntityRegistry, FieldDecl, FieldKind, FieldValue, MaltegoMessage,
    TimeSpan, TransformRequest, TransformResponse, VariantBuilder, XmlModel,
};

fn contact_variant() -> std::sync::Arc<maltego_message::EntityVariant> {
    VariantBuilder::new("Contact")
        .namespace("acme")
        .field(FieldDecl::new("person.email").property("email").kind(FieldKind::String))
        .field(FieldDecl::new("contact.verified").kind(FieldKind::choices([0, 1])))
        .field(FieldDecl::new("contact.name").value_pivot())
        .build()
}

#[test]
fn test_string_field_set_get_and_clear() {
    let mut entity = contact_variant().create("Alice");

    entity.set("person.email", "a@b.com").unwrap();
    assert_eq!(entity.get("person.email").unwrap(), Some(FieldValue::from("a@b.com")));
    assert_eq!(entity.get_property("email").unwrap(), Some(FieldValue::from("a@b.com")));
    assert_eq!(entity.element().field_value("person.email"), Some("a@b.com"));

    entity.set("person.email", "").unwrap();
    assert!(entity.element().field("person.email").is_none());
    assert_eq!(entity.get("person.email").unwrap(), None);
}

#[test]
fn test_enum_field_rejects_unknown_choice() {
    let mut entity = contact_variant().create("Alice");

    assert!(matches!(
        entity.set("contact.verified", 2),
        Err(EntityError::ValidationError { .. })
    ));
    assert!(entity.element().field("contact.verified").is_none());

    entity.set("contact.verified", 1).unwrap();
    assert_eq!(entity.element().field_value("contact.verified"), Some("1"));
}

#[test]
fn test_value_pivot_writes_entity_value() {
    let mut entity = contact_variant().create("Alice");
    entity.set("contact.name", "Bob").unwrap();
    assert_eq!(entity.value(), Some("Bob"));
    assert!(entity.element().field("contact.name").is_none());
}

#[test]
fn test_request_entity_uses_registry() {
    let mut registry = EntityRegistry::new();
    registry.register(VariantBuilder::new("Person").build());

    let request = TransformRequest::new()
        .with_entity(EntityElement::new("Person").with_value("Ada Lovelace"))
        .with_entity(EntityElement::new("Person").with_value("Charles Babbage"));

    let entity = request.entity_in(&registry).unwrap();
    assert_eq!(entity.variant().type_name(), "maltego.Person");
    assert_eq!(entity.value(), Some("Ada Lovelace"));

    let err = request.entity_in(&EntityRegistry::new()).unwrap_err();
    assert!(matches!(err, EntityError::UnknownType(name) if name == "Person"));
}

#[test]
fn test_duration_field_truncates_microseconds() {
    let variant = VariantBuilder::new("Session")
        .namespace("acme")
        .field(FieldDecl::new("session.length").kind(FieldKind::Duration))
        .build();
    let mut entity = variant.create("s1");

    entity.set("session.length", TimeSpan::new(1, 3661, 500_000)).unwrap();
    assert_eq!(entity.element().field_value("session.length"), Some("1d 01h01m01.500s"));

    match entity.get("session.length").unwrap() {
        Some(FieldValue::Duration(span)) => {
            assert_eq!(span.days(), 1);
            assert_eq!(span.seconds(), 3661);
            assert_eq!(span.microseconds(), 500);
        }
        other => panic!("expected a duration, got {:?}", other),
    }
}

#[test]
fn test_duration_field_rejects_out_of_range_wire_text() {
    let variant = VariantBuilder::new("Session")
        .namespace("acme")
        .field(FieldDecl::new("session.length").kind(FieldKind::Duration))
        .build();
    let mut element = EntityElement::new("acme.Session").with_value("s1");
    element.append(AdditionalField::new("session.length", "0d 0h9223372036854775807m0.0s"));
    let entity = variant.wrap(element);

    assert!(matches!(
        entity.get("session.length"),
        Err(EntityError::DecodeFormat { field, .. }) if field == "session.length"
    ));
}

#[test]
fn test_response_stores_raw_elements() {
    let mut ip = catalogue::ipv4_address().create("10.0.0.1");
    ip.set("ipaddress.internal", true).unwrap();

    let mut response = TransformResponse::new();
    response.append(&ip);
    assert_eq!(response.entities.len(), 1);
    assert_eq!(response.entities[0], *ip.element());

    response.remove(&ip);
    assert!(response.entities.is_empty());
}

#[test]
fn test_field_order_does_not_affect_equality() {
    let mut first = catalogue::person().create("Ada Lovelace");
    first.set("person.firstnames", "Ada").unwrap();
    first.set("person.lastname", "Lovelace").unwrap();

    let mut second = catalogue::person().create("Ada Lovelace");
    second.set("person.lastname", "Lovelace").unwrap();
    second.set("person.firstnames", "Ada").unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_link_properties_are_checked() {
    let mut entity = catalogue::phrase().create("hello");

    assert!(entity.set("link#maltego.link.show-label", 2).is_err());
    entity.set("link#maltego.link.show-label", 1).unwrap();

    entity.set("link#maltego.link.color", "blue").unwrap();
    assert_eq!(entity.element().field_value("link#maltego.link.color"), Some("blue"));
    entity.set("link#maltego.link.color", "#FF00AA").unwrap();
    assert_eq!(entity.get("link#maltego.link.color").unwrap(), Some(FieldValue::from("#FF00AA")));
}

#[test]
fn test_append_items_to_entity() {
    let mut entity = catalogue::domain().create("example.com");
    entity
        .append_all([
            maltego_message::EntityItem::from(AdditionalField::new("whois-info", "registrar")),
            maltego_message::EntityItem::from(AdditionalField::new("acme.unknown", "kept")),
            maltego_message::EntityItem::from(Label::new("Source", "zone file")),
        ])
        .unwrap();

    assert_eq!(entity.element().field_value("whois-info"), Some("registrar"));
    assert_eq!(entity.element().field_value("acme.unknown"), Some("kept"));
    assert_eq!(entity.element().labels.len(), 1);

    entity.remove(Label::new("Source", "zone file"));
    assert!(entity.element().labels.is_empty());
}

#[test]
fn test_request_response_document() {
    let xml = r#"<MaltegoMessage>
        <MaltegoTransformRequestMessage>
            <Entities>
                <Entity Type="maltego.Domain">
                    <Value>example.com</Value>
                    <Weight>100</Weight>
                    <AdditionalFields>
                        <Field Name="whois-info" DisplayName="WHOIS Info">registrar</Field>
                    </AdditionalFields>
                </Entity>
            </Entities>
            <Limits SoftLimit="12" HardLimit="255"/>
        </MaltegoTransformRequestMessage>
    </MaltegoMessage>"#;

    let request = match MaltegoMessage::from_xml(xml).unwrap() {
        MaltegoMessage::Request(request) => request,
        other => panic!("expected a request, got {}", other.kind()),
    };
    assert_eq!(request.limits.soft, 12);
    assert_eq!(request.limits.hard, 255);

    let domain = request.entity_in(&EntityRegistry::with_builtins()).unwrap();
    assert_eq!(domain.variant().type_name(), "maltego.Domain");
    assert_eq!(domain.weight(), Some(100));
    assert_eq!(domain.get("whois-info").unwrap(), Some(FieldValue::from("registrar")));

    let mut response = TransformResponse::new();
    response.append(catalogue::dns_name().create("www.example.com"));
    let rendered = MaltegoMessage::from(response.clone()).render().unwrap();
    assert!(rendered.contains(r#"<Entity Type="maltego.DNSName">"#));

    match MaltegoMessage::from_xml(&rendered).unwrap() {
        MaltegoMessage::Response(decoded) => assert_eq!(decoded, response),
        other => panic!("expected a response, got {}", other.kind()),
    }
}

#[test]
fn test_generic_entity_keeps_base_fields() {
    let mut entity = Entity::generic("anything");
    entity.set("notes#", "first seen in logs").unwrap();
    assert_eq!(entity.type_name(), "maltego.Entity");
    assert_eq!(entity.get("notes#").unwrap(), Some(FieldValue::from("first seen in logs")));
}
