//! The base entity and the built-in entity variants.

use std::sync::{Arc, OnceLock};

use crate::entity::registry::EntityRegistry;
use crate::entity::variant::{EntityVariant, VariantBuilder};
use crate::field::{FieldDecl, FieldKind, MatchingRule};

/// Fields every variant inherits unless it is built standalone.
pub fn base() -> Arc<EntityVariant> {
    static BASE: OnceLock<Arc<EntityVariant>> = OnceLock::new();
    Arc::clone(BASE.get_or_init(|| {
        VariantBuilder::new("Entity")
            .standalone()
            .field(
                FieldDecl::new("notes#")
                    .property("notes")
                    .display_name("Notes")
                    .matching_rule(MatchingRule::Loose),
            )
            .field(
                FieldDecl::new("bookmark#")
                    .property("bookmark")
                    .display_name("Bookmark")
                    .matching_rule(MatchingRule::Loose)
                    .kind(FieldKind::Integer),
            )
            .field(
                FieldDecl::link("maltego.link.label")
                    .property("linklabel")
                    .display_name("Label")
                    .matching_rule(MatchingRule::Loose),
            )
            .field(
                FieldDecl::link("maltego.link.style")
                    .property("linkstyle")
                    .display_name("Style")
                    .matching_rule(MatchingRule::Loose)
                    .kind(FieldKind::Integer),
            )
            .field(
                FieldDecl::link("maltego.link.show-label")
                    .property("linkshowlabel")
                    .display_name("Show Label")
                    .matching_rule(MatchingRule::Loose)
                    .kind(FieldKind::choices([0, 1])),
            )
            .field(
                FieldDecl::link("maltego.link.color")
                    .property("linkcolor")
                    .display_name("Color")
                    .matching_rule(MatchingRule::Loose)
                    .kind(FieldKind::String),
            )
            .field(
                FieldDecl::link("maltego.link.thickness")
                    .property("linkthickness")
                    .display_name("Thickness")
                    .matching_rule(MatchingRule::Loose)
                    .kind(FieldKind::Integer),
            )
            .build()
    }))
}

pub fn phrase() -> Arc<EntityVariant> {
    VariantBuilder::new("Phrase")
        .field(FieldDecl::new("text").display_name("Text").value_pivot())
        .build()
}

pub fn person() -> Arc<EntityVariant> {
    VariantBuilder::new("Person")
        .field(
            FieldDecl::new("person.fullname")
                .property("fullname")
                .display_name("Full Name")
                .value_pivot(),
        )
        .field(
            FieldDecl::new("person.firstnames")
                .property("firstnames")
                .display_name("First Names"),
        )
        .field(FieldDecl::new("person.lastname").property("lastname").display_name("Surname"))
        .build()
}

pub fn email_address() -> Arc<EntityVariant> {
    VariantBuilder::new("EmailAddress")
        .field(FieldDecl::new("email").display_name("Email Address").value_pivot())
        .build()
}

pub fn domain() -> Arc<EntityVariant> {
    VariantBuilder::new("Domain")
        .field(FieldDecl::new("fqdn").display_name("Domain Name").value_pivot())
        .field(
            FieldDecl::new("whois-info")
                .property("whois_info")
                .display_name("WHOIS Info")
                .matching_rule(MatchingRule::Loose),
        )
        .build()
}

pub fn dns_name() -> Arc<EntityVariant> {
    VariantBuilder::new("DNSName")
        .field(FieldDecl::new("fqdn").display_name("DNS Name").value_pivot())
        .build()
}

pub fn ipv4_address() -> Arc<EntityVariant> {
    VariantBuilder::new("IPv4Address")
        .field(
            FieldDecl::new("ipv4-address")
                .property("ipv4address")
                .display_name("IP Address")
                .value_pivot(),
        )
        .field(
            FieldDecl::new("ipaddress.internal")
                .property("internal")
                .display_name("Internal")
                .matching_rule(MatchingRule::Loose)
                .kind(FieldKind::Boolean),
        )
        .build()
}

/// A website is a DNS name with a few extra fields.
pub fn website() -> Arc<EntityVariant> {
    VariantBuilder::new("Website")
        .extends(&dns_name())
        .field(FieldDecl::new("fqdn").display_name("Website").value_pivot())
        .field(
            FieldDecl::new("website.ssl-enabled")
                .property("ssl_enabled")
                .display_name("SSL Enabled")
                .matching_rule(MatchingRule::Loose)
                .kind(FieldKind::Boolean),
        )
        .field(
            FieldDecl::new("ports")
                .display_name("Ports")
                .matching_rule(MatchingRule::Loose),
        )
        .build()
}

pub fn url() -> Arc<EntityVariant> {
    VariantBuilder::new("URL")
        .field(FieldDecl::new("url").display_name("URL").value_pivot())
        .field(
            FieldDecl::new("short-title")
                .property("short_title")
                .display_name("Short title")
                .matching_rule(MatchingRule::Loose),
        )
        .field(
            FieldDecl::new("title")
                .display_name("Title")
                .matching_rule(MatchingRule::Loose),
        )
        .build()
}

pub fn phone_number() -> Arc<EntityVariant> {
    let part = |name: &str, property: &str, display_name: &str| {
        FieldDecl::new(name)
            .property(property)
            .display_name(display_name)
            .matching_rule(MatchingRule::Loose)
    };
    VariantBuilder::new("PhoneNumber")
        .field(
            FieldDecl::new("phonenumber")
                .display_name("Phone Number")
                .value_pivot(),
        )
        .field(part("phonenumber.countrycode", "countrycode", "Country Code"))
        .field(part("phonenumber.citycode", "citycode", "City Code"))
        .field(part("phonenumber.areacode", "areacode", "Area Code"))
        .field(part("phonenumber.lastnumbers", "lastnumbers", "Last Digits"))
        .build()
}

pub fn location() -> Arc<EntityVariant> {
    let loose = |name: &str, display_name: &str| {
        FieldDecl::new(name)
            .display_name(display_name)
            .matching_rule(MatchingRule::Loose)
    };
    VariantBuilder::new("Location")
        .field(
            FieldDecl::new("location.name")
                .property("name")
                .display_name("Name")
                .value_pivot(),
        )
        .field(loose("country", "Country"))
        .field(loose("city", "City"))
        .field(loose("streetaddress", "Street Address"))
        .field(loose("location.area", "Area").property("area"))
        .field(loose("countrycode", "Country Code"))
        .field(loose("location.areacode", "Area Code").property("areacode"))
        .field(loose("latitude", "Latitude").kind(FieldKind::Float))
        .field(loose("longitude", "Longitude").kind(FieldKind::Float))
        .build()
}

pub fn autonomous_system() -> Arc<EntityVariant> {
    VariantBuilder::new("AS")
        .field(
            FieldDecl::new("as.number")
                .property("number")
                .display_name("AS Number")
                .kind(FieldKind::Integer)
                .value_pivot(),
        )
        .build()
}

/// Every built-in variant, the base entity first.
pub fn builtins() -> Vec<Arc<EntityVariant>> {
    vec![
        base(),
        phrase(),
        person(),
        email_address(),
        domain(),
        dns_name(),
        ipv4_address(),
        website(),
        url(),
        phone_number(),
        location(),
        autonomous_system(),
    ]
}

pub fn register_builtins(registry: &mut EntityRegistry) {
    for variant in builtins() {
        registry.register(variant);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityError;
    use crate::value::FieldValue;

    #[test]
    fn test_base_is_shared() {
        assert!(Arc::ptr_eq(&base(), &base()));
        assert_eq!(base().type_name(), "maltego.Entity");
    }

    #[test]
    fn test_show_label_choices() {
        let mut entity = phrase().create("hello");
        let err = entity.set("link#maltego.link.show-label", 2).unwrap_err();
        assert!(matches!(err, EntityError::ValidationError { .. }));

        entity.set("link#maltego.link.show-label", 1).unwrap();
        assert_eq!(entity.element().field_value("link#maltego.link.show-label"), Some("1"));
    }

    #[test]
    fn test_link_color_is_free_text() {
        let mut entity = phrase().create("hello");
        entity.set("link#maltego.link.color", "#AABBCC").unwrap();
        assert_eq!(entity.get_property("linkcolor").unwrap(), Some(FieldValue::from("#AABBCC")));

        entity.set("link#maltego.link.color", "dark red").unwrap();
        assert_eq!(entity.element().field_value("link#maltego.link.color"), Some("dark red"));
        assert_eq!(
            phrase().descriptor("linkcolor").map(|d| d.kind_name()),
            Some("string")
        );
    }

    #[test]
    fn test_website_overrides_dns_name_pivot() {
        let site = website();
        let fqdn = site.descriptor_for("fqdn").unwrap();
        assert_eq!(fqdn.display_name(), Some("Website"));
        assert!(site.value_property().unwrap().is_value());
        assert!(site.descriptor_for("notes#").is_some());
    }

    #[test]
    fn test_as_number_pivot_is_typed() {
        let mut entity = autonomous_system().create("");
        entity.set("as.number", 13335).unwrap();
        assert_eq!(entity.value(), Some("13335"));
        assert_eq!(entity.get("as.number").unwrap(), Some(FieldValue::Int(13335)));
        assert!(entity.set("as.number", "cloudflare").is_err());
    }

    #[test]
    fn test_every_builtin_has_a_pivot() {
        for variant in builtins().into_iter().skip(1) {
            assert!(variant.value_property().is_some(), "{} has no value field", variant.type_name());
        }
    }
}
