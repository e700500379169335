//! Discovery envelope: seed servers and transform application servers.

use crate::xml::{decode_list, encode_list, expect_tag, parse_bool_attr, XmlError, XmlModel, XmlNode};

pub const DEFAULT_APPLICATION_NAME: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformApplication {
    pub name: String,
    pub url: String,
    pub registration_url: Option<String>,
    pub require_api_key: bool,
}

impl TransformApplication {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_APPLICATION_NAME.to_string(),
            url: url.into(),
            registration_url: None,
            require_api_key: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl XmlModel for TransformApplication {
    const TAG: &'static str = "TransformApplication";

    fn to_node(&self) -> XmlNode {
        XmlNode::new(Self::TAG)
            .with_attr("name", &self.name)
            .with_attr("URL", &self.url)
            .with_opt_attr("registrationURL", self.registration_url.as_ref())
            .with_attr("requireAPIKey", self.require_api_key)
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        Ok(Self {
            name: node.attr("name").unwrap_or(DEFAULT_APPLICATION_NAME).to_string(),
            url: node.required_attr("URL")?.to_string(),
            registration_url: node.attr("registrationURL").map(str::to_string),
            require_api_key: parse_bool_attr(node, "requireAPIKey")?.unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedServer {
    pub url: String,
}

impl XmlModel for SeedServer {
    const TAG: &'static str = "SeedServer";

    fn to_node(&self) -> XmlNode {
        XmlNode::new(Self::TAG).with_attr("URL", &self.url)
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        Ok(Self {
            url: node.required_attr("URL")?.to_string(),
        })
    }
}

/// Answer to a client looking for seed and application servers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryMessage {
    pub source: Option<String>,
    pub seed_servers: Vec<SeedServer>,
    pub applications: Vec<TransformApplication>,
}

impl XmlModel for DiscoveryMessage {
    const TAG: &'static str = "MaltegoTransformDiscoveryMessage";

    fn to_node(&self) -> XmlNode {
        let mut node = XmlNode::new(Self::TAG).with_opt_attr("source", self.source.as_ref());
        if !self.seed_servers.is_empty() {
            node.push(encode_list("OtherSeedServers", &self.seed_servers));
        }
        node.with_child(encode_list("TransformApplications", &self.applications))
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        Ok(Self {
            source: node.attr("source").map(str::to_string),
            seed_servers: decode_list(node.child("OtherSeedServers"))?,
            applications: decode_list(Some(node.required_child("TransformApplications")?))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_discovery() {
        let xml = r#"
            <MaltegoTransformDiscoveryMessage source="ctas">
                <OtherSeedServers><SeedServer URL="https://seed.example"/></OtherSeedServers>
                <TransformApplications>
                    <TransformApplication URL="https://tas.example" requireAPIKey="true"/>
                </TransformApplications>
            </MaltegoTransformDiscoveryMessage>"#;
        let message = DiscoveryMessage::from_xml(xml).unwrap();

        assert_eq!(message.source.as_deref(), Some("ctas"));
        assert_eq!(message.seed_servers[0].url, "https://seed.example");
        let app = &message.applications[0];
        assert_eq!(app.name, "Unknown");
        assert!(app.require_api_key);
    }

    #[test]
    fn test_applications_required() {
        let err = DiscoveryMessage::from_xml("<MaltegoTransformDiscoveryMessage/>").unwrap_err();
        assert!(matches!(err, XmlError::MissingElement { .. }));
    }
}
