//! Transform list envelope: the transforms a server offers and the OAuth
//! authenticators they rely on.

use std::fmt;
use std::str::FromStr;

use crate::xml::{
    decode_list, encode_list, expect_tag, parse_attr, parse_bool_attr, parse_child_text, XmlError, XmlModel,
    XmlNode,
};

/// User input a transform asks for before it runs.
///
/// A non-optional `string` input without a default value is prompted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRequirement {
    pub name: String,
    /// `int` or `string`
    pub kind: String,
    pub display: String,
    pub default_value: Option<String>,
    pub optional: bool,
}

impl InputRequirement {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            display: display.into(),
            default_value: None,
            optional: false,
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

impl XmlModel for InputRequirement {
    const TAG: &'static str = "Input";

    fn to_node(&self) -> XmlNode {
        XmlNode::new(Self::TAG)
            .with_attr("Name", &self.name)
            .with_attr("Type", &self.kind)
            .with_attr("Display", &self.display)
            .with_opt_attr("DefaultValue", self.default_value.as_ref())
            .with_attr("Optional", self.optional)
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        Ok(Self {
            name: node.required_attr("Name")?.to_string(),
            kind: node.required_attr("Type")?.to_string(),
            display: node.required_attr("Display")?.to_string(),
            default_value: node.attr("DefaultValue").map(str::to_string),
            optional: parse_bool_attr(node, "Optional")?.unwrap_or(false),
        })
    }
}

struct OutputEntity(String);

impl XmlModel for OutputEntity {
    const TAG: &'static str = "OutputEntity";

    fn to_node(&self) -> XmlNode {
        XmlNode::new(Self::TAG).with_text(self.0.as_str())
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        Ok(Self(node.text().to_string()))
    }
}

/// One transform offered by a server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformDescriptor {
    pub owner: String,
    pub author: String,
    pub version: String,
    pub max_input: u32,
    pub max_output: u32,
    pub location_relevance: String,
    pub description: Option<String>,
    pub disclaimer: Option<String>,
    pub display_name: String,
    pub transform_name: String,
    pub input_requirements: Vec<InputRequirement>,
    pub output_entities: Vec<String>,
    pub input_entity: String,
}

impl XmlModel for TransformDescriptor {
    const TAG: &'static str = "Transform";

    fn to_node(&self) -> XmlNode {
        let outputs: Vec<OutputEntity> = self.output_entities.iter().cloned().map(OutputEntity).collect();
        XmlNode::new(Self::TAG)
            .with_attr("owner", &self.owner)
            .with_attr("Author", &self.author)
            .with_attr("Version", &self.version)
            .with_attr("MaxEntityInputCount", self.max_input)
            .with_attr("MaxEntityOutputCount", self.max_output)
            .with_attr("LocationRelevance", &self.location_relevance)
            .with_opt_attr("Description", self.description.as_ref())
            .with_opt_attr("Disclaimer", self.disclaimer.as_ref())
            .with_attr("UIDisplayName", &self.display_name)
            .with_attr("TransformName", &self.transform_name)
            .with_child(encode_list("UIInputRequirements", &self.input_requirements))
            .with_child(encode_list("OutputEntities", &outputs))
            .with_child(XmlNode::new("InputEntity").with_text(self.input_entity.as_str()))
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        let text_attr = |name: &str| node.attr(name).unwrap_or_default().to_string();

        Ok(Self {
            owner: text_attr("owner"),
            author: text_attr("Author"),
            version: text_attr("Version"),
            max_input: parse_attr(node, "MaxEntityInputCount")?.unwrap_or(0),
            max_output: parse_attr(node, "MaxEntityOutputCount")?.unwrap_or(0),
            location_relevance: text_attr("LocationRelevance"),
            description: node.attr("Description").map(str::to_string),
            disclaimer: node.attr("Disclaimer").map(str::to_string),
            display_name: text_attr("UIDisplayName"),
            transform_name: node.required_attr("TransformName")?.to_string(),
            input_requirements: decode_list(node.child("UIInputRequirements"))?,
            output_entities: decode_list::<OutputEntity>(node.child("OutputEntities"))?
                .into_iter()
                .map(|o| o.0)
                .collect(),
            input_entity: node.child_text("InputEntity").unwrap_or_default().to_string(),
        })
    }
}

/// OAuth protocol version understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthVersion {
    V1a,
    V2,
}

impl fmt::Display for OAuthVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OAuthVersion::V1a => f.write_str("1.0a"),
            OAuthVersion::V2 => f.write_str("2.0"),
        }
    }
}

impl FromStr for OAuthVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.0a" => Ok(OAuthVersion::V1a),
            "2.0" => Ok(OAuthVersion::V2),
            other => Err(format!("unsupported OAuth version: {}", other)),
        }
    }
}

/// OAuth authenticator definition.
///
/// For 1.0a the authorization URL may contain `{token}`; for 2.0 it may
/// contain `{apiKey}` and `{callback}`. The client fills them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthAuthenticator {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub version: OAuthVersion,
    pub callback_port: Option<u16>,
    pub access_token_endpoint: String,
    pub request_token_endpoint: Option<String>,
    pub authorization_url: String,
    pub app_key: String,
    pub app_secret: String,
    pub icon: String,
    pub access_token_input: String,
    pub access_token_public_key: String,
}

impl XmlModel for OAuthAuthenticator {
    const TAG: &'static str = "OAuthAuthenticator";

    fn to_node(&self) -> XmlNode {
        let text = |name: &str, value: &str| XmlNode::new(name).with_text(value);
        XmlNode::new(Self::TAG)
            .with_attr("Name", &self.name)
            .with_attr("DisplayName", &self.display_name)
            .with_opt_text_child("Description", self.description.as_ref())
            .with_child(text("OAuthVersion", &self.version.to_string()))
            .with_opt_text_child("CallbackPort", self.callback_port)
            .with_child(text("AccessTokenEndpoint", &self.access_token_endpoint))
            .with_opt_text_child("RequestTokenEndpoint", self.request_token_endpoint.as_ref())
            .with_child(text("AuthorizationUrl", &self.authorization_url))
            .with_child(text("AppKey", &self.app_key))
            .with_child(text("AppSecret", &self.app_secret))
            .with_child(text("Icon", &self.icon))
            .with_child(text("AccessTokenInput", &self.access_token_input))
            .with_child(text("AccessTokenPublicKey", &self.access_token_public_key))
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        let text = |name: &str| node.child_text(name).unwrap_or_default().to_string();

        Ok(Self {
            name: node.required_attr("Name")?.to_string(),
            display_name: node.attr("DisplayName").unwrap_or_default().to_string(),
            description: node.child_text("Description").map(str::to_string),
            version: match parse_child_text(node, "OAuthVersion")? {
                Some(version) => version,
                None => {
                    return Err(XmlError::MissingElement {
                        parent: node.name.clone(),
                        name: "OAuthVersion".to_string(),
                    })
                }
            },
            callback_port: parse_child_text(node, "CallbackPort")?,
            access_token_endpoint: text("AccessTokenEndpoint"),
            request_token_endpoint: node.child_text("RequestTokenEndpoint").map(str::to_string),
            authorization_url: text("AuthorizationUrl"),
            app_key: text("AppKey"),
            app_secret: text("AppSecret"),
            icon: text("Icon"),
            access_token_input: text("AccessTokenInput"),
            access_token_public_key: text("AccessTokenPublicKey"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authenticators {
    pub oauth: Vec<OAuthAuthenticator>,
}

impl XmlModel for Authenticators {
    const TAG: &'static str = "Authenticators";

    fn to_node(&self) -> XmlNode {
        let mut node = XmlNode::new(Self::TAG);
        if !self.oauth.is_empty() {
            node.push(encode_list("OAuthAuthenticators", &self.oauth));
        }
        node
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        Ok(Self {
            oauth: decode_list(node.child("OAuthAuthenticators"))?,
        })
    }
}

/// Transforms offered by a server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformListMessage {
    pub transforms: Vec<TransformDescriptor>,
    pub authenticators: Option<Authenticators>,
}

impl XmlModel for TransformListMessage {
    const TAG: &'static str = "MaltegoTransformListMessage";

    fn to_node(&self) -> XmlNode {
        let mut node = XmlNode::new(Self::TAG);
        if !self.transforms.is_empty() {
            node.push(encode_list("Transforms", &self.transforms));
        }
        if let Some(authenticators) = &self.authenticators {
            node.push(authenticators.to_node());
        }
        node
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        Ok(Self {
            transforms: decode_list(node.child("Transforms"))?,
            authenticators: node.child(Authenticators::TAG).map(Authenticators::from_node).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_descriptor_round_trip() {
        let transform = TransformDescriptor {
            owner: "ACME".to_string(),
            author: "ops".to_string(),
            version: "1.0".to_string(),
            location_relevance: "global".to_string(),
            display_name: "To Domain".to_string(),
            transform_name: "acme.v2.ToDomain".to_string(),
            input_requirements: vec![InputRequirement::new("depth", "int", "Depth").with_default("1")],
            output_entities: vec!["Any".to_string()],
            input_entity: "Phrase".to_string(),
            ..TransformDescriptor::default()
        };
        let message = TransformListMessage {
            transforms: vec![transform],
            authenticators: None,
        };

        let parsed = TransformListMessage::from_xml(&message.render().unwrap()).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_oauth_authenticator() {
        let xml = r#"
            <Authenticators><OAuthAuthenticators>
                <OAuthAuthenticator Name="twitter" DisplayName="Twitter">
                    <OAuthVersion>1.0a</OAuthVersion>
                    <CallbackPort>8080</CallbackPort>
                    <AuthorizationUrl>https://api.example/authorize?token={token}</AuthorizationUrl>
                </OAuthAuthenticator>
            </OAuthAuthenticators></Authenticators>"#;
        let authenticators = Authenticators::from_xml(xml).unwrap();
        let oauth = &authenticators.oauth[0];

        assert_eq!(oauth.version, OAuthVersion::V1a);
        assert_eq!(oauth.callback_port, Some(8080));
        assert_eq!(oauth.request_token_endpoint, None);
        assert!(oauth.authorization_url.ends_with("{token}"));
    }

    #[test]
    fn test_oauth_version_required() {
        let xml = r#"<OAuthAuthenticator Name="x"/>"#;
        assert!(matches!(
            OAuthAuthenticator::from_xml(xml),
            Err(XmlError::MissingElement { .. })
        ));
    }
}
