//! Message envelopes exchanged between the client and a transform.
//!
//! Every document has a `MaltegoMessage` root holding exactly one envelope:
//!
//! ```text
//! <MaltegoMessage>
//!   <MaltegoTransformRequestMessage>
//!     <Entities>
//!       <Entity Type="maltego.Phrase"><Value>hello</Value></Entity>
//!     </Entities>
//!     <Limits SoftLimit="500" HardLimit="10000"/>
//!   </MaltegoTransformRequestMessage>
//! </MaltegoMessage>
//! ```

pub mod common;
pub mod discovery;
pub mod element;
pub mod exception;
pub mod request;
pub mod response;
pub mod transform_list;

use crate::xml::{expect_tag, XmlError, XmlModel, XmlNode};

use discovery::DiscoveryMessage;
use exception::ExceptionMessage;
use request::TransformRequest;
use response::TransformResponse;
use transform_list::TransformListMessage;

/// Root document: one of the five envelopes.
#[derive(Debug, Clone, PartialEq)]
pub enum MaltegoMessage {
    Discovery(DiscoveryMessage),
    TransformList(TransformListMessage),
    Request(TransformRequest),
    Response(TransformResponse),
    Exception(ExceptionMessage),
}

impl MaltegoMessage {
    /// Wire tag of the wrapped envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            MaltegoMessage::Discovery(_) => DiscoveryMessage::TAG,
            MaltegoMessage::TransformList(_) => TransformListMessage::TAG,
            MaltegoMessage::Request(_) => TransformRequest::TAG,
            MaltegoMessage::Response(_) => TransformResponse::TAG,
            MaltegoMessage::Exception(_) => ExceptionMessage::TAG,
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, MaltegoMessage::Exception(_))
    }
}

impl XmlModel for MaltegoMessage {
    const TAG: &'static str = "MaltegoMessage";

    fn to_node(&self) -> XmlNode {
        let envelope = match self {
            MaltegoMessage::Discovery(m) => m.to_node(),
            MaltegoMessage::TransformList(m) => m.to_node(),
            MaltegoMessage::Request(m) => m.to_node(),
            MaltegoMessage::Response(m) => m.to_node(),
            MaltegoMessage::Exception(m) => m.to_node(),
        };
        XmlNode::new(Self::TAG).with_child(envelope)
    }

    fn from_node(node: &XmlNode) -> Result<Self, XmlError> {
        expect_tag(node, Self::TAG)?;
        let envelope = match node.children.as_slice() {
            [envelope] => envelope,
            [] => {
                return Err(XmlError::MissingElement {
                    parent: Self::TAG.to_string(),
                    name: "envelope".to_string(),
                })
            }
            _ => {
                return Err(XmlError::Parse(format!(
                    "<{}> must hold exactly one envelope, found {}",
                    Self::TAG,
                    node.children.len()
                )))
            }
        };

        let tag = envelope.name.as_str();
        if tag == DiscoveryMessage::TAG {
            DiscoveryMessage::from_node(envelope).map(MaltegoMessage::Discovery)
        } else if tag == TransformListMessage::TAG {
            TransformListMessage::from_node(envelope).map(MaltegoMessage::TransformList)
        } else if tag == TransformRequest::TAG {
            TransformRequest::from_node(envelope).map(MaltegoMessage::Request)
        } else if tag == TransformResponse::TAG {
            TransformResponse::from_node(envelope).map(MaltegoMessage::Response)
        } else if tag == ExceptionMessage::TAG {
            ExceptionMessage::from_node(envelope).map(MaltegoMessage::Exception)
        } else {
            Err(XmlError::UnexpectedElement {
                expected: "a transform message envelope".to_string(),
                found: tag.to_string(),
            })
        }
    }
}

impl From<TransformRequest> for MaltegoMessage {
    fn from(message: TransformRequest) -> Self {
        MaltegoMessage::Request(message)
    }
}

impl From<TransformResponse> for MaltegoMessage {
    fn from(message: TransformResponse) -> Self {
        MaltegoMessage::Response(message)
    }
}

impl From<ExceptionMessage> for MaltegoMessage {
    fn from(message: ExceptionMessage) -> Self {
        MaltegoMessage::Exception(message)
    }
}

impl From<DiscoveryMessage> for MaltegoMessage {
    fn from(message: DiscoveryMessage) -> Self {
        MaltegoMessage::Discovery(message)
    }
}

impl From<TransformListMessage> for MaltegoMessage {
    fn from(message: TransformListMessage) -> Self {
        MaltegoMessage::TransformList(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::exception::TransformException;

    #[test]
    fn test_dispatch_on_envelope_tag() {
        let xml = r#"<MaltegoMessage>
            <MaltegoTransformRequestMessage>
                <Entities><Entity Type="maltego.Phrase"><Value>hi</Value></Entity></Entities>
            </MaltegoTransformRequestMessage>
        </MaltegoMessage>"#;
        match MaltegoMessage::from_xml(xml).unwrap() {
            MaltegoMessage::Request(request) => assert_eq!(request.entities[0].value.as_deref(), Some("hi")),
            other => panic!("expected a request, got {}", other.kind()),
        }
    }

    #[test]
    fn test_exactly_one_envelope() {
        assert!(MaltegoMessage::from_xml("<MaltegoMessage/>").is_err());
        assert!(MaltegoMessage::from_xml(
            "<MaltegoMessage><MaltegoTransformExceptionMessage/><MaltegoTransformExceptionMessage/></MaltegoMessage>"
        )
        .is_err());
        assert!(matches!(
            MaltegoMessage::from_xml("<MaltegoMessage><Other/></MaltegoMessage>"),
            Err(XmlError::UnexpectedElement { .. })
        ));
    }

    #[test]
    fn test_render_wraps_envelope() {
        let message = MaltegoMessage::from(ExceptionMessage::from(TransformException::new("boom")));
        let xml = message.render().unwrap();
        assert!(xml.starts_with("<MaltegoMessage><MaltegoTransformExceptionMessage>"));
        assert!(message.is_exception());
        assert_eq!(MaltegoMessage::from_xml(&xml).unwrap(), message);
    }
}
