//! # maltego-message: Transform Message Model
//!
//! Typed entities and the XML message envelopes exchanged between a
//! link-analysis client and its transforms.
//!
//! ## Features
//!
//! - **Entity variants**: declarative field tables with inheritance, typed codecs and a value pivot
//! - **Entity registry**: type-name lookup used to decode incoming entities into their variant
//! - **Message envelopes**: request, response, exception, discovery and transform-list documents
//! - **Transform registry**: register handlers by UUID and answer requests with a response or exception
//! - **External transforms**: pipe a request through an external program
//! - **Entity catalogue**: declare extra variants in YAML
//!
//! ## Example: answering a request
//!
//! ```ignore
//! use maltego_message::entity::catalogue;
//! use maltego_message::{MaltegoMessage, TransformRequest, TransformResponse, XmlModel};
//!
//! let message = MaltegoMessage::from_xml(&xml)?;
//! if let MaltegoMessage::Request(request) = message {
//!     let domain = request.entity();
//!     let mut response = TransformResponse::new();
//!     let mut ip = catalogue::ipv4_address().create("93.184.216.34");
//!     ip.set("ipaddress.internal", false)?;
//!     response.append(&ip);
//!     println!("{}", MaltegoMessage::from(response).render()?);
//! }
//! ```
//!
//! ## Example: entity catalogue
//!
//! ```yaml
//! entities:
//!   - name: Hash
//!     namespace: acme
//!     fields:
//!       - name: hash.value
//!         is_value: true
//!       - name: hash.algorithm
//!         type: enum
//!         choices: [md5, sha1, sha256]
//! ```

// Field values and their codecs
pub mod error;
pub mod field;
pub mod timespan;
pub mod value;

// Entity variants and the type registry
pub mod entity;

// XML document model
pub mod message;
pub mod xml;

// Transform dispatch
pub mod external;
pub mod transform;

// YAML entity catalogue
pub mod config;

// Re-export key types
pub use entity::{Entity, EntityRegistry, EntityVariant, VariantBuilder};
pub use error::EntityError;
pub use field::{FieldDecl, FieldDescriptor, FieldKind, MatchingRule};
pub use timespan::TimeSpan;
pub use value::FieldValue;

// Re-export message types
pub use message::element::{EntityElement, EntityItem};
pub use message::exception::{ExceptionMessage, TransformException};
pub use message::request::TransformRequest;
pub use message::response::{TransformResponse, UIMessage, UIMessageType};
pub use message::MaltegoMessage;
pub use xml::{XmlError, XmlModel};

// Re-export transform types
pub use config::{CatalogueConfig, ConfigError};
pub use external::ExternalCommand;
pub use transform::{TransformError, TransformFn, TransformRegistry, TransformSpec};
