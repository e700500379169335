//! Transform registry for registering and running transforms.
//!
//! A transform is a function from a [`TransformRequest`] to a
//! [`TransformResponse`], registered together with its [`TransformSpec`].
//! Running a transform always yields a well-formed message: failures are
//! converted into an exception envelope rather than propagated.

use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::entity::variant::EntityVariant;
use crate::error::EntityError;
use crate::message::exception::{ExceptionMessage, TransformException};
use crate::message::request::TransformRequest;
use crate::message::response::TransformResponse;
use crate::message::transform_list::{InputRequirement, TransformDescriptor, TransformListMessage};
use crate::message::MaltegoMessage;
use crate::xml::XmlError;

/// Error type for transform operations
#[derive(Debug, Clone)]
pub enum TransformError {
    NotFound(String),
    InvalidArgs(String),
    ExecutionError(String),
    /// Reported to the client as is, code included.
    Exception(TransformException),
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::NotFound(name) => write!(f, "Transform not found: {}", name),
            TransformError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            TransformError::ExecutionError(msg) => write!(f, "Execution error: {}", msg),
            TransformError::Exception(exception) => write!(f, "{}", exception),
        }
    }
}

impl std::error::Error for TransformError {}

impl From<EntityError> for TransformError {
    fn from(err: EntityError) -> Self {
        TransformError::ExecutionError(err.to_string())
    }
}

impl From<XmlError> for TransformError {
    fn from(err: XmlError) -> Self {
        TransformError::ExecutionError(err.to_string())
    }
}

impl From<TransformException> for TransformError {
    fn from(exception: TransformException) -> Self {
        TransformError::Exception(exception)
    }
}

impl TransformError {
    /// Exception record sent to the client for this error.
    pub fn to_exception(&self) -> TransformException {
        match self {
            TransformError::Exception(exception) => exception.clone(),
            other => TransformException::new(other.to_string()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

/// One way of invoking a transform: its uuid, the entity variant it takes
/// and the transform sets it belongs to.
#[derive(Debug, Clone)]
pub struct TransformInput {
    pub uuid: String,
    pub variant: Arc<EntityVariant>,
    pub transform_sets: Vec<String>,
}

/// Metadata describing a transform.
///
/// ```ignore
/// let spec = TransformSpec::new("To Email Address")
///     .input("acme.v2.PersonToEmail", &catalogue::person(), ["Acme"])
///     .description("Looks up the email address of a person")
///     .output("maltego.EmailAddress");
/// ```
#[derive(Debug, Clone)]
pub struct TransformSpec {
    pub label: String,
    pub inputs: Vec<TransformInput>,
    pub owner: String,
    pub author: String,
    pub version: String,
    pub description: Option<String>,
    pub disclaimer: Option<String>,
    pub outputs: Vec<String>,
    pub debug: bool,
    pub remote: bool,
    pub input_requirements: Vec<InputRequirement>,
}

pub const DEFAULT_OUTPUT: &str = "Any";

impl TransformSpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            inputs: Vec::new(),
            owner: String::new(),
            author: String::new(),
            version: "1.0".to_string(),
            description: None,
            disclaimer: None,
            outputs: Vec::new(),
            debug: false,
            remote: false,
            input_requirements: Vec::new(),
        }
    }

    /// Add an input. An empty set list puts the transform in the unnamed
    /// set.
    pub fn input<I, S>(mut self, uuid: impl Into<String>, variant: &Arc<EntityVariant>, transform_sets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut transform_sets: Vec<String> = transform_sets.into_iter().map(Into::into).collect();
        if transform_sets.is_empty() {
            transform_sets.push(String::new());
        }
        self.inputs.push(TransformInput {
            uuid: uuid.into(),
            variant: Arc::clone(variant),
            transform_sets,
        });
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn disclaimer(mut self, disclaimer: impl Into<String>) -> Self {
        self.disclaimer = Some(disclaimer.into());
        self
    }

    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.outputs.push(output.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn remote(mut self, remote: bool) -> Self {
        self.remote = remote;
        self
    }

    pub fn input_requirement(mut self, requirement: InputRequirement) -> Self {
        self.input_requirements.push(requirement);
        self
    }

    pub fn uuids(&self) -> Vec<&str> {
        self.inputs.iter().map(|i| i.uuid.as_str()).collect()
    }

    /// Declared outputs, `Any` when none were given.
    pub fn outputs(&self) -> Vec<String> {
        if self.outputs.is_empty() {
            vec![DEFAULT_OUTPUT.to_string()]
        } else {
            self.outputs.clone()
        }
    }

    pub fn validate(&self) -> Result<(), TransformError> {
        if self.label.trim().is_empty() {
            return Err(TransformError::InvalidArgs("transform label is required".to_string()));
        }
        if self.inputs.is_empty() {
            return Err(TransformError::InvalidArgs(format!(
                "transform '{}' declares no inputs",
                self.label
            )));
        }
        if let Some(input) = self.inputs.iter().find(|i| i.uuid.trim().is_empty()) {
            return Err(TransformError::InvalidArgs(format!(
                "transform '{}' has an input for {} without a uuid",
                self.label,
                input.variant.type_name()
            )));
        }
        Ok(())
    }

    /// Transform list entry advertising this transform under its first
    /// input.
    pub fn to_descriptor(&self) -> TransformDescriptor {
        let first = self.inputs.first();
        TransformDescriptor {
            owner: self.owner.clone(),
            author: self.author.clone(),
            version: self.version.clone(),
            max_input: 0,
            max_output: 0,
            location_relevance: "global".to_string(),
            description: self.description.clone(),
            disclaimer: self.disclaimer.clone(),
            display_name: self.label.clone(),
            transform_name: first.map(|i| i.uuid.clone()).unwrap_or_default(),
            input_requirements: self.input_requirements.clone(),
            output_entities: self.outputs(),
            input_entity: first.map(|i| i.variant.name().to_string()).unwrap_or_default(),
        }
    }
}

/// Trait for transform functions
pub trait TransformFn: Send + Sync {
    /// Execute the transform, appending results to `response`.
    fn execute(&self, request: &TransformRequest, response: &mut TransformResponse) -> Result<(), TransformError>;
}

/// Simple function-based implementation of TransformFn
impl<F> TransformFn for F
where
    F: Fn(&TransformRequest, &mut TransformResponse) -> Result<(), TransformError> + Send + Sync,
{
    fn execute(&self, request: &TransformRequest, response: &mut TransformResponse) -> Result<(), TransformError> {
        self(request, response)
    }
}

struct RegisteredTransform {
    spec: TransformSpec,
    func: Box<dyn TransformFn>,
}

/// Registry for storing and running transforms, keyed by input uuid.
pub struct TransformRegistry {
    transforms: IndexMap<String, Arc<RegisteredTransform>>,
}

impl TransformRegistry {
    /// Create a new empty transform registry
    pub fn new() -> Self {
        Self {
            transforms: IndexMap::new(),
        }
    }

    /// Register a transform under every uuid of its spec.
    ///
    /// # Example
    ///
    /// ```ignore
    /// registry.register(spec, Box::new(|request: &TransformRequest, response: &mut TransformResponse| {
    ///     let value = request.value()?.unwrap_or_default();
    ///     response.append(catalogue::phrase().create(value.to_uppercase()));
    ///     Ok(())
    /// }))?;
    /// ```
    pub fn register(&mut self, spec: TransformSpec, func: Box<dyn TransformFn>) -> Result<(), TransformError> {
        spec.validate()?;
        let uuids: Vec<String> = spec.uuids().into_iter().map(str::to_string).collect();
        let registered = Arc::new(RegisteredTransform { spec, func });
        for uuid in uuids {
            debug!("Registering transform '{}' as {}", registered.spec.label, uuid);
            self.transforms.insert(uuid, Arc::clone(&registered));
        }
        Ok(())
    }

    /// Call a registered transform and return its response or error.
    pub fn call(&self, name: &str, request: &TransformRequest) -> Result<TransformResponse, TransformError> {
        let transform = self
            .transforms
            .get(name)
            .ok_or_else(|| TransformError::NotFound(name.to_string()))?;

        let mut response = TransformResponse::new();
        transform.func.execute(request, &mut response)?;
        Ok(response)
    }

    /// Run a transform; any failure becomes an exception envelope,
    /// including a panic inside the transform function.
    pub fn run(&self, name: &str, request: &TransformRequest) -> MaltegoMessage {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.call(name, request)))
            .unwrap_or_else(|payload| {
                Err(TransformError::ExecutionError(format!(
                    "transform panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
        match result {
            Ok(response) => MaltegoMessage::Response(response),
            Err(err) => {
                warn!("Transform {} failed: {}", name, err);
                MaltegoMessage::Exception(ExceptionMessage::from(err.to_exception()))
            }
        }
    }

    /// Check if a transform is registered
    pub fn has_transform(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    pub fn spec(&self, name: &str) -> Option<&TransformSpec> {
        self.transforms.get(name).map(|t| &t.spec)
    }

    /// Get list of all registered transform uuids
    pub fn list_transforms(&self) -> Vec<String> {
        self.transforms.keys().cloned().collect()
    }

    /// Transform list advertising every registered transform once.
    pub fn list_message(&self) -> TransformListMessage {
        let mut seen: Vec<&Arc<RegisteredTransform>> = Vec::new();
        for transform in self.transforms.values() {
            if !seen.iter().any(|t| Arc::ptr_eq(t, transform)) {
                seen.push(transform);
            }
        }
        TransformListMessage {
            transforms: seen.iter().map(|t| t.spec.to_descriptor()).collect(),
            authenticators: None,
        }
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::catalogue;
    use crate::entity::registry::EntityRegistry;

    fn upper_spec() -> TransformSpec {
        TransformSpec::new("To Upper Case")
            .input("test.ToUpper", &catalogue::phrase(), Vec::<String>::new())
            .input("test.PersonToUpper", &catalogue::person(), ["People"])
            .author("tests")
    }

    fn upper(request: &TransformRequest, response: &mut TransformResponse) -> Result<(), TransformError> {
        let entity = request.entity_in(&EntityRegistry::with_builtins())?;
        let value = entity.value().unwrap_or_default().to_uppercase();
        response.append(catalogue::phrase().create(value));
        Ok(())
    }

    fn registry() -> TransformRegistry {
        let mut registry = TransformRegistry::new();
        registry.register(upper_spec(), Box::new(upper)).unwrap();
        registry
    }

    #[test]
    fn test_register_and_call_transform() {
        let registry = registry();
        let request = TransformRequest::new().with_entity(catalogue::phrase().create("hello"));

        let response = registry.call("test.ToUpper", &request).unwrap();
        assert_eq!(response.entities[0].value.as_deref(), Some("HELLO"));
        assert!(registry.has_transform("test.PersonToUpper"));
        assert_eq!(registry.list_transforms(), vec!["test.ToUpper", "test.PersonToUpper"]);
    }

    #[test]
    fn test_empty_sets_become_unnamed_set() {
        let spec = upper_spec();
        assert_eq!(spec.inputs[0].transform_sets, vec![String::new()]);
        assert_eq!(spec.inputs[1].transform_sets, vec!["People".to_string()]);
    }

    #[test]
    fn test_spec_without_inputs_is_rejected() {
        let mut registry = TransformRegistry::new();
        let err = registry
            .register(TransformSpec::new("Nothing"), Box::new(upper))
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidArgs(_)));
    }

    #[test]
    fn test_unknown_transform_becomes_exception() {
        let message = registry().run("test.Missing", &TransformRequest::new());
        match message {
            MaltegoMessage::Exception(exception) => {
                assert_eq!(exception.exceptions[0].text, "Transform not found: test.Missing")
            }
            other => panic!("expected an exception, got {}", other.kind()),
        }
    }

    #[test]
    fn test_entity_errors_become_exceptions() {
        let request = TransformRequest::new().with_entity(
            crate::message::element::EntityElement::new("acme.Unregistered").with_value("x"),
        );
        let message = registry().run("test.ToUpper", &request);
        assert!(message.is_exception());
    }

    #[test]
    fn test_coded_exception_keeps_code() {
        let mut registry = TransformRegistry::new();
        registry
            .register(
                TransformSpec::new("Quota").input("test.Quota", &catalogue::phrase(), ["Limits"]),
                Box::new(
                    |_: &TransformRequest, _: &mut TransformResponse| -> Result<(), TransformError> {
                        Err(TransformException::new("quota exceeded").with_code(429).into())
                    },
                ),
            )
            .unwrap();

        match registry.run("test.Quota", &TransformRequest::new()) {
            MaltegoMessage::Exception(exception) => {
                assert_eq!(exception.exceptions[0].code, Some(429));
                assert_eq!(exception.exceptions[0].text, "quota exceeded");
            }
            other => panic!("expected an exception, got {}", other.kind()),
        }
    }

    #[test]
    fn test_panicking_transform_becomes_exception() {
        let mut registry = TransformRegistry::new();
        registry
            .register(
                TransformSpec::new("Broken").input("test.Broken", &catalogue::phrase(), ["Faulty"]),
                Box::new(
                    |_: &TransformRequest, _: &mut TransformResponse| -> Result<(), TransformError> {
                        panic!("boom")
                    },
                ),
            )
            .unwrap();
        registry
            .register(
                TransformSpec::new("Broken Formatted").input("test.BrokenFormatted", &catalogue::phrase(), ["Faulty"]),
                Box::new(
                    |request: &TransformRequest, _: &mut TransformResponse| -> Result<(), TransformError> {
                        panic!("bad input: {} entities", request.entities.len())
                    },
                ),
            )
            .unwrap();

        match registry.run("test.Broken", &TransformRequest::new()) {
            MaltegoMessage::Exception(exception) => assert!(exception.exceptions[0].text.contains("boom")),
            other => panic!("expected an exception, got {}", other.kind()),
        }
        match registry.run("test.BrokenFormatted", &TransformRequest::new()) {
            MaltegoMessage::Exception(exception) => {
                assert!(exception.exceptions[0].text.contains("bad input: 0 entities"))
            }
            other => panic!("expected an exception, got {}", other.kind()),
        }
        assert!(registry.has_transform("test.Broken"));
    }

    #[test]
    fn test_list_message() {
        let list = registry().list_message();
        assert_eq!(list.transforms.len(), 1);

        let transform = &list.transforms[0];
        assert_eq!(transform.transform_name, "test.ToUpper");
        assert_eq!(transform.input_entity, "Phrase");
        assert_eq!(transform.output_entities, vec!["Any".to_string()]);
        assert_eq!(transform.location_relevance, "global");
        assert_eq!(transform.max_input, 0);
    }
}
