//! Capability definition — one named operation the dispatch engine can run.
//!
//! A capability bundles:
//! - a unique `name` (the intent it answers),
//! - a human-readable `description` (documentation and telemetry only),
//! - a declarative argument schema (advisory; extraction is best-effort),
//! - the keyword predicate used by the intent matcher,
//! - the argument extractor that turns raw text into arguments,
//! - the asynchronous handler that produces the answer text.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::dispatch::args::ArgExtractor;
use crate::dispatch::intent::IntentPredicate;

/// Arguments handed to a capability handler.
///
/// Missing fields are either absent or `null`; handlers must tolerate both.
pub type CapabilityArgs = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Errors a capability handler may report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// A required argument was absent or null.
    #[error("missing required argument '{0}'")]
    MissingArgument(String),

    /// An argument was present but unusable.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    /// The handler's backing data source failed.
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    /// The handler panicked; the payload message is kept.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// Any other handler failure.
    #[error("{0}")]
    Failed(String),
}

/// Asynchronous function mapping extracted arguments to result text.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn run(&self, args: &CapabilityArgs) -> Result<String, HandlerError>;
}

/// Adapts a closure returning a future into a [`CapabilityHandler`].
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> CapabilityHandler for FnHandler<F>
where
    F: Fn(CapabilityArgs) -> BoxFuture<'static, Result<String, HandlerError>> + Send + Sync,
{
    async fn run(&self, args: &CapabilityArgs) -> Result<String, HandlerError> {
        (self.func)(args.clone()).await
    }
}

// ---------------------------------------------------------------------------
// Argument schema
// ---------------------------------------------------------------------------

/// Schema for a single capability argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgSchema {
    /// Argument type: "string", "integer", "number", "boolean", "array", "object"
    #[serde(rename = "type")]
    pub arg_type: String,

    /// Whether this argument is expected to be present
    #[serde(default)]
    pub required: bool,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Nested field schemas (for object types)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ArgSchema>,
}

impl ArgSchema {
    pub fn new(arg_type: impl Into<String>) -> Self {
        Self {
            arg_type: arg_type.into(),
            required: false,
            description: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>, schema: ArgSchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Whether `value` has this schema's JSON type. `null` never matches.
    pub fn accepts(&self, value: &Value) -> bool {
        match self.arg_type.as_str() {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// A registered, answerable intent.
#[derive(Clone)]
pub struct Capability {
    /// Unique identifier within the registry (e.g. "getWalletInfo")
    pub name: String,

    /// Human-readable summary; not used for matching
    pub description: String,

    /// Declared argument shape, keyed by argument name
    pub args_schema: BTreeMap<String, ArgSchema>,

    /// Predicate the intent matcher evaluates over lower-cased text
    pub intent: IntentPredicate,

    /// Heuristic that builds arguments from raw text
    pub extractor: ArgExtractor,

    handler: Arc<dyn CapabilityHandler>,
}

impl Capability {
    /// Create a capability that never matches and takes no arguments.
    /// Use the `with_*` builders to attach its intent and extractor.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn CapabilityHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            args_schema: BTreeMap::new(),
            intent: IntentPredicate::Never,
            extractor: ArgExtractor::Empty,
            handler,
        }
    }

    /// Create a capability from an async closure.
    pub fn from_fn<F, Fut>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(CapabilityArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, HandlerError>> + Send + 'static,
    {
        let handler = FnHandler::new(
            move |args| -> BoxFuture<'static, Result<String, HandlerError>> { Box::pin(func(args)) },
        );
        Self::new(name, description, Arc::new(handler))
    }

    pub fn with_intent(mut self, intent: IntentPredicate) -> Self {
        self.intent = intent;
        self
    }

    pub fn with_extractor(mut self, extractor: ArgExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_arg(mut self, name: impl Into<String>, schema: ArgSchema) -> Self {
        self.args_schema.insert(name.into(), schema);
        self
    }

    /// Compare `args` against the declared schema.
    ///
    /// Returns one message per mismatch. The result is advisory: callers
    /// log it and still run the handler.
    pub fn schema_mismatches(&self, args: &CapabilityArgs) -> Vec<String> {
        let mut problems = Vec::new();
        for (name, schema) in &self.args_schema {
            match args.get(name) {
                None | Some(Value::Null) if schema.required => {
                    problems.push(format!("'{}' is required but absent", name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !schema.accepts(value) => {
                    problems.push(format!("'{}' is not of type {}", name, schema.arg_type));
                }
                Some(_) => {}
            }
        }
        problems
    }

    /// Run the handler with already-extracted arguments.
    pub async fn run(&self, args: &CapabilityArgs) -> Result<String, HandlerError> {
        self.handler.run(args).await
    }

    /// Serializable view used by the capability listing endpoint.
    pub fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            args_schema: self.args_schema.clone(),
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("args_schema", &self.args_schema)
            .field("intent", &self.intent)
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}

/// Public, handler-free description of a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub args_schema: BTreeMap<String, ArgSchema>,
}
