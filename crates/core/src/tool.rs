//! Tool trait and registry — the capabilities the model may invoke.
//!
//! A tool has a unique name, a description sent to the model, a JSON Schema
//! for its arguments, and an async `execute`. The registry owns the tools in
//! registration order and validates raw model arguments before dispatch.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RegistryError, ToolError};

/// A tool description as advertised to the completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: Value,
}

/// The core Tool trait.
///
/// Implementations receive arguments that already passed schema validation.
/// A returned [`ToolError`] is never fatal to a run; it becomes the content of
/// the tool-response message.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search_users").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with validated arguments.
    async fn execute(&self, arguments: Value) -> Result<String, ToolError>;

    fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A tool whose arguments are a typed struct.
///
/// The schema is derived from `Args` with `schemars`, and arguments are
/// deserialized before `call`. Wrap with [`typed`] to register it.
#[async_trait]
pub trait TypedTool: Send + Sync {
    type Args: DeserializeOwned + schemars::JsonSchema + Send;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn call(&self, args: Self::Args) -> Result<String, ToolError>;
}

/// Adapts a [`TypedTool`] to the object-safe [`Tool`] trait.
pub struct Typed<T: TypedTool> {
    inner: T,
    _args: PhantomData<fn() -> T::Args>,
}

/// Wrap a typed tool so it can be registered.
pub fn typed<T: TypedTool>(tool: T) -> Typed<T> {
    Typed {
        inner: tool,
        _args: PhantomData,
    }
}

#[async_trait]
impl<T: TypedTool> Tool for Typed<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> Value {
        let mut schema = serde_json::to_value(schemars::schema_for!(T::Args))
            .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}));
        // The endpoint needs neither the meta-schema URI nor the Rust type name
        if let Some(obj) = schema.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
        }
        schema
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let args: T::Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::invalid_arguments(self.inner.name(), e.to_string()))?;
        self.inner.call(args).await
    }
}

/// A registered tool with its advertised spec and compiled argument validator.
pub struct ToolEntry {
    tool: Arc<dyn Tool>,
    spec: ToolSpec,
    validator: jsonschema::Validator,
}

impl ToolEntry {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    pub fn tool(&self) -> &Arc<dyn Tool> {
        &self.tool
    }

    /// Parse raw model arguments and check them against the tool's schema.
    ///
    /// Empty or whitespace-only arguments are treated as `{}`.
    pub fn validate(&self, raw: &str) -> Result<Value, ToolError> {
        let value: Value = if raw.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw).map_err(|e| {
                ToolError::invalid_arguments(self.name(), format!("arguments are not valid JSON: {e}"))
            })?
        };

        let errors: Vec<String> = self
            .validator
            .iter_errors(&value)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(value)
        } else {
            Err(ToolError::invalid_arguments(self.name(), errors.join("; ")))
        }
    }
}

impl fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolEntry")
            .field("name", &self.spec.name)
            .finish_non_exhaustive()
    }
}

/// A registry of available tools.
///
/// Names are unique. Built once at setup and shared read-only across runs.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<ToolEntry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if the name is taken or the schema does not compile.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        self.register_shared(Arc::new(tool))
    }

    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let spec = tool.to_spec();
        if self.index.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateTool(spec.name));
        }

        let validator =
            jsonschema::validator_for(&spec.parameters).map_err(|e| RegistryError::InvalidSchema {
                tool_name: spec.name.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(tool = %spec.name, "Registered tool");
        self.index.insert(spec.name.clone(), self.entries.len());
        self.entries.push(ToolEntry {
            tool,
            spec,
            validator,
        });
        Ok(())
    }

    /// Builder-style registration.
    pub fn with(mut self, tool: impl Tool + 'static) -> Result<Self, RegistryError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolEntry, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All tool specs in registration order.
    pub fn describe_all(&self) -> Vec<ToolSpec> {
        self.entries.iter().map(|e| e.spec.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
