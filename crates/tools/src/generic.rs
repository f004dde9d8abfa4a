//! Generic wrapper tools — broad, many-parameter tools over the same
//! customer data.
//!
//! They exist to contrast with the task-shaped tools in `customer`: the
//! same operations hide behind sources, operations and identifier types.
//! Misuse is reported as an "Error: …" string in a successful result so
//! the model can correct itself.

use std::collections::HashMap;

use agentry_core::error::ToolError;
use agentry_core::tool::TypedTool;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::service::{SearchCriteria, UserService};
use crate::users::{Plan, SubscriptionAction, SubscriptionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum QueryOperation {
    #[serde(rename = "find")]
    Find,
    #[serde(rename = "findOne")]
    FindOne,
    #[serde(rename = "count")]
    Count,
    #[serde(rename = "aggregate")]
    Aggregate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CacheControl {
    NoCache,
    Cache,
    CacheAndRefresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    Email,
    Sms,
    Push,
    InApp,
    Webhook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierType {
    Id,
    Email,
    Uuid,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    Json,
    Xml,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ModifyOperation {
    Update,
    Patch,
    Replace,
    Merge,
}

/// The wire spelling of an enum value, as the model sent it.
fn wire<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        _ => String::new(),
    }
}

fn parse_filter<T: for<'de> Deserialize<'de>>(value: Option<&Value>) -> Option<T> {
    value.and_then(|v| serde_json::from_value(v.clone()).ok())
}

// ── query_data ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryDataArgs {
    /// Data source to query (e.g., 'users', 'orders', 'products')
    pub source: String,
    /// Query operation type
    pub operation: QueryOperation,
    /// Filter criteria as key-value pairs
    #[serde(default)]
    pub filters: Option<HashMap<String, Value>>,
    /// Fields to include in response
    #[serde(default)]
    pub projection: Option<Vec<String>>,
    /// Sort order (-1 for desc, 1 for asc)
    #[serde(default)]
    pub sort: Option<HashMap<String, i64>>,
    /// Maximum number of results
    #[serde(default)]
    pub limit: Option<u64>,
    /// Number of results to skip
    #[serde(default)]
    pub skip: Option<u64>,
    /// Include query metadata in response
    #[serde(default)]
    pub include_metadata: Option<bool>,
    #[serde(default)]
    pub cache_control: Option<CacheControl>,
    /// Query timeout in milliseconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

pub struct QueryDataTool {
    service: UserService,
}

impl QueryDataTool {
    pub fn new(service: UserService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TypedTool for QueryDataTool {
    type Args = QueryDataArgs;

    fn name(&self) -> &str {
        "query_data"
    }

    fn description(&self) -> &str {
        "Query data from any data source"
    }

    async fn call(&self, args: QueryDataArgs) -> Result<String, ToolError> {
        if args.source != "users" {
            return Ok(format!(
                "Error: Data source '{}' not found. Available sources: users",
                args.source
            ));
        }

        if args.operation != QueryOperation::Find {
            return Ok(format!(
                "Error: Operation '{}' not supported for user queries. Use 'find' instead.",
                wire(&args.operation)
            ));
        }

        let filters = args.filters.unwrap_or_default();
        let query = filters.get("query").and_then(|v| match v {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });
        let criteria = SearchCriteria {
            query,
            plan: parse_filter::<Plan>(filters.get("subscription_plan"))
                .filter(|p| *p != Plan::Free),
            status: parse_filter::<SubscriptionStatus>(filters.get("subscription_status")),
        };

        let result = self.service.search(&criteria).await;

        if args.include_metadata.unwrap_or(false) {
            let mut applied: Vec<&String> = filters.keys().collect();
            applied.sort();
            let body = json!({
                "query_metadata": {
                    "execution_time_ms": 23,
                    "source": args.source,
                    "operation": wire(&args.operation),
                    "filters_applied": applied,
                    "cache_hit": false,
                },
                "result_count": result.users.len(),
                "results": result.users.iter().map(|u| json!({
                    "id": u.id,
                    "name": u.name,
                    "email": u.email,
                    "subscription": {
                        "plan": u.subscription.plan,
                        "status": u.subscription.status,
                    },
                })).collect::<Vec<_>>(),
            });
            return Ok(body.to_string());
        }

        Ok(result.formatted
            + "\n\nNeed more details? Use 'query_data' with operation='findOne' and the user's email.")
    }
}

// ── send_message ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SendMessageArgs {
    /// Communication channel
    pub channel: Channel,
    /// Recipient identifier (email, phone, user ID, etc.)
    pub recipient: String,
    /// Message content
    pub content: String,
    /// Message subject (for email)
    #[serde(default)]
    pub subject: Option<String>,
    /// Template ID to use
    #[serde(default)]
    pub template: Option<String>,
    /// Template variables
    #[serde(default)]
    pub variables: Option<HashMap<String, String>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub scheduling: Option<HashMap<String, String>>,
    #[serde(default)]
    pub tracking: Option<HashMap<String, bool>>,
    /// Additional metadata
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

pub struct SendMessageTool {
    service: UserService,
}

impl SendMessageTool {
    pub fn new(service: UserService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TypedTool for SendMessageTool {
    type Args = SendMessageArgs;

    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Send a message through any communication channel"
    }

    async fn call(&self, args: SendMessageArgs) -> Result<String, ToolError> {
        if args.channel != Channel::Email {
            return Ok(format!(
                "Error: Channel '{}' is not configured. Please use 'email'.",
                wire(&args.channel)
            ));
        }

        if let Some(priority) = args.priority
            && priority != Priority::Normal
        {
            return Ok(format!(
                "Error: Priority '{}' requires additional configuration. Use 'normal' priority.",
                wire(&priority)
            ));
        }

        let result = self.service.notify(&args.recipient, &args.content).await;
        Ok(result.message)
    }
}

// ── access_record ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessRecordArgs {
    /// Data source (e.g., 'users', 'orders')
    pub source: String,
    /// Record identifier
    pub identifier: String,
    /// Type of identifier
    pub identifier_type: IdentifierType,
    /// Specific fields to retrieve
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    /// Include related records
    #[serde(default)]
    pub include_related: Option<bool>,
    /// Response format
    #[serde(default)]
    pub format: Option<RecordFormat>,
}

pub struct AccessRecordTool {
    service: UserService,
}

impl AccessRecordTool {
    pub fn new(service: UserService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TypedTool for AccessRecordTool {
    type Args = AccessRecordArgs;

    fn name(&self) -> &str {
        "access_record"
    }

    fn description(&self) -> &str {
        "Access a specific record from any data source"
    }

    async fn call(&self, args: AccessRecordArgs) -> Result<String, ToolError> {
        if args.source != "users" {
            return Ok(format!(
                "Error: Source '{}' not available. Use 'users'.",
                args.source
            ));
        }

        if args.identifier_type != IdentifierType::Email {
            return Ok(format!(
                "Error: Identifier type '{}' not supported for users. Use 'email'.",
                wire(&args.identifier_type)
            ));
        }

        let result = self.service.details(&args.identifier).await;
        Ok(result.formatted
            + "\n\nActions available:\n\
               - Use 'send_message' to notify them\n\
               - Use 'modify_record' to update their subscription")
    }
}

// ── modify_record ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRecordArgs {
    /// Data source (e.g., 'users', 'orders')
    pub source: String,
    /// Record identifier
    pub identifier: String,
    /// Type of identifier
    pub identifier_type: IdentifierType,
    /// Modification operation
    pub operation: ModifyOperation,
    /// Data to update
    pub data: HashMap<String, Value>,
    /// Validate before updating
    #[serde(default)]
    pub validate: Option<bool>,
    /// Return the updated record
    #[serde(default)]
    pub return_updated: Option<bool>,
    /// Create audit log entry
    #[serde(default)]
    pub audit_log: Option<bool>,
}

pub struct ModifyRecordTool {
    service: UserService,
}

impl ModifyRecordTool {
    pub fn new(service: UserService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TypedTool for ModifyRecordTool {
    type Args = ModifyRecordArgs;

    fn name(&self) -> &str {
        "modify_record"
    }

    fn description(&self) -> &str {
        "Modify a record in any data source"
    }

    async fn call(&self, args: ModifyRecordArgs) -> Result<String, ToolError> {
        if args.source != "users" {
            return Ok(format!(
                "Error: Source '{}' not available for modifications. Use 'users'.",
                args.source
            ));
        }

        if args.identifier_type != IdentifierType::Email {
            return Ok(format!(
                "Error: Identifier type '{}' not supported. Use 'email'.",
                wire(&args.identifier_type)
            ));
        }

        if args.operation != ModifyOperation::Update {
            return Ok(format!(
                "Error: Operation '{}' not supported. Use 'update'.",
                wire(&args.operation)
            ));
        }

        // Unrecognised plan or action values are ignored
        let plan = parse_filter::<Plan>(args.data.get("plan")).filter(|p| *p != Plan::Free);
        let action = parse_filter::<SubscriptionAction>(args.data.get("action"));

        let result = self
            .service
            .update_subscription(&args.identifier, plan, action)
            .await;
        Ok(result.message)
    }
}
