//! Customer-service tools for Agentry.
//!
//! Two tool sets over the same in-memory customer base:
//! - **specific**: one narrow tool per task (`search_users`,
//!   `get_user_details`, `notify_customer`, `update_subscription`)
//! - **generic**: broad API-wrapper tools (`query_data`, `send_message`,
//!   `access_record`, `modify_record`)
//!
//! Both register through [`ToolRegistry`], so the agent loop treats them
//! identically.

pub mod customer;
pub mod generic;
pub mod service;
pub mod users;

use std::fmt;
use std::str::FromStr;

use agentry_core::error::RegistryError;
use agentry_core::tool::{ToolRegistry, typed};

pub use service::{OperationResult, SearchCriteria, UserService};
pub use users::{Plan, SubscriptionAction, SubscriptionStatus, User, UserStore};

/// System prompt for the customer-service agent.
pub const CUSTOMER_SERVICE_PROMPT: &str = "You are a helpful customer service agent. You can:

1. Search for users by name, email, or subscription details
2. Get detailed information about specific users
3. Send email notifications to customers
4. Update subscription plans and statuses

Always be polite and helpful. When you need more information, ask clarifying questions.
When you complete an action, summarize what you did for the customer.";

/// Canned queries exercised by the demo.
pub const DEMO_QUERIES: [&str; 5] = [
    "Find all premium users with expired subscriptions",
    "Get details for john@co.com and send them a renewal reminder",
    "Cancel the subscription for jane@co.com",
    "Search for users with basic plans",
    "Find all premium users with active subscriptions and send them a thank you email",
];

/// Which tool set to advertise to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolSet {
    #[default]
    Specific,
    Generic,
}

impl ToolSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Specific => "specific",
            Self::Generic => "generic",
        }
    }

    /// Build a registry of this set's tools over `service`.
    pub fn registry(&self, service: UserService) -> Result<ToolRegistry, RegistryError> {
        match self {
            Self::Specific => customer_registry(service),
            Self::Generic => generic_registry(service),
        }
    }
}

impl fmt::Display for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "specific" => Ok(Self::Specific),
            "generic" => Ok(Self::Generic),
            other => Err(format!(
                "unknown tool set '{other}' (expected 'specific' or 'generic')"
            )),
        }
    }
}

/// The purpose-built customer-service tools.
pub fn customer_registry(service: UserService) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::new()
        .with(typed(customer::NotifyCustomerTool::new(service.clone())))?
        .with(typed(customer::SearchUsersTool::new(service.clone())))?
        .with(typed(customer::GetUserDetailsTool::new(service.clone())))?
        .with(typed(customer::UpdateSubscriptionTool::new(service)))
}

/// The generic API-wrapper tools.
pub fn generic_registry(service: UserService) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::new()
        .with(typed(generic::QueryDataTool::new(service.clone())))?
        .with(typed(generic::SendMessageTool::new(service.clone())))?
        .with(typed(generic::AccessRecordTool::new(service.clone())))?
        .with(typed(generic::ModifyRecordTool::new(service)))
}
