//! Customer-service tools — one narrow tool per task the agent performs.
//!
//! Each tool returns the service's text plus a short hint pointing the
//! model at the next useful tool.

use agentry_core::error::ToolError;
use agentry_core::tool::TypedTool;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::service::{SearchCriteria, UserService};
use crate::users::{Plan, SubscriptionAction, SubscriptionStatus};

const SEARCH_HINT: &str = "\n\nNeed more details? Use 'get_user_details' with the user's email.";

const DETAILS_HINT: &str = "\n\nActions available:\n\
- Use 'notify_customer' to send them an email\n\
- Use 'update_subscription' to modify their plan";

// ── notify_customer ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotifyCustomerArgs {
    /// Customer's email address
    pub customer_email: String,
    /// The update message to send to the customer
    pub message: String,
}

pub struct NotifyCustomerTool {
    service: UserService,
}

impl NotifyCustomerTool {
    pub fn new(service: UserService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TypedTool for NotifyCustomerTool {
    type Args = NotifyCustomerArgs;

    fn name(&self) -> &str {
        "notify_customer"
    }

    fn description(&self) -> &str {
        "Send a notification email to a customer about their order or account"
    }

    async fn call(&self, args: NotifyCustomerArgs) -> Result<String, ToolError> {
        let result = self
            .service
            .notify(&args.customer_email, &args.message)
            .await;
        Ok(result.message)
    }
}

// ── search_users ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchUsersArgs {
    /// Search query to match against user names or emails
    #[serde(default)]
    pub query: Option<String>,
    /// Filter by subscription plan
    #[serde(default)]
    pub subscription_plan: Option<Plan>,
    /// Filter by subscription status
    #[serde(default)]
    pub subscription_status: Option<SubscriptionStatus>,
}

pub struct SearchUsersTool {
    service: UserService,
}

impl SearchUsersTool {
    pub fn new(service: UserService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TypedTool for SearchUsersTool {
    type Args = SearchUsersArgs;

    fn name(&self) -> &str {
        "search_users"
    }

    fn description(&self) -> &str {
        "Search for users by various criteria"
    }

    async fn call(&self, args: SearchUsersArgs) -> Result<String, ToolError> {
        let criteria = SearchCriteria {
            query: args.query,
            plan: args.subscription_plan,
            status: args.subscription_status,
        };
        let result = self.service.search(&criteria).await;
        Ok(result.formatted + SEARCH_HINT)
    }
}

// ── get_user_details ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetUserDetailsArgs {
    /// User's email address
    pub email: String,
}

pub struct GetUserDetailsTool {
    service: UserService,
}

impl GetUserDetailsTool {
    pub fn new(service: UserService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TypedTool for GetUserDetailsTool {
    type Args = GetUserDetailsArgs;

    fn name(&self) -> &str {
        "get_user_details"
    }

    fn description(&self) -> &str {
        "Get detailed information about a specific user"
    }

    async fn call(&self, args: GetUserDetailsArgs) -> Result<String, ToolError> {
        let result = self.service.details(&args.email).await;
        Ok(result.formatted + DETAILS_HINT)
    }
}

// ── update_subscription ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateSubscriptionArgs {
    /// Customer's email address
    pub email: String,
    /// New subscription plan
    #[serde(default)]
    pub plan: Option<Plan>,
    /// Action to take on subscription
    #[serde(default)]
    pub action: Option<SubscriptionAction>,
}

pub struct UpdateSubscriptionTool {
    service: UserService,
}

impl UpdateSubscriptionTool {
    pub fn new(service: UserService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TypedTool for UpdateSubscriptionTool {
    type Args = UpdateSubscriptionArgs;

    fn name(&self) -> &str {
        "update_subscription"
    }

    fn description(&self) -> &str {
        "Update a customer's subscription plan or status"
    }

    async fn call(&self, args: UpdateSubscriptionArgs) -> Result<String, ToolError> {
        let result = self
            .service
            .update_subscription(&args.email, args.plan, args.action)
            .await;
        Ok(result.message)
    }
}
