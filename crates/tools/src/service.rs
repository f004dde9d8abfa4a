//! Customer operations over the [`UserStore`], producing the text the
//! tools hand back to the model.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::users::{
    Plan, SubscriptionAction, SubscriptionStatus, User, UserStore, format_day, format_relative,
};

/// Simulated latency of sending a notification email.
const NOTIFY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    /// Case-insensitive substring of the name or email
    pub query: Option<String>,
    pub plan: Option<Plan>,
    pub status: Option<SubscriptionStatus>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub users: Vec<User>,
    pub formatted: String,
}

#[derive(Debug, Clone)]
pub struct DetailsResult {
    pub user: Option<User>,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Service for managing users and subscriptions.
#[derive(Debug, Clone)]
pub struct UserService {
    store: Arc<UserStore>,
    notify_delay: Duration,
}

impl UserService {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self {
            store,
            notify_delay: NOTIFY_DELAY,
        }
    }

    /// Override the simulated email latency.
    pub fn with_notify_delay(mut self, delay: Duration) -> Self {
        self.notify_delay = delay;
        self
    }

    pub fn store(&self) -> &Arc<UserStore> {
        &self.store
    }

    pub async fn search(&self, criteria: &SearchCriteria) -> SearchResult {
        let query = criteria.query.as_deref().map(str::to_lowercase);
        let users: Vec<User> = self
            .store
            .all()
            .await
            .into_iter()
            .filter(|u| match &query {
                Some(q) if !q.is_empty() => {
                    u.name.to_lowercase().contains(q) || u.email.to_lowercase().contains(q)
                }
                _ => true,
            })
            .filter(|u| criteria.plan.is_none_or(|p| u.subscription.plan == p))
            .filter(|u| criteria.status.is_none_or(|s| u.subscription.status == s))
            .collect();

        if users.is_empty() {
            return SearchResult {
                users,
                formatted: "No users found matching the criteria.".into(),
            };
        }

        let now = Utc::now();
        let listing = users
            .iter()
            .enumerate()
            .map(|(i, u)| {
                let status = match u.subscription.status {
                    SubscriptionStatus::Active => {
                        format!("active until {}", format_day(u.subscription.expires))
                    }
                    SubscriptionStatus::Expired => "expired".to_string(),
                };
                format!(
                    "{}. {} ({})\n   - {} subscriber ({})\n   - Last seen: {}",
                    i + 1,
                    u.name,
                    u.email,
                    u.subscription.plan.title(),
                    status,
                    format_relative(u.last_login, now)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let plural = if users.len() == 1 { "" } else { "s" };
        let formatted = format!("Found {} user{plural}:\n\n{listing}", users.len());
        SearchResult { users, formatted }
    }

    pub async fn details(&self, email: &str) -> DetailsResult {
        let Some(user) = self.store.find_by_email(email).await else {
            return DetailsResult {
                user: None,
                formatted: format!("No user found with email: {email}"),
            };
        };

        let status_label = match user.subscription.status {
            SubscriptionStatus::Active => "Expires",
            SubscriptionStatus::Expired => "Expired",
        };

        let formatted = format!(
            "User Details for {name}:\n\
             \n\
             Email: {email}\n\
             User ID: {id}\n\
             \n\
             Subscription:\n\
             - Plan: {plan}\n\
             - Status: {status}\n\
             - {status_label}: {expires}\n\
             \n\
             Activity:\n\
             - Last login: {last_login}\n\
             - Account created: {created}",
            name = user.name,
            email = user.email,
            id = user.id,
            plan = user.subscription.plan,
            status = user.subscription.status,
            expires = format_day(user.subscription.expires),
            last_login = user.last_login.format("%d/%m/%Y, %H:%M:%S"),
            created = user.created().format("%d/%m/%Y"),
        );

        DetailsResult {
            user: Some(user),
            formatted,
        }
    }

    /// Send a (simulated) notification email.
    pub async fn notify(&self, email: &str, message: &str) -> OperationResult {
        if self.store.find_by_email(email).await.is_none() {
            return OperationResult::failed(format!(
                "❌ Failed to send notification: Customer with email {email} not found"
            ));
        }

        tokio::time::sleep(self.notify_delay).await;
        tracing::info!(email, "Notification sent");

        OperationResult::ok(format!("✓ Sent update to {email}: \"{message}\""))
    }

    pub async fn update_subscription(
        &self,
        email: &str,
        plan: Option<Plan>,
        action: Option<SubscriptionAction>,
    ) -> OperationResult {
        let now = Utc::now();
        let outcome = self
            .store
            .update(email, |user| {
                let mut updates = Vec::new();

                if let Some(plan) = plan
                    && plan != user.subscription.plan
                {
                    user.subscription.plan = plan;
                    updates.push(format!("plan changed to {plan}"));
                }

                match action {
                    Some(SubscriptionAction::Renew) => {
                        user.subscription.status = SubscriptionStatus::Active;
                        user.subscription.expires = now + chrono::Duration::days(365);
                        updates.push("subscription renewed for 1 year".to_string());
                    }
                    Some(SubscriptionAction::Cancel) => {
                        user.subscription.status = SubscriptionStatus::Expired;
                        updates.push("subscription cancelled".to_string());
                    }
                    None => {}
                }

                (user.name.clone(), updates)
            })
            .await;

        let Some((name, updates)) = outcome else {
            return OperationResult::failed(format!(
                "❌ Failed to update subscription: Customer with email {email} not found"
            ));
        };

        if updates.is_empty() {
            return OperationResult::ok(format!("No changes made to {name}'s subscription."));
        }

        tracing::info!(email, changes = updates.len(), "Subscription updated");
        OperationResult::ok(format!(
            "✓ Updated {name}'s subscription: {}",
            updates.join(", ")
        ))
    }
}

impl Default for UserService {
    fn default() -> Self {
        Self::new(Arc::new(UserStore::seeded()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> UserService {
        UserService::default().with_notify_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn search_premium_expired() {
        let result = service()
            .search(&SearchCriteria {
                plan: Some(Plan::Premium),
                status: Some(SubscriptionStatus::Expired),
                ..Default::default()
            })
            .await;
        assert_eq!(result.users.len(), 1);
        assert!(result.formatted.starts_with("Found 1 user:\n\n1. Bob Wilson (bob@co.com)"));
        assert!(result.formatted.contains("Premium subscriber (expired)"));
        assert!(result.formatted.contains("Last seen: 30/01/2024"));
    }

    #[tokio::test]
    async fn search_by_query_is_case_insensitive() {
        let result = service()
            .search(&SearchCriteria {
                query: Some("JANE".into()),
                ..Default::default()
            })
            .await;
        assert_eq!(result.users.len(), 1);
        assert!(result.formatted.contains("Basic subscriber (active until 20/08/2024)"));
    }

    #[tokio::test]
    async fn search_without_filters_lists_everyone() {
        let result = service().search(&SearchCriteria::default()).await;
        assert!(result.formatted.starts_with("Found 3 users:"));
    }

    #[tokio::test]
    async fn search_no_match() {
        let result = service()
            .search(&SearchCriteria {
                plan: Some(Plan::Free),
                ..Default::default()
            })
            .await;
        assert!(result.users.is_empty());
        assert_eq!(result.formatted, "No users found matching the criteria.");
    }

    #[tokio::test]
    async fn details_format() {
        let result = service().details("john@co.com").await;
        let text = result.formatted;
        assert!(text.starts_with("User Details for John Smith:\n\nEmail: john@co.com\nUser ID: 1"));
        assert!(text.contains("- Plan: premium\n- Status: active\n- Expires: 15/01/2025"));
        assert!(text.contains("- Last login: 20/03/2024, 14:22:00"));
        assert!(text.ends_with("- Account created: 15/01/2024"));
    }

    #[tokio::test]
    async fn details_unknown_user() {
        let result = service().details("ghost@co.com").await;
        assert!(result.user.is_none());
        assert_eq!(result.formatted, "No user found with email: ghost@co.com");
    }

    #[tokio::test]
    async fn notify_known_and_unknown() {
        let svc = service();
        let ok = svc.notify("jane@co.com", "Your plan renews soon").await;
        assert!(ok.success);
        assert_eq!(
            ok.message,
            "✓ Sent update to jane@co.com: \"Your plan renews soon\""
        );

        let failed = svc.notify("ghost@co.com", "hi").await;
        assert!(!failed.success);
        assert_eq!(
            failed.message,
            "❌ Failed to send notification: Customer with email ghost@co.com not found"
        );
    }

    #[tokio::test]
    async fn cancel_then_renew() {
        let svc = service();
        let cancelled = svc
            .update_subscription("jane@co.com", None, Some(SubscriptionAction::Cancel))
            .await;
        assert_eq!(
            cancelled.message,
            "✓ Updated Jane Doe's subscription: subscription cancelled"
        );
        let jane = svc.store().find_by_email("jane@co.com").await.unwrap();
        assert_eq!(jane.subscription.status, SubscriptionStatus::Expired);

        let renewed = svc
            .update_subscription(
                "jane@co.com",
                Some(Plan::Premium),
                Some(SubscriptionAction::Renew),
            )
            .await;
        assert_eq!(
            renewed.message,
            "✓ Updated Jane Doe's subscription: plan changed to premium, subscription renewed for 1 year"
        );
        let jane = svc.store().find_by_email("jane@co.com").await.unwrap();
        assert_eq!(jane.subscription.status, SubscriptionStatus::Active);
        assert!(jane.subscription.expires > Utc::now() + chrono::Duration::days(364));
    }

    #[tokio::test]
    async fn update_without_changes() {
        let result = service()
            .update_subscription("john@co.com", Some(Plan::Premium), None)
            .await;
        assert!(result.success);
        assert_eq!(result.message, "No changes made to John Smith's subscription.");
    }

    #[tokio::test]
    async fn update_unknown_user() {
        let result = service()
            .update_subscription("ghost@co.com", Some(Plan::Basic), None)
            .await;
        assert!(!result.success);
        assert!(result.message.starts_with("❌ Failed to update subscription"));
    }
}
