//! In-memory customer records backing the customer-service tools.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Basic,
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Premium => "premium",
        }
    }

    /// Display form used in listings ("Premium subscriber").
    pub fn title(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Basic => "Basic",
            Self::Premium => "Premium",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Expired => f.write_str("expired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Renew,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub name: String,
    pub email: String,
    pub subscription: Subscription,
    pub last_login: DateTime<Utc>,
}

impl User {
    /// Accounts were opened fifteen days apart starting 15 January 2024.
    pub fn created(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
            + Duration::days(i64::from(self.id) * 15 - 1)
    }
}

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .unwrap_or_default()
}

/// The demo customer base.
pub fn seed_users() -> Vec<User> {
    vec![
        User {
            id: 1,
            name: "John Smith".into(),
            email: "john@co.com".into(),
            subscription: Subscription {
                plan: Plan::Premium,
                status: SubscriptionStatus::Active,
                expires: utc(2025, 1, 15, 8, 30),
            },
            last_login: utc(2024, 3, 20, 14, 22),
        },
        User {
            id: 2,
            name: "Jane Doe".into(),
            email: "jane@co.com".into(),
            subscription: Subscription {
                plan: Plan::Basic,
                status: SubscriptionStatus::Active,
                expires: utc(2024, 8, 20, 10, 15),
            },
            last_login: utc(2024, 3, 19, 9, 45),
        },
        User {
            id: 3,
            name: "Bob Wilson".into(),
            email: "bob@co.com".into(),
            subscription: Subscription {
                plan: Plan::Premium,
                status: SubscriptionStatus::Expired,
                expires: utc(2024, 2, 1, 12, 0),
            },
            last_login: utc(2024, 1, 30, 16, 0),
        },
    ]
}

/// Shared, mutable user records.
///
/// Subscription changes persist for as long as the store lives, so runs
/// sharing one store observe each other's updates.
#[derive(Debug)]
pub struct UserStore {
    users: RwLock<Vec<User>>,
}

impl UserStore {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    /// A store holding the demo customers.
    pub fn seeded() -> Self {
        Self::new(seed_users())
    }

    pub async fn all(&self) -> Vec<User> {
        self.users.read().await.clone()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    /// Apply `f` to the user with `email`, returning its result.
    pub async fn update<R>(&self, email: &str, f: impl FnOnce(&mut User) -> R) -> Option<R> {
        let mut users = self.users.write().await;
        users.iter_mut().find(|u| u.email == email).map(f)
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::seeded()
    }
}

/// Day-first calendar date, e.g. "15/01/2025".
pub fn format_day(date: DateTime<Utc>) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Human-readable age of a past timestamp relative to `now`.
///
/// Within a week: "today", "yesterday", "N days ago"; otherwise (and for
/// future timestamps) the calendar date.
pub fn format_relative(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = now.signed_duration_since(date).num_days();
    match days {
        0 if date <= now => "today".into(),
        1 => "yesterday".into(),
        2..=6 => format!("{days} days ago"),
        _ => format_day(date),
    }
}
