use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::audience::{AudienceFilters, AudienceRole};

/// Default timezone applied to scheduled sends
pub const DEFAULT_TIMEZONE: &str = "Africa/Lagos";

/// Kind of broadcast campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastType {
    ProductLaunch,
    Promotion,
    SystemUpdate,
    OperationalNotice,
    UrgentAlert,
}

impl BroadcastType {
    pub fn label(&self) -> &'static str {
        match self {
            BroadcastType::ProductLaunch => "Product Launch",
            BroadcastType::Promotion => "Promotion",
            BroadcastType::SystemUpdate => "System Update",
            BroadcastType::OperationalNotice => "Operational Notice",
            BroadcastType::UrgentAlert => "Urgent Alert",
        }
    }
}

/// Delivery channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channels {
    #[serde(default)]
    pub email: bool,
    #[serde(default)]
    pub in_app: bool,
}

impl Channels {
    pub fn any(&self) -> bool {
        self.email || self.in_app
    }

    pub fn labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        if self.email {
            labels.push("email".to_string());
        }
        if self.in_app {
            labels.push("in_app".to_string());
        }
        labels
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduling {
    #[serde(default = "default_send_now")]
    pub send_now: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

fn default_send_now() -> bool {
    true
}

impl Default for Scheduling {
    fn default() -> Self {
        Self {
            send_now: true,
            scheduled_for: None,
            timezone: None,
        }
    }
}

/// Fan-out throttle requested from the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    /// Signed so that zero and negative input reach validation instead of failing to parse
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_per_minute: Option<i64>,
}

impl RateLimit {
    pub fn is_unset(&self) -> bool {
        self.users_per_minute.is_none()
    }
}

/// Per-role override of the default message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_link: Option<String>,
}

impl RoleMessage {
    pub fn is_empty(&self) -> bool {
        [&self.body, &self.cta_label, &self.cta_link]
            .into_iter()
            .all(|v| v.as_deref().map_or(true, |s| s.trim().is_empty()))
    }
}

/// Message as a given role will see it, after falling back to the defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMessage {
    pub role: AudienceRole,
    pub body: String,
    pub cta_label: String,
    pub cta_link: String,
}

/// In-progress broadcast configuration accumulated by the composer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastDraft {
    #[serde(rename = "type", default)]
    pub broadcast_type: Option<BroadcastType>,
    #[serde(default)]
    pub audience: BTreeSet<AudienceRole>,
    #[serde(default)]
    pub audience_filters: AudienceFilters,
    #[serde(default)]
    pub channels: Channels,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub role_specific_messages: BTreeMap<AudienceRole, RoleMessage>,
    #[serde(default)]
    pub cta_label: String,
    #[serde(default)]
    pub cta_link: String,
    #[serde(default)]
    pub product_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_attach_days: Option<u32>,
    #[serde(default)]
    pub scheduling: Scheduling,
    #[serde(default)]
    pub rate_limit: RateLimit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_note: Option<String>,
}

impl BroadcastDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self, role: AudienceRole) -> bool {
        self.audience.contains(&role)
    }

    /// Resolve the message `role` receives, using overrides where present
    pub fn message_for(&self, role: AudienceRole) -> ResolvedMessage {
        let overrides = self.role_specific_messages.get(&role);
        let pick = |override_value: Option<&String>, default: &String| -> String {
            override_value
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default)
                .clone()
        };

        ResolvedMessage {
            role,
            body: pick(overrides.and_then(|m| m.body.as_ref()), &self.body),
            cta_label: pick(overrides.and_then(|m| m.cta_label.as_ref()), &self.cta_label),
            cta_link: pick(overrides.and_then(|m| m.cta_link.as_ref()), &self.cta_link),
        }
    }

    /// Apply a partial update. Returns true if audience or filters changed.
    pub fn apply(&mut self, update: DraftUpdate) -> bool {
        let before_audience = self.audience.clone();
        let before_filters = self.audience_filters.clone();

        if let Some(broadcast_type) = update.broadcast_type {
            self.broadcast_type = broadcast_type;
        }
        if let Some(audience) = update.audience {
            self.audience = audience;
        }
        if let Some(filters) = update.audience_filters {
            self.audience_filters = filters;
        }
        if let Some(channels) = update.channels {
            self.channels = channels;
        }
        if let Some(subject) = update.subject {
            self.subject = subject;
        }
        if let Some(body) = update.body {
            self.body = body;
        }
        if let Some(messages) = update.role_specific_messages {
            self.role_specific_messages = messages;
        }
        if let Some(label) = update.cta_label {
            self.cta_label = label;
        }
        if let Some(link) = update.cta_link {
            self.cta_link = link;
        }
        if let Some(product_ids) = update.product_ids {
            self.product_ids = product_ids;
        }
        if let Some(days) = update.auto_attach_days {
            self.auto_attach_days = days;
        }
        if let Some(scheduling) = update.scheduling {
            self.scheduling = scheduling;
        }
        if let Some(rate_limit) = update.rate_limit {
            self.rate_limit = rate_limit;
        }

        self.audience != before_audience || self.audience_filters != before_filters
    }

    /// Assemble the create-broadcast body.
    ///
    /// Returns `None` without a broadcast type. Callers validate first; this
    /// only prunes fields that do not apply to the selected audience.
    pub fn to_payload(&self) -> Option<BroadcastPayload> {
        let broadcast_type = self.broadcast_type?;
        let targets_buyers = self.targets(AudienceRole::Buyer);

        let role_specific_messages = self
            .role_specific_messages
            .iter()
            .filter(|(role, message)| self.audience.contains(role) && !message.is_empty())
            .map(|(role, message)| (*role, message.clone()))
            .collect();

        let scheduling = Scheduling {
            send_now: self.scheduling.send_now,
            scheduled_for: if self.scheduling.send_now {
                None
            } else {
                self.scheduling.scheduled_for
            },
            timezone: Some(
                self.scheduling
                    .timezone
                    .clone()
                    .filter(|tz| !tz.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            ),
        };

        Some(BroadcastPayload {
            broadcast_type,
            audience: self.audience.iter().copied().collect(),
            audience_filters: self.audience_filters.restricted_to(&self.audience),
            channels: self.channels,
            subject: non_empty(&self.subject),
            body: self.body.clone(),
            role_specific_messages,
            cta_label: non_empty(&self.cta_label),
            cta_link: non_empty(&self.cta_link),
            product_ids: if targets_buyers {
                self.product_ids.clone()
            } else {
                Vec::new()
            },
            auto_attach_days: self.auto_attach_days.filter(|_| targets_buyers),
            scheduling,
            rate_limit: self.rate_limit,
            internal_note: self.internal_note.as_deref().and_then(non_empty),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Partial draft update. Absent fields are left untouched; for nullable
/// fields an explicit `null` clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftUpdate {
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub broadcast_type: Option<Option<BroadcastType>>,
    pub audience: Option<BTreeSet<AudienceRole>>,
    pub audience_filters: Option<AudienceFilters>,
    pub channels: Option<Channels>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub role_specific_messages: Option<BTreeMap<AudienceRole, RoleMessage>>,
    pub cta_label: Option<String>,
    pub cta_link: Option<String>,
    pub product_ids: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub auto_attach_days: Option<Option<u32>>,
    pub scheduling: Option<Scheduling>,
    pub rate_limit: Option<RateLimit>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Body of the create-broadcast call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastPayload {
    #[serde(rename = "type")]
    pub broadcast_type: BroadcastType,
    pub audience: Vec<AudienceRole>,
    #[serde(default, skip_serializing_if = "AudienceFilters::is_empty")]
    pub audience_filters: AudienceFilters,
    pub channels: Channels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub role_specific_messages: BTreeMap<AudienceRole, RoleMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_attach_days: Option<u32>,
    pub scheduling: Scheduling,
    #[serde(default, skip_serializing_if = "RateLimit::is_unset")]
    pub rate_limit: RateLimit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastStatus {
    Sent,
    Scheduled,
}

/// Response of the create-broadcast call. Fields beyond `status` are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastReceipt {
    pub status: BroadcastStatus,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl BroadcastReceipt {
    /// Backend identifier of the broadcast job, when one was returned
    pub fn id(&self) -> Option<String> {
        match self.details.get("id")? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
