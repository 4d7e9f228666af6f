//! Audience targeting model.
//!
//! Recipients are segmented by [`AudienceRole`]. Each role carries its own
//! typed filter struct; [`RoleFilter`] is the tagged union used to address a
//! role's filters without stringly-typed field access.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role segment a broadcast can target.
///
/// Ordering is buyer, seller, rider. Several rules (CTA matching, summaries)
/// walk roles in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudienceRole {
    Buyer,
    Seller,
    Rider,
}

impl AudienceRole {
    pub const ALL: [AudienceRole; 3] = [AudienceRole::Buyer, AudienceRole::Seller, AudienceRole::Rider];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudienceRole::Buyer => "BUYER",
            AudienceRole::Seller => "SELLER",
            AudienceRole::Rider => "RIDER",
        }
    }

    /// Singular lowercase label used in user-facing messages
    pub fn label(&self) -> &'static str {
        match self {
            AudienceRole::Buyer => "buyer",
            AudienceRole::Seller => "seller",
            AudienceRole::Rider => "rider",
        }
    }

    pub fn plural_label(&self) -> &'static str {
        match self {
            AudienceRole::Buyer => "buyers",
            AudienceRole::Seller => "sellers",
            AudienceRole::Rider => "riders",
        }
    }

    /// Route namespace recommended for CTA links aimed at this role
    pub fn route_prefix(&self) -> &'static str {
        match self {
            AudienceRole::Buyer => "/buyer/*",
            AudienceRole::Seller => "/seller/*",
            AudienceRole::Rider => "/rider/*",
        }
    }

    /// Path fragments that identify a link as belonging to this role's pages
    pub fn route_markers(&self) -> &'static [&'static str] {
        match self {
            AudienceRole::Buyer => &["/buyer/", "/products", "/shop"],
            AudienceRole::Seller => &["/seller/", "/dashboard"],
            AudienceRole::Rider => &["/rider/", "/deliveries"],
        }
    }
}

impl fmt::Display for AudienceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudienceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUYER" => Ok(AudienceRole::Buyer),
            "SELLER" => Ok(AudienceRole::Seller),
            "RIDER" => Ok(AudienceRole::Rider),
            other => Err(format!("Unknown audience role: {}", other)),
        }
    }
}

/// Buyer segment predicates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerFilters {
    /// Buyers who registered recently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_users: Option<bool>,
    /// Buyers with recent orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_buyers: Option<bool>,
    /// Business (B2B) buyer accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b2b_buyers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl BuyerFilters {
    pub fn is_empty(&self) -> bool {
        self.new_users.is_none()
            && self.active_buyers.is_none()
            && self.b2b_buyers.is_none()
            && is_blank(&self.city)
            && is_blank(&self.state)
    }
}

/// Seller segment predicates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerFilters {
    /// Only KYC-verified sellers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    /// Sellers listing in any of these categories
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    /// Sellers who had products approved within this many days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newly_approved_products_days: Option<u32>,
}

impl SellerFilters {
    pub fn is_empty(&self) -> bool {
        self.verified.is_none()
            && self.categories.is_empty()
            && self.newly_approved_products_days.is_none()
    }
}

/// Rider segment predicates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_last7_days: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl RiderFilters {
    pub fn is_empty(&self) -> bool {
        self.active_only.is_none() && self.online_last7_days.is_none() && is_blank(&self.city)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}

/// Filters for exactly one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "filters", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleFilter {
    Buyer(BuyerFilters),
    Seller(SellerFilters),
    Rider(RiderFilters),
}

impl RoleFilter {
    pub fn role(&self) -> AudienceRole {
        match self {
            RoleFilter::Buyer(_) => AudienceRole::Buyer,
            RoleFilter::Seller(_) => AudienceRole::Seller,
            RoleFilter::Rider(_) => AudienceRole::Rider,
        }
    }
}

/// Per-role filter bag, serialized as `{ buyer?, seller?, rider? }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer: Option<BuyerFilters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller: Option<SellerFilters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rider: Option<RiderFilters>,
}

impl AudienceFilters {
    /// Set the filters for the role carried by `filter`, replacing any previous value
    pub fn insert(&mut self, filter: RoleFilter) {
        match filter {
            RoleFilter::Buyer(f) => self.buyer = Some(f),
            RoleFilter::Seller(f) => self.seller = Some(f),
            RoleFilter::Rider(f) => self.rider = Some(f),
        }
    }

    pub fn remove(&mut self, role: AudienceRole) -> Option<RoleFilter> {
        match role {
            AudienceRole::Buyer => self.buyer.take().map(RoleFilter::Buyer),
            AudienceRole::Seller => self.seller.take().map(RoleFilter::Seller),
            AudienceRole::Rider => self.rider.take().map(RoleFilter::Rider),
        }
    }

    pub fn get(&self, role: AudienceRole) -> Option<RoleFilter> {
        match role {
            AudienceRole::Buyer => self.buyer.clone().map(RoleFilter::Buyer),
            AudienceRole::Seller => self.seller.clone().map(RoleFilter::Seller),
            AudienceRole::Rider => self.rider.clone().map(RoleFilter::Rider),
        }
    }

    /// True when no role carries an active predicate
    pub fn is_empty(&self) -> bool {
        self.buyer.as_ref().map_or(true, BuyerFilters::is_empty)
            && self.seller.as_ref().map_or(true, SellerFilters::is_empty)
            && self.rider.as_ref().map_or(true, RiderFilters::is_empty)
    }

    /// Copy of these filters keeping only roles in `roles` and dropping empty bags.
    pub fn restricted_to(&self, roles: &BTreeSet<AudienceRole>) -> AudienceFilters {
        AudienceFilters {
            buyer: self
                .buyer
                .clone()
                .filter(|f| roles.contains(&AudienceRole::Buyer) && !f.is_empty()),
            seller: self
                .seller
                .clone()
                .filter(|f| roles.contains(&AudienceRole::Seller) && !f.is_empty()),
            rider: self
                .rider
                .clone()
                .filter(|f| roles.contains(&AudienceRole::Rider) && !f.is_empty()),
        }
    }
}

/// Inputs of an audience head-count request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudienceQuery {
    pub roles: Vec<AudienceRole>,
    pub filters: AudienceFilters,
}

impl AudienceQuery {
    pub fn new(roles: &BTreeSet<AudienceRole>, filters: &AudienceFilters) -> Self {
        Self {
            roles: roles.iter().copied().collect(),
            filters: filters.restricted_to(roles),
        }
    }

    /// Comma separated role list, e.g. `BUYER,SELLER`
    pub fn roles_param(&self) -> String {
        self.roles
            .iter()
            .map(AudienceRole::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Head-count per role as resolved by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceCount {
    #[serde(rename = "BUYER", default, skip_serializing_if = "Option::is_none")]
    pub buyer: Option<u64>,
    #[serde(rename = "SELLER", default, skip_serializing_if = "Option::is_none")]
    pub seller: Option<u64>,
    #[serde(rename = "RIDER", default, skip_serializing_if = "Option::is_none")]
    pub rider: Option<u64>,
    #[serde(default)]
    pub total: u64,
}

impl AudienceCount {
    pub fn for_role(&self, role: AudienceRole) -> Option<u64> {
        match role {
            AudienceRole::Buyer => self.buyer,
            AudienceRole::Seller => self.seller,
            AudienceRole::Rider => self.rider,
        }
    }

    pub fn set(&mut self, role: AudienceRole, count: u64) {
        match role {
            AudienceRole::Buyer => self.buyer = Some(count),
            AudienceRole::Seller => self.seller = Some(count),
            AudienceRole::Rider => self.rider = Some(count),
        }
    }
}

/// Resolution state of the live audience count
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AudienceCountState {
    /// Never requested for the current audience/filters
    #[default]
    Idle,
    Loading,
    Ready { count: AudienceCount },
    /// The last request failed; counts are shown as unavailable
    Unavailable { reason: String },
}

/// Handle for one in-flight count request
#[derive(Debug, Clone)]
pub struct CountTicket {
    generation: u64,
    pub query: AudienceQuery,
}

/// Tracks the live audience count with last-request-wins semantics.
///
/// Every `begin` and every `invalidate` bumps the generation; a completion is
/// applied only if its ticket still carries the current generation.
#[derive(Debug, Default)]
pub struct AudienceCountTracker {
    generation: u64,
    state: AudienceCountState,
}

impl AudienceCountTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the current count; any in-flight request becomes stale.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.state = AudienceCountState::Idle;
    }

    pub fn begin(&mut self, query: AudienceQuery) -> CountTicket {
        self.generation += 1;
        self.state = AudienceCountState::Loading;
        CountTicket {
            generation: self.generation,
            query,
        }
    }

    /// Apply a completed request. Returns false when the result was stale and dropped.
    pub fn complete(&mut self, ticket: CountTicket, result: Result<AudienceCount, String>) -> bool {
        if ticket.generation != self.generation {
            return false;
        }

        self.state = match result {
            Ok(count) => AudienceCountState::Ready { count },
            Err(reason) => AudienceCountState::Unavailable { reason },
        };
        true
    }

    pub fn state(&self) -> &AudienceCountState {
        &self.state
    }

    /// The resolved count, if the last request for the current filters succeeded
    pub fn count(&self) -> Option<&AudienceCount> {
        match &self.state {
            AudienceCountState::Ready { count } => Some(count),
            _ => None,
        }
    }
}
