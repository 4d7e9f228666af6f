//! Broadcast validation rules.
//!
//! Three independent checks feed the composer:
//! - [`check_spam_risk`] grades a subject line
//! - [`validate_cta_link`] compares a CTA link against the selected roles
//! - [`validate_broadcast_payload`] combines every rule into errors (blocking)
//!   and warnings (advisory)
//!
//! [`validate_step`] projects the same rules onto the fields a wizard step owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::audience::AudienceRole;
use super::types::BroadcastDraft;
use super::wizard::WizardStep;

/// Phrases that commonly trip provider spam filters (matched case-insensitively)
pub const SPAM_KEYWORDS: [&str; 10] = [
    "free money",
    "click here now",
    "limited time",
    "act now",
    "urgent",
    "guaranteed",
    "no risk",
    "winner",
    "congratulations",
    "claim your prize",
];

const MAX_SUBJECT_LENGTH: usize = 50;
const UPPERCASE_RATIO_LIMIT: f64 = 0.5;
const UPPERCASE_MIN_LENGTH: usize = 10;
const MAX_PUNCTUATION: usize = 2;
const HIGH_RISK_KEYWORD_COUNT: usize = 2;
/// Number of distinct triggered rules that escalates a subject to high risk
const HIGH_RISK_RULE_COUNT: usize = 3;

/// Above this throttle the backend fan-out is known to degrade
pub const MAX_SAFE_USERS_PER_MINUTE: i64 = 10_000;

pub const TYPE_REQUIRED: &str = "Broadcast type is required";
pub const AUDIENCE_REQUIRED: &str = "Select at least one audience";
pub const CHANNEL_REQUIRED: &str = "Select at least one delivery channel";
pub const SUBJECT_REQUIRED: &str = "Subject is required for email broadcasts";
pub const BODY_REQUIRED: &str = "Message body is required";
pub const SCHEDULE_REQUIRED: &str = "Scheduled time is required when not sending immediately";
pub const SCHEDULE_IN_PAST: &str = "Scheduled time must be in the future";
pub const RATE_LIMIT_TOO_LOW: &str = "Rate limit must be at least 1 user per minute";
pub const CTA_LINK_MISSING: &str = "CTA label is set but the CTA link is empty";
pub const CTA_LABEL_MISSING: &str = "CTA link is set but the CTA label is empty";
pub const RATE_LIMIT_HIGH: &str =
    "Rate limits above 10000 users per minute may degrade platform performance";

/// Spam likelihood of a subject line, ordered `Low < Medium < High`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpamRisk {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpamCheck {
    pub risk: SpamRisk,
    pub reasons: Vec<String>,
}

/// Grade a subject line.
///
/// Rules are evaluated in a fixed order and only ever raise the risk. Three or
/// more triggered rules escalate to `High` even if each alone is `Medium`.
pub fn check_spam_risk(subject: &str) -> SpamCheck {
    let mut risk = SpamRisk::Low;
    let mut reasons = Vec::new();
    let mut triggered = 0;

    let length = subject.chars().count();
    if length > MAX_SUBJECT_LENGTH {
        risk = risk.max(SpamRisk::Medium);
        triggered += 1;
        reasons.push(format!(
            "Subject is {} characters long; keep it under {}",
            length, MAX_SUBJECT_LENGTH
        ));
    }

    let lowered = subject.to_lowercase();
    let matched: Vec<&str> = SPAM_KEYWORDS
        .iter()
        .copied()
        .filter(|keyword| lowered.contains(keyword))
        .collect();
    if !matched.is_empty() {
        let severity = if matched.len() > HIGH_RISK_KEYWORD_COUNT {
            SpamRisk::High
        } else {
            SpamRisk::Medium
        };
        risk = risk.max(severity);
        triggered += 1;
        reasons.push(format!(
            "Contains {} spam trigger phrase(s): {}",
            matched.len(),
            matched.join(", ")
        ));
    }

    let letters = subject.chars().filter(|c| c.is_alphabetic()).count();
    let uppercase = subject.chars().filter(|c| c.is_uppercase()).count();
    if length > UPPERCASE_MIN_LENGTH
        && letters > 0
        && uppercase as f64 / letters as f64 > UPPERCASE_RATIO_LIMIT
    {
        risk = risk.max(SpamRisk::Medium);
        triggered += 1;
        reasons.push("Too many capital letters".to_string());
    }

    let punctuation = subject.chars().filter(|c| matches!(c, '!' | '?')).count();
    if punctuation > MAX_PUNCTUATION {
        risk = risk.max(SpamRisk::Medium);
        triggered += 1;
        reasons.push(format!(
            "Too many exclamation or question marks ({})",
            punctuation
        ));
    }

    if triggered >= HIGH_RISK_RULE_COUNT {
        risk = SpamRisk::High;
    }

    SpamCheck { risk, reasons }
}

/// Check that a CTA link lands somewhere the selected roles can reach.
///
/// Returns `None` if the link is empty, or if it matches the route markers of
/// any selected role. Otherwise returns one warning for the first selected
/// role in buyer, seller, rider order.
pub fn validate_cta_link(link: &str, roles: &[AudienceRole]) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }

    let selected: Vec<AudienceRole> = AudienceRole::ALL
        .into_iter()
        .filter(|role| roles.contains(role))
        .collect();

    let lowered = link.to_lowercase();
    let matches_any = selected.iter().any(|role| {
        role.route_markers()
            .iter()
            .any(|marker| lowered.contains(marker))
    });
    if matches_any {
        return None;
    }

    let role = selected.first()?;
    Some(format!(
        "CTA link \"{}\" does not look like a {} page; {} usually land on {} routes",
        link,
        role.label(),
        role.plural_label(),
        role.route_prefix()
    ))
}

/// Outcome of validating a draft
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn from_findings(findings: Findings) -> Self {
        Self {
            valid: findings.errors.is_empty(),
            errors: findings.errors,
            warnings: findings.warnings,
        }
    }

    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }
}

#[derive(Default)]
struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Findings {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Validate a (possibly partial) draft against every rule.
///
/// `now` is the reference instant for scheduling checks.
pub fn validate_broadcast_payload(draft: &BroadcastDraft, now: DateTime<Utc>) -> ValidationReport {
    let mut findings = Findings::default();

    check_type(draft, &mut findings);
    check_audience(draft, &mut findings);
    check_channels(draft, &mut findings);
    check_subject_present(draft, &mut findings);
    check_body(draft, &mut findings);
    check_cta(draft, &mut findings);
    check_spam(draft, &mut findings);
    check_scheduling(draft, now, &mut findings);
    check_rate_limit(draft, &mut findings);

    ValidationReport::from_findings(findings)
}

/// Validate only the fields owned by `step`. The review step runs the full validator.
pub fn validate_step(step: WizardStep, draft: &BroadcastDraft, now: DateTime<Utc>) -> ValidationReport {
    let mut findings = Findings::default();

    match step {
        WizardStep::Audience => {
            check_type(draft, &mut findings);
            check_audience(draft, &mut findings);
        }
        WizardStep::Targeting => {}
        WizardStep::Channels => {
            check_channels(draft, &mut findings);
            check_subject_present(draft, &mut findings);
            check_spam(draft, &mut findings);
            check_scheduling(draft, now, &mut findings);
            check_rate_limit(draft, &mut findings);
        }
        WizardStep::Message => {
            check_body(draft, &mut findings);
            check_cta(draft, &mut findings);
        }
        WizardStep::Review => return validate_broadcast_payload(draft, now),
    }

    ValidationReport::from_findings(findings)
}

fn check_type(draft: &BroadcastDraft, findings: &mut Findings) {
    if draft.broadcast_type.is_none() {
        findings.error(TYPE_REQUIRED);
    }
}

fn check_audience(draft: &BroadcastDraft, findings: &mut Findings) {
    if draft.audience.is_empty() {
        findings.error(AUDIENCE_REQUIRED);
    }
}

fn check_channels(draft: &BroadcastDraft, findings: &mut Findings) {
    if !draft.channels.any() {
        findings.error(CHANNEL_REQUIRED);
    }
}

fn check_subject_present(draft: &BroadcastDraft, findings: &mut Findings) {
    if draft.channels.email && draft.subject.trim().is_empty() {
        findings.error(SUBJECT_REQUIRED);
    }
}

fn check_body(draft: &BroadcastDraft, findings: &mut Findings) {
    if is_blank_markup(&draft.body) {
        findings.error(BODY_REQUIRED);
    }
}

fn check_cta(draft: &BroadcastDraft, findings: &mut Findings) {
    let has_label = !draft.cta_label.trim().is_empty();
    let has_link = !draft.cta_link.trim().is_empty();

    if has_label && !has_link {
        findings.warn(CTA_LINK_MISSING);
    }
    if has_link && !has_label {
        findings.warn(CTA_LABEL_MISSING);
    }

    let roles: Vec<AudienceRole> = draft.audience.iter().copied().collect();
    if let Some(warning) = validate_cta_link(&draft.cta_link, &roles) {
        findings.warn(warning);
    }

    // Overridden links are checked against their own role only
    for (role, message) in &draft.role_specific_messages {
        if !draft.targets(*role) {
            continue;
        }
        if let Some(link) = message.cta_link.as_deref() {
            if let Some(warning) = validate_cta_link(link, &[*role]) {
                findings.warn(format!("{} message: {}", role.label(), warning));
            }
        }
    }
}

fn check_spam(draft: &BroadcastDraft, findings: &mut Findings) {
    if draft.subject.trim().is_empty() {
        return;
    }

    let check = check_spam_risk(&draft.subject);
    match check.risk {
        SpamRisk::High => findings.error(format!(
            "Subject line has a high spam risk: {}",
            check.reasons.join("; ")
        )),
        SpamRisk::Medium => findings.warn(format!(
            "Subject line may be flagged as spam: {}",
            check.reasons.join("; ")
        )),
        SpamRisk::Low => {}
    }
}

fn check_scheduling(draft: &BroadcastDraft, now: DateTime<Utc>, findings: &mut Findings) {
    if draft.scheduling.send_now {
        return;
    }

    match draft.scheduling.scheduled_for {
        None => findings.error(SCHEDULE_REQUIRED),
        Some(at) if at <= now => findings.error(SCHEDULE_IN_PAST),
        Some(_) => {}
    }
}

fn check_rate_limit(draft: &BroadcastDraft, findings: &mut Findings) {
    match draft.rate_limit.users_per_minute {
        Some(rate) if rate < 1 => findings.error(RATE_LIMIT_TOO_LOW),
        Some(rate) if rate > MAX_SAFE_USERS_PER_MINUTE => findings.warn(RATE_LIMIT_HIGH),
        _ => {}
    }
}

/// True when the text is empty once markup and non-breaking spaces are removed
/// (rich-text editors emit `<p><br></p>` for an empty document). A `<` only
/// opens a tag when followed by a letter, `/` or `!`.
fn is_blank_markup(body: &str) -> bool {
    let mut in_tag = false;
    let mut text = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '<' if !in_tag
                && chars
                    .peek()
                    .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, '/' | '!')) =>
            {
                in_tag = true
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    text.replace("&nbsp;", " ").trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::types::{BroadcastType, Channels, RateLimit, RoleMessage, Scheduling};
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-17T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn valid_draft() -> BroadcastDraft {
        BroadcastDraft {
            broadcast_type: Some(BroadcastType::Promotion),
            audience: [AudienceRole::Buyer, AudienceRole::Seller].into_iter().collect(),
            channels: Channels {
                email: true,
                in_app: false,
            },
            subject: "Sale starts today".to_string(),
            body: "<p>20% off</p>".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_subject_is_low_risk() {
        let check = check_spam_risk("Your order update for this week");
        assert_eq!(check.risk, SpamRisk::Low);
        assert!(check.reasons.is_empty());
    }

    #[test]
    fn test_long_subject_is_medium() {
        let subject = "A perfectly ordinary subject line that simply runs far too long";
        let check = check_spam_risk(subject);
        assert_eq!(check.risk, SpamRisk::Medium);
        assert_eq!(check.reasons.len(), 1);
    }

    #[test]
    fn test_keyword_counts() {
        assert_eq!(check_spam_risk("You are a winner").risk, SpamRisk::Medium);
        assert_eq!(
            check_spam_risk("Congratulations winner, guaranteed returns").risk,
            SpamRisk::High
        );
        // Case-insensitive
        assert_eq!(check_spam_risk("Limited Time offer").risk, SpamRisk::Medium);
    }

    #[test]
    fn test_uppercase_ratio_needs_length() {
        assert_eq!(check_spam_risk("SALE NOW").risk, SpamRisk::Low);
        assert_eq!(check_spam_risk("BIG SALE THIS WEEK").risk, SpamRisk::Medium);
    }

    #[test]
    fn test_punctuation_rule() {
        assert_eq!(check_spam_risk("Ready?!").risk, SpamRisk::Low);
        assert_eq!(check_spam_risk("Ready?!?").risk, SpamRisk::Medium);
    }

    #[test]
    fn test_free_money_scenario_is_high() {
        let check = check_spam_risk("FREE MONEY!!! ACT NOW!!!");
        assert_eq!(check.risk, SpamRisk::High);
        assert!(check.reasons.iter().any(|r| r.contains("spam trigger")));
        assert!(check.reasons.iter().any(|r| r.contains("exclamation")));
    }

    #[test]
    fn test_risk_never_decreases_when_triggers_are_added() {
        let subjects = [
            "",
            "Hello",
            "Weekly digest",
            "You are a winner",
            "BIG SALE THIS WEEK",
            "Congratulations winner, guaranteed returns",
            "A perfectly ordinary subject line that simply runs far too long",
        ];

        for subject in subjects {
            let base = check_spam_risk(subject).risk;
            let louder = check_spam_risk(&format!("{}!!!", subject)).risk;
            let keyword = check_spam_risk(&format!("{} act now", subject)).risk;
            assert!(louder >= base, "{:?}", subject);
            assert!(keyword >= base, "{:?}", subject);
        }
    }

    #[test]
    fn test_cta_link_matches_each_role() {
        for role in AudienceRole::ALL {
            let link = format!("https://carryofy.com{}offers", role.route_markers()[0]);
            assert_eq!(validate_cta_link(&link, &[role]), None, "{:?}", role);
        }
    }

    #[test]
    fn test_cta_link_mismatch_names_expected_prefix() {
        let warning = validate_cta_link("/seller/dashboard", &[AudienceRole::Buyer]).unwrap();
        assert!(warning.contains("/buyer/*"));
    }

    #[test]
    fn test_cta_link_any_selected_role_satisfies() {
        let roles = [AudienceRole::Buyer, AudienceRole::Rider];
        assert_eq!(validate_cta_link("/rider/earnings", &roles), None);

        let warning = validate_cta_link("/about", &[AudienceRole::Rider, AudienceRole::Seller]).unwrap();
        assert!(warning.contains("/seller/*"));
    }

    #[test]
    fn test_cta_link_empty_or_no_roles() {
        assert_eq!(validate_cta_link("", &[AudienceRole::Buyer]), None);
        assert_eq!(validate_cta_link("/anything", &[]), None);
    }

    #[test]
    fn test_valid_promotion_has_no_warnings() {
        let report = validate_broadcast_payload(&valid_draft(), now());
        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_each_hard_error_flips_validity() {
        let base = valid_draft();
        let cases: Vec<(Box<dyn Fn(&mut BroadcastDraft)>, &str)> = vec![
            (Box::new(|d: &mut BroadcastDraft| d.broadcast_type = None), TYPE_REQUIRED),
            (Box::new(|d: &mut BroadcastDraft| d.audience.clear()), AUDIENCE_REQUIRED),
            (Box::new(|d: &mut BroadcastDraft| d.channels = Channels::default()), CHANNEL_REQUIRED),
            (Box::new(|d: &mut BroadcastDraft| d.subject.clear()), SUBJECT_REQUIRED),
            (Box::new(|d: &mut BroadcastDraft| d.body = "<p><br></p>".to_string()), BODY_REQUIRED),
            (
                Box::new(|d: &mut BroadcastDraft| d.rate_limit = RateLimit { users_per_minute: Some(0) }),
                RATE_LIMIT_TOO_LOW,
            ),
            (
                Box::new(|d: &mut BroadcastDraft| {
                    d.scheduling = Scheduling {
                        send_now: false,
                        ..Default::default()
                    }
                }),
                SCHEDULE_REQUIRED,
            ),
        ];

        for (break_draft, expected) in cases {
            let mut draft = base.clone();
            break_draft(&mut draft);

            let report = validate_broadcast_payload(&draft, now());
            assert!(!report.valid, "{}", expected);
            assert_eq!(report.errors, vec![expected.to_string()]);
        }
    }

    #[test]
    fn test_high_spam_subject_is_an_error() {
        let mut draft = valid_draft();
        draft.subject = "FREE MONEY!!! ACT NOW!!!".to_string();

        let report = validate_broadcast_payload(&draft, now());
        assert!(!report.valid);
        assert!(report.errors[0].starts_with("Subject line has a high spam risk"));
    }

    #[test]
    fn test_medium_spam_subject_is_a_warning() {
        let mut draft = valid_draft();
        draft.subject = "Limited time: 20% off".to_string();

        let report = validate_broadcast_payload(&draft, now());
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_in_app_only_does_not_need_subject() {
        let mut draft = valid_draft();
        draft.channels = Channels {
            email: false,
            in_app: true,
        };
        draft.subject.clear();

        assert!(validate_broadcast_payload(&draft, now()).valid);
    }

    #[test]
    fn test_scheduling_past_and_future() {
        let mut draft = valid_draft();
        draft.scheduling = Scheduling {
            send_now: false,
            scheduled_for: Some(now() - Duration::minutes(5)),
            timezone: None,
        };

        let report = validate_broadcast_payload(&draft, now());
        assert_eq!(report.errors, vec![SCHEDULE_IN_PAST.to_string()]);

        draft.scheduling.scheduled_for = Some(now() + Duration::hours(2));
        let report = validate_broadcast_payload(&draft, now());
        assert!(report.valid);
        assert!(!report.errors.iter().any(|e| e == SCHEDULE_IN_PAST));
    }

    #[test]
    fn test_high_rate_limit_only_warns() {
        let mut draft = valid_draft();
        draft.rate_limit.users_per_minute = Some(15_000);

        let report = validate_broadcast_payload(&draft, now());
        assert!(report.valid);
        assert_eq!(report.warnings, vec![RATE_LIMIT_HIGH.to_string()]);
    }

    #[test]
    fn test_cta_warnings() {
        let mut draft = valid_draft();
        draft.cta_label = "Shop now".to_string();

        let report = validate_broadcast_payload(&draft, now());
        assert!(report.valid);
        assert_eq!(report.warnings, vec![CTA_LINK_MISSING.to_string()]);

        draft.cta_label.clear();
        draft.cta_link = "/rider/jobs".to_string();
        let report = validate_broadcast_payload(&draft, now());
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.warnings[0], CTA_LABEL_MISSING);
        assert!(report.warnings[1].contains("/buyer/*"));
    }

    #[test]
    fn test_role_override_link_checked_against_its_role() {
        let mut draft = valid_draft();
        draft.role_specific_messages.insert(
            AudienceRole::Seller,
            RoleMessage {
                cta_link: Some("/shop/deals".to_string()),
                ..Default::default()
            },
        );

        let report = validate_broadcast_payload(&draft, now());
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("seller message"));
    }

    #[test]
    fn test_step_projections() {
        let empty = BroadcastDraft::default();

        let audience = validate_step(WizardStep::Audience, &empty, now());
        assert_eq!(audience.errors, vec![TYPE_REQUIRED.to_string(), AUDIENCE_REQUIRED.to_string()]);

        assert!(validate_step(WizardStep::Targeting, &empty, now()).valid);

        let channels = validate_step(WizardStep::Channels, &empty, now());
        assert_eq!(channels.errors, vec![CHANNEL_REQUIRED.to_string()]);

        let message = validate_step(WizardStep::Message, &empty, now());
        assert_eq!(message.errors, vec![BODY_REQUIRED.to_string()]);

        let review = validate_step(WizardStep::Review, &empty, now());
        assert_eq!(review, validate_broadcast_payload(&empty, now()));
    }

    #[test]
    fn test_blank_markup() {
        assert!(is_blank_markup(""));
        assert!(is_blank_markup("  <p>&nbsp;</p> "));
        assert!(!is_blank_markup("<p>20% off</p>"));
        assert!(!is_blank_markup("2 < 3"));
        assert!(!is_blank_markup("<3"));
        assert!(!is_blank_markup("<p><3</p>"));
        assert!(is_blank_markup("<!-- empty --><p></p>"));
    }
}
