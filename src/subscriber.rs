use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, SpreedlyError};
use crate::resource::{assign, AttributeValue, Deferred, ExtraAttributes, Resource};

const BLANK_CUSTOMER_ID: &str = "Could not create subscriber: Customer ID can't be blank.";
const ALREADY_EXISTS: &str = "Could not create subscriber: already exists.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub customer_id: String,
    pub email: Option<String>,
    pub screen_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub token: i64,
    pub active: bool,
    pub store_credit: BigDecimal,
    pub active_until: Option<DateTime<Utc>>,
    pub feature_level: String,
    pub on_trial: bool,
    pub recurring: bool,
    #[serde(default)]
    pub extra: ExtraAttributes,
}

impl Subscriber {
    /// Builds a subscriber from the standard defaults.
    pub fn new(params: SubscriberParams) -> Result<Self> {
        SubscriberDefaults::default().build(params)
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn on_trial(&self) -> bool {
        self.on_trial
    }

    pub fn recurring(&self) -> bool {
        self.recurring
    }

    /// Sets an attribute by name, bypassing validation (a blank customer id is
    /// accepted here).
    pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) -> Result<()> {
        self.write(name, value.into())
    }
}

impl Resource for Subscriber {
    const KIND: &'static str = "Subscriber";
    const FIELDS: &'static [&'static str] = &[
        "customer_id",
        "email",
        "screen_name",
        "created_at",
        "token",
        "active",
        "store_credit",
        "active_until",
        "feature_level",
        "on_trial",
        "recurring",
    ];

    fn read(&self, name: &str) -> Option<AttributeValue> {
        let value = match name {
            "id" | "customer_id" => self.customer_id.clone().into(),
            "email" => self.email.clone().into(),
            "screen_name" => self.screen_name.clone().into(),
            "created_at" => self.created_at.into(),
            "token" => self.token.into(),
            "active" => self.active.into(),
            "store_credit" => self.store_credit.clone().into(),
            "active_until" => self.active_until.into(),
            "feature_level" => self.feature_level.clone().into(),
            "on_trial" => self.on_trial.into(),
            "recurring" => self.recurring.into(),
            other => return self.extra.get(other).cloned(),
        };
        Some(value)
    }

    fn write(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        let kind = Self::KIND;
        match name {
            "id" | "customer_id" => assign(kind, name, &mut self.customer_id, value),
            "email" => assign(kind, name, &mut self.email, value),
            "screen_name" => assign(kind, name, &mut self.screen_name, value),
            "created_at" => assign(kind, name, &mut self.created_at, value),
            "token" => assign(kind, name, &mut self.token, value),
            "active" => assign(kind, name, &mut self.active, value),
            "store_credit" => assign(kind, name, &mut self.store_credit, value),
            "active_until" => assign(kind, name, &mut self.active_until, value),
            "feature_level" => assign(kind, name, &mut self.feature_level, value),
            "on_trial" => assign(kind, name, &mut self.on_trial, value),
            "recurring" => assign(kind, name, &mut self.recurring, value),
            other => {
                self.extra.insert(other.to_string(), value);
                Ok(())
            }
        }
    }

    fn extra(&self) -> &ExtraAttributes {
        &self.extra
    }

    fn id(&self) -> AttributeValue {
        self.customer_id.clone().into()
    }
}

/// Caller-supplied subscriber attributes. `None` fields fall back to the
/// configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberParams {
    pub customer_id: Option<String>,
    pub email: Option<String>,
    pub screen_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub token: Option<i64>,
    pub active: Option<bool>,
    pub store_credit: Option<BigDecimal>,
    pub active_until: Option<DateTime<Utc>>,
    pub feature_level: Option<String>,
    pub on_trial: Option<bool>,
    pub recurring: Option<bool>,
    #[serde(flatten)]
    pub extra: ExtraAttributes,
}

impl SubscriberParams {
    pub fn with_customer_id(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: Some(customer_id.into()),
            ..Self::default()
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn screen_name(mut self, screen_name: impl Into<String>) -> Self {
        self.screen_name = Some(screen_name.into());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn extra(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Merges `other` on top of `self`; any field set in `other` wins.
    pub fn overlay(self, other: SubscriberParams) -> Self {
        let mut extra = self.extra;
        extra.extend(other.extra);
        Self {
            customer_id: other.customer_id.or(self.customer_id),
            email: other.email.or(self.email),
            screen_name: other.screen_name.or(self.screen_name),
            created_at: other.created_at.or(self.created_at),
            token: other.token.or(self.token),
            active: other.active.or(self.active),
            store_credit: other.store_credit.or(self.store_credit),
            active_until: other.active_until.or(self.active_until),
            feature_level: other.feature_level.or(self.feature_level),
            on_trial: other.on_trial.or(self.on_trial),
            recurring: other.recurring.or(self.recurring),
            extra,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubscriberDefaults {
    pub created_at: Deferred<DateTime<Utc>>,
    pub token: Deferred<i64>,
    pub active: Deferred<bool>,
    pub store_credit: Deferred<BigDecimal>,
    pub active_until: Deferred<Option<DateTime<Utc>>>,
    pub feature_level: Deferred<String>,
    pub on_trial: Deferred<bool>,
    pub recurring: Deferred<bool>,
}

impl Default for SubscriberDefaults {
    fn default() -> Self {
        Self {
            created_at: Deferred::new(Utc::now),
            token: Deferred::new(|| rand::thread_rng().gen_range(0..=1000)),
            active: Deferred::constant(false),
            store_credit: Deferred::new(|| BigDecimal::from(0)),
            active_until: Deferred::constant(None),
            feature_level: Deferred::new(String::new),
            on_trial: Deferred::constant(false),
            recurring: Deferred::constant(false),
        }
    }
}

impl SubscriberDefaults {
    /// Runs every producer, overlays `params`, then rejects a blank customer id.
    pub fn build(&self, params: SubscriberParams) -> Result<Subscriber> {
        let mut subscriber = Subscriber {
            customer_id: String::new(),
            email: None,
            screen_name: None,
            created_at: self.created_at.produce(),
            token: self.token.produce(),
            active: self.active.produce(),
            store_credit: self.store_credit.produce(),
            active_until: self.active_until.produce(),
            feature_level: self.feature_level.produce(),
            on_trial: self.on_trial.produce(),
            recurring: self.recurring.produce(),
            extra: ExtraAttributes::new(),
        };

        let SubscriberParams {
            customer_id,
            email,
            screen_name,
            created_at,
            token,
            active,
            store_credit,
            active_until,
            feature_level,
            on_trial,
            recurring,
            extra,
        } = params;

        if let Some(v) = customer_id {
            subscriber.customer_id = v;
        }
        subscriber.email = email;
        subscriber.screen_name = screen_name;
        if let Some(v) = created_at {
            subscriber.created_at = v;
        }
        if let Some(v) = token {
            subscriber.token = v;
        }
        if let Some(v) = active {
            subscriber.active = v;
        }
        if let Some(v) = store_credit {
            subscriber.store_credit = v;
        }
        if active_until.is_some() {
            subscriber.active_until = active_until;
        }
        if let Some(v) = feature_level {
            subscriber.feature_level = v;
        }
        if let Some(v) = on_trial {
            subscriber.on_trial = v;
        }
        if let Some(v) = recurring {
            subscriber.recurring = v;
        }
        subscriber.extra = extra;

        if subscriber.customer_id.is_empty() {
            return Err(SpreedlyError::validation(BLANK_CUSTOMER_ID));
        }
        Ok(subscriber)
    }
}

/// Subscribers keyed by customer id, enumerated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SubscriberRegistry {
    pub(crate) subscribers: HashMap<String, Subscriber>,
    pub(crate) order: Vec<String>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        defaults: &SubscriberDefaults,
        customer_id: &str,
        email: Option<&str>,
        screen_name: Option<&str>,
        optional: SubscriberParams,
    ) -> Result<Subscriber> {
        let base = SubscriberParams {
            customer_id: Some(customer_id.to_string()),
            email: email.map(str::to_string),
            screen_name: screen_name.map(str::to_string),
            ..SubscriberParams::default()
        };
        let subscriber = defaults.build(base.overlay(optional))?;

        if self.subscribers.contains_key(&subscriber.customer_id) {
            return Err(SpreedlyError::conflict(ALREADY_EXISTS));
        }

        info!("Created mock subscriber {}", subscriber.customer_id);
        self.insert(subscriber.clone());
        Ok(subscriber)
    }

    /// Inserts unless the id is already taken. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, subscriber: Subscriber) -> bool {
        if self.subscribers.contains_key(&subscriber.customer_id) {
            return false;
        }
        self.insert(subscriber);
        true
    }

    fn insert(&mut self, subscriber: Subscriber) {
        self.order.push(subscriber.customer_id.clone());
        self.subscribers
            .insert(subscriber.customer_id.clone(), subscriber);
    }

    pub fn find(&self, customer_id: &str) -> Option<&Subscriber> {
        self.subscribers.get(customer_id)
    }

    pub fn find_mut(&mut self, customer_id: &str) -> Option<&mut Subscriber> {
        self.subscribers.get_mut(customer_id)
    }

    pub fn contains(&self, customer_id: &str) -> bool {
        self.subscribers.contains_key(customer_id)
    }

    pub fn delete(&mut self, customer_id: &str) -> Option<Subscriber> {
        let removed = self.subscribers.remove(customer_id);
        if removed.is_some() {
            self.order.retain(|id| id != customer_id);
            debug!("Deleted mock subscriber {customer_id}");
        }
        removed
    }

    pub fn all(&self) -> Vec<&Subscriber> {
        self.order
            .iter()
            .filter_map(|id| self.subscribers.get(id))
            .collect()
    }

    /// The most recently inserted subscriber still in the registry.
    pub fn last_mut(&mut self) -> Option<&mut Subscriber> {
        let id = self.order.last()?;
        self.subscribers.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn wipe(&mut self) {
        debug!("Wiping {} mock subscribers", self.subscribers.len());
        self.subscribers.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn create(registry: &mut SubscriberRegistry, id: &str) -> Result<Subscriber> {
        registry.create(
            &SubscriberDefaults::default(),
            id,
            Some("joe@example.com"),
            Some("joe"),
            SubscriberParams::default(),
        )
    }

    #[test]
    fn test_new_applies_defaults() {
        let before = Utc::now();
        let sub = Subscriber::new(SubscriberParams::with_customer_id("42")).unwrap();

        assert_eq!(sub.customer_id, "42");
        assert!(!sub.active);
        assert!(!sub.on_trial);
        assert!(!sub.recurring);
        assert_eq!(sub.store_credit, BigDecimal::from_str("0.0").unwrap());
        assert!(sub.active_until.is_none());
        assert_eq!(sub.feature_level, "");
        assert!((0..=1000).contains(&sub.token));
        assert!(sub.created_at >= before);
    }

    #[test]
    fn test_new_rejects_blank_customer_id() {
        let err = Subscriber::new(SubscriberParams::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not create subscriber: Customer ID can't be blank."
        );

        let err = Subscriber::new(SubscriberParams::with_customer_id("")).unwrap_err();
        assert!(matches!(err, SpreedlyError::Validation(_)));
    }

    #[test]
    fn test_params_override_defaults() {
        let params = SubscriberParams {
            active: Some(true),
            feature_level: Some("gold".to_string()),
            ..SubscriberParams::with_customer_id("7")
        };
        let sub = Subscriber::new(params).unwrap();
        assert!(sub.active);
        assert_eq!(sub.feature_level, "gold");
    }

    #[test]
    fn test_defaults_are_not_shared_between_instances() {
        let defaults = SubscriberDefaults::default();
        let mut first = defaults
            .build(SubscriberParams::with_customer_id("a"))
            .unwrap();
        let second = defaults
            .build(SubscriberParams::with_customer_id("b"))
            .unwrap();

        first.store_credit += BigDecimal::from(10);
        assert_eq!(second.store_credit, BigDecimal::from(0));
    }

    #[test]
    fn test_custom_default_producer() {
        let defaults = SubscriberDefaults {
            token: Deferred::constant(99),
            ..SubscriberDefaults::default()
        };
        let sub = defaults
            .build(SubscriberParams::with_customer_id("x"))
            .unwrap();
        assert_eq!(sub.token, 99);
    }

    #[test]
    fn test_overlay_prefers_right_hand_side() {
        let base = SubscriberParams::with_customer_id("1").email("a@example.com");
        let merged = base.overlay(SubscriberParams {
            customer_id: Some("2".to_string()),
            ..SubscriberParams::default()
        });
        assert_eq!(merged.customer_id.as_deref(), Some("2"));
        assert_eq!(merged.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_attribute_reads_and_predicates() {
        let mut sub = Subscriber::new(
            SubscriberParams::with_customer_id("9").extra("nickname", "nine"),
        )
        .unwrap();

        assert_eq!(sub.id(), AttributeValue::Text("9".to_string()));
        assert_eq!(sub.attribute("active").unwrap(), AttributeValue::Bool(false));
        assert_eq!(sub.attribute("active?").unwrap(), AttributeValue::Bool(false));
        assert_eq!(sub.attribute("nickname").unwrap(), AttributeValue::from("nine"));
        assert_eq!(sub.attribute("active_until?").unwrap(), AttributeValue::Bool(false));
        assert!(sub.is("feature_level").unwrap());

        sub.set("active", true).unwrap();
        assert!(sub.is("active?").unwrap());

        let err = sub.attribute("shoe_size").unwrap_err();
        assert!(matches!(err, SpreedlyError::NoSuchAttribute { kind: "Subscriber", .. }));
        assert!(sub.attribute("shoe_size?").is_err());
    }

    #[test]
    fn test_setter_bypasses_validation() {
        let mut sub = Subscriber::new(SubscriberParams::with_customer_id("3")).unwrap();
        sub.set("customer_id", "").unwrap();
        assert_eq!(sub.customer_id, "");

        sub.set("favorite_color", "teal").unwrap();
        assert!(sub.attribute_names().contains(&"favorite_color".to_string()));

        assert!(sub.set("on_trial", "sometimes").is_err());
    }

    #[test]
    fn test_registry_create_and_find() {
        let mut registry = SubscriberRegistry::new();
        let sub = create(&mut registry, "100").unwrap();

        assert_eq!(sub.email.as_deref(), Some("joe@example.com"));
        assert_eq!(registry.find("100"), Some(&sub));
        assert!(registry.find("101").is_none());
    }

    #[test]
    fn test_registry_rejects_duplicate() {
        let mut registry = SubscriberRegistry::new();
        let original = create(&mut registry, "100").unwrap();

        let err = registry
            .create(
                &SubscriberDefaults::default(),
                "100",
                Some("other@example.com"),
                None,
                SubscriberParams::default(),
            )
            .unwrap_err();

        assert_eq!(err.to_string(), "Could not create subscriber: already exists.");
        assert_eq!(registry.find("100"), Some(&original));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_optional_attrs_can_replace_id() {
        let mut registry = SubscriberRegistry::new();
        let sub = registry
            .create(
                &SubscriberDefaults::default(),
                "100",
                None,
                None,
                SubscriberParams::with_customer_id("200"),
            )
            .unwrap();
        assert_eq!(sub.customer_id, "200");
        assert!(registry.contains("200"));
        assert!(!registry.contains("100"));
    }

    #[test]
    fn test_registry_enumeration_order_and_delete() {
        let mut registry = SubscriberRegistry::new();
        for id in ["c", "a", "b"] {
            create(&mut registry, id).unwrap();
        }
        let ids: Vec<_> = registry.all().iter().map(|s| s.customer_id.clone()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        assert!(registry.delete("b").is_some());
        assert!(registry.delete("missing").is_none());
        assert_eq!(registry.last_mut().map(|s| s.customer_id.clone()), Some("a".to_string()));
    }

    #[test]
    fn test_insert_if_absent_is_idempotent() {
        let mut registry = SubscriberRegistry::new();
        let first = Subscriber::new(SubscriberParams::with_customer_id("5").active(true)).unwrap();
        let second = Subscriber::new(SubscriberParams::with_customer_id("5")).unwrap();

        assert!(registry.insert_if_absent(first));
        assert!(!registry.insert_if_absent(second));
        assert!(registry.find("5").map(Subscriber::active).unwrap_or(false));
        assert_eq!(registry.all().len(), 1);
    }

    #[test]
    fn test_wipe_clears_everything() {
        let mut registry = SubscriberRegistry::new();
        create(&mut registry, "1").unwrap();
        registry.wipe();
        assert!(registry.is_empty());
        assert!(registry.all().is_empty());
        assert!(registry.find("1").is_none());
        assert!(registry.last_mut().is_none());
    }
}
