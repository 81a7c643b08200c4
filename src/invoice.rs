use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use log::{info, warn};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Result, SpreedlyError};
use crate::plans::plan_id_from_key;
use crate::resource::{assign, AttributeValue, Deferred, ExtraAttributes, Resource, ResourceDefaults};
use crate::subscriber::{Subscriber, SubscriberParams};

pub const VALID_TEST_TOKEN: &str = "valid_test_token";

/// Card number the gateway refuses to authorize.
pub const DECLINED_CARD: &str = "4012888888881881";
/// Card number for which the gateway never answers.
pub const UNRESPONSIVE_GATEWAY_CARD: &str = "4111111111111111";

const PLUS_PLAN_KEY: &str = "4";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditCard {
    pub number: String,
    pub verification_value: Option<String>,
    pub month: Option<u32>,
    pub year: Option<u32>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub card_type: Option<String>,
}

impl CreditCard {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub subscription_plan_id: String,
    pub created_at: DateTime<Utc>,
    pub token: String,
    pub active: bool,
    pub store_credit: BigDecimal,
    pub active_until: Option<DateTime<Utc>>,
    pub feature_level: String,
    pub on_trial: bool,
    pub recurring: bool,
    pub closed: bool,
    pub extra: ExtraAttributes,
    #[serde(rename = "subscriber")]
    subscriber_data: SubscriberParams,
    #[serde(skip)]
    subscriber: OnceCell<Subscriber>,
    #[serde(skip)]
    defaults: Arc<ResourceDefaults>,
}

impl Invoice {
    /// Builds an invoice for `plan_key` around the given subscriber payload.
    /// The payload is kept aside and only turned into a subscriber on demand.
    pub fn new(
        defaults: Arc<ResourceDefaults>,
        plan_key: impl Into<String>,
        subscriber_data: SubscriberParams,
    ) -> Self {
        let d = &defaults.invoice;
        Self {
            subscription_plan_id: plan_key.into(),
            created_at: d.created_at.produce(),
            token: d.token.produce(),
            active: d.active.produce(),
            store_credit: d.store_credit.produce(),
            active_until: d.active_until.produce(),
            feature_level: d.feature_level.produce(),
            on_trial: d.on_trial.produce(),
            recurring: d.recurring.produce(),
            closed: d.closed.produce(),
            extra: ExtraAttributes::new(),
            subscriber_data,
            subscriber: OnceCell::new(),
            defaults,
        }
    }

    pub fn plan_id(&self) -> Option<u32> {
        plan_id_from_key(&self.subscription_plan_id)
    }

    pub fn closed(&self) -> bool {
        self.closed
    }

    pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) -> Result<()> {
        self.write(name, value.into())
    }

    /// The invoice's own subscriber, built from the stored payload the first
    /// time it is asked for and always starting inactive.
    pub fn subscriber(&self) -> Result<&Subscriber> {
        self.subscriber
            .get_or_try_init(|| self.materialize_subscriber())
    }

    pub fn subscriber_mut(&mut self) -> Result<&mut Subscriber> {
        self.subscriber()?;
        self.subscriber
            .get_mut()
            .ok_or_else(|| SpreedlyError::not_found("invoice subscriber"))
    }

    fn materialize_subscriber(&self) -> Result<Subscriber> {
        self.defaults
            .subscriber
            .build(self.subscriber_data.clone().active(false))
    }

    /// Rebuilt on every call: two items for the plus plan, one otherwise.
    pub fn line_items(&self) -> Vec<LineItem> {
        let count = if self.subscription_plan_id == PLUS_PLAN_KEY { 2 } else { 1 };
        (0..count)
            .map(|_| self.defaults.line_item.build(LineItemParams::default()))
            .collect()
    }

    /// Pays the invoice with `card`.
    ///
    /// The invoice is closed and its subscriber activated before anything is
    /// checked, so both stay set even when the payment fails.
    pub fn pay(&mut self, card: &CreditCard) -> Result<()> {
        self.closed = true;
        self.subscriber_mut()?.active = true;

        if self.token != VALID_TEST_TOKEN {
            return Err(SpreedlyError::not_found("Unable to find invoice"));
        }

        match card.number.as_str() {
            DECLINED_CARD => {
                warn!("Mock gateway declined card ending {}", last_four(&card.number));
                Err(SpreedlyError::ChargeDeclined(
                    "Charge not authorized".to_string(),
                ))
            }
            UNRESPONSIVE_GATEWAY_CARD => {
                warn!("Mock gateway timed out for card ending {}", last_four(&card.number));
                Err(SpreedlyError::GatewayUnavailable(
                    "The payment system is not responding".to_string(),
                ))
            }
            _ => {
                info!("Paid mock invoice for plan {}", self.subscription_plan_id);
                Ok(())
            }
        }
    }
}

fn last_four(number: &str) -> &str {
    number
        .char_indices()
        .rev()
        .nth(3)
        .map_or(number, |(idx, _)| &number[idx..])
}

impl Resource for Invoice {
    const KIND: &'static str = "Invoice";
    const FIELDS: &'static [&'static str] = &[
        "subscription_plan_id",
        "created_at",
        "token",
        "active",
        "store_credit",
        "active_until",
        "feature_level",
        "on_trial",
        "recurring",
        "closed",
    ];

    fn read(&self, name: &str) -> Option<AttributeValue> {
        let value = match name {
            "subscription_plan_id" => self.subscription_plan_id.clone().into(),
            "created_at" => self.created_at.into(),
            "token" => self.token.clone().into(),
            "active" => self.active.into(),
            "store_credit" => self.store_credit.clone().into(),
            "active_until" => self.active_until.into(),
            "feature_level" => self.feature_level.clone().into(),
            "on_trial" => self.on_trial.into(),
            "recurring" => self.recurring.into(),
            "closed" => self.closed.into(),
            other => return self.extra.get(other).cloned(),
        };
        Some(value)
    }

    fn write(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        let kind = Self::KIND;
        match name {
            "subscription_plan_id" => assign(kind, name, &mut self.subscription_plan_id, value),
            "created_at" => assign(kind, name, &mut self.created_at, value),
            "token" => assign(kind, name, &mut self.token, value),
            "active" => assign(kind, name, &mut self.active, value),
            "store_credit" => assign(kind, name, &mut self.store_credit, value),
            "active_until" => assign(kind, name, &mut self.active_until, value),
            "feature_level" => assign(kind, name, &mut self.feature_level, value),
            "on_trial" => assign(kind, name, &mut self.on_trial, value),
            "recurring" => assign(kind, name, &mut self.recurring, value),
            "closed" => assign(kind, name, &mut self.closed, value),
            other => {
                self.extra.insert(other.to_string(), value);
                Ok(())
            }
        }
    }

    fn extra(&self) -> &ExtraAttributes {
        &self.extra
    }
}

#[derive(Debug, Clone)]
pub struct InvoiceDefaults {
    pub created_at: Deferred<DateTime<Utc>>,
    pub token: Deferred<String>,
    pub active: Deferred<bool>,
    pub store_credit: Deferred<BigDecimal>,
    pub active_until: Deferred<Option<DateTime<Utc>>>,
    pub feature_level: Deferred<String>,
    pub on_trial: Deferred<bool>,
    pub recurring: Deferred<bool>,
    pub closed: Deferred<bool>,
}

impl Default for InvoiceDefaults {
    fn default() -> Self {
        Self {
            created_at: Deferred::new(Utc::now),
            token: Deferred::new(|| VALID_TEST_TOKEN.to_string()),
            active: Deferred::constant(false),
            store_credit: Deferred::new(|| BigDecimal::from(0)),
            active_until: Deferred::constant(None),
            feature_level: Deferred::new(String::new),
            on_trial: Deferred::constant(false),
            recurring: Deferred::constant(false),
            closed: Deferred::constant(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub amount: BigDecimal,
    pub description: String,
    #[serde(default)]
    pub extra: ExtraAttributes,
}

impl Resource for LineItem {
    const KIND: &'static str = "LineItem";
    const FIELDS: &'static [&'static str] = &["amount", "description"];

    fn read(&self, name: &str) -> Option<AttributeValue> {
        match name {
            "amount" => Some(self.amount.clone().into()),
            "description" => Some(self.description.clone().into()),
            other => self.extra.get(other).cloned(),
        }
    }

    fn write(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        match name {
            "amount" => assign(Self::KIND, name, &mut self.amount, value),
            "description" => assign(Self::KIND, name, &mut self.description, value),
            other => {
                self.extra.insert(other.to_string(), value);
                Ok(())
            }
        }
    }

    fn extra(&self) -> &ExtraAttributes {
        &self.extra
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItemParams {
    pub amount: Option<BigDecimal>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraAttributes,
}

#[derive(Debug, Clone)]
pub struct LineItemDefaults {
    pub amount: Deferred<BigDecimal>,
    pub description: Deferred<String>,
}

impl Default for LineItemDefaults {
    fn default() -> Self {
        Self {
            amount: Deferred::new(|| BigDecimal::from(0)),
            description: Deferred::new(String::new),
        }
    }
}

impl LineItemDefaults {
    pub fn build(&self, params: LineItemParams) -> LineItem {
        let amount = self.amount.produce();
        let description = self.description.produce();
        LineItem {
            amount: params.amount.unwrap_or(amount),
            description: params.description.unwrap_or(description),
            extra: params.extra,
        }
    }
}
