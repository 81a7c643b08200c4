use log::{debug, info};
use std::sync::Arc;

use crate::config::MockConfig;
use crate::error::{Result, SpreedlyError};
use crate::invoice::{CreditCard, Invoice};
use crate::mode::{self, ClientMode, MOCK};
use crate::plans::{PlanCatalog, SubscriptionPlan};
use crate::resource::ResourceDefaults;
use crate::subscriber::{Subscriber, SubscriberParams, SubscriberRegistry};

const DISALLOWED_SUBSCRIBER_KEY: &str = "extra_invalid_element";

/// Drop-in stand-in for the billing client. Each instance owns its own
/// subscriber registry, so separate tests can use separate clients.
#[derive(Debug)]
pub struct MockClient {
    config: MockConfig,
    defaults: Arc<ResourceDefaults>,
    subscribers: SubscriberRegistry,
    plans: PlanCatalog,
}

impl MockClient {
    pub fn new() -> Result<Self> {
        Self::with_config(MockConfig::default())
    }

    pub fn from_env() -> Result<Self> {
        Self::with_config(MockConfig::load()?)
    }

    pub fn with_config(config: MockConfig) -> Result<Self> {
        Self::with_defaults(config, ResourceDefaults::default())
    }

    /// Fails if a real client has already claimed this process.
    pub fn with_defaults(config: MockConfig, defaults: ResourceDefaults) -> Result<Self> {
        mode::activate(ClientMode::Mock)?;
        let plans = PlanCatalog::seeded(&defaults.plan);
        debug!("Mock billing client ready for site {:?}", config.site_name);
        Ok(Self {
            config,
            defaults: Arc::new(defaults),
            subscribers: SubscriberRegistry::new(),
            plans,
        })
    }

    pub fn mode(&self) -> &'static str {
        MOCK
    }

    pub fn configure(&mut self, site_name: impl Into<String>, api_token: impl Into<String>) {
        self.config = MockConfig::new(site_name, api_token);
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    pub fn site_name(&self) -> Option<&str> {
        self.config.site_name.as_deref()
    }

    pub fn api_token(&self) -> Option<&str> {
        self.config.api_token.as_deref()
    }

    pub fn defaults(&self) -> &ResourceDefaults {
        &self.defaults
    }

    /// Builds a detached subscriber with this client's defaults. Nothing is
    /// stored.
    pub fn new_subscriber(&self, params: SubscriberParams) -> Result<Subscriber> {
        self.defaults.subscriber.build(params)
    }

    pub fn create_subscriber(
        &mut self,
        customer_id: &str,
        email: Option<&str>,
        screen_name: Option<&str>,
        attrs: SubscriberParams,
    ) -> Result<Subscriber> {
        self.subscribers.create(
            &self.defaults.subscriber,
            customer_id,
            email,
            screen_name,
            attrs,
        )
    }

    pub fn find_subscriber(&self, customer_id: &str) -> Option<&Subscriber> {
        self.subscribers.find(customer_id)
    }

    pub fn subscriber_mut(&mut self, customer_id: &str) -> Option<&mut Subscriber> {
        self.subscribers.find_mut(customer_id)
    }

    pub fn delete_subscriber(&mut self, customer_id: &str) -> Option<Subscriber> {
        self.subscribers.delete(customer_id)
    }

    pub fn all_subscribers(&self) -> Vec<&Subscriber> {
        self.subscribers.all()
    }

    pub fn wipe_subscribers(&mut self) {
        self.subscribers.wipe();
    }

    pub fn subscribers(&self) -> &SubscriberRegistry {
        &self.subscribers
    }

    pub fn comp(
        &mut self,
        customer_id: &str,
        quantity: Option<i64>,
        units: Option<&str>,
        feature_level: Option<&str>,
    ) -> Result<Subscriber> {
        self.subscribers
            .comp(customer_id, quantity, units, feature_level)
    }

    pub fn activate_free_trial(
        &mut self,
        customer_id: &str,
        plan_id: Option<u32>,
    ) -> Result<Subscriber> {
        self.subscribers
            .activate_free_trial(customer_id, plan_id, &self.plans)
    }

    pub fn stop_auto_renew(&mut self, customer_id: &str) -> Result<Subscriber> {
        self.subscribers.stop_auto_renew(customer_id)
    }

    pub fn subscribe(&mut self, customer_id: &str, plan_id: u32) -> Result<Subscriber> {
        self.subscribers.subscribe(customer_id, plan_id, &self.plans)
    }

    pub fn find_plan(&self, plan_id: u32) -> Option<&SubscriptionPlan> {
        self.plans.find(plan_id)
    }

    pub fn find_plan_key(&self, key: &str) -> Option<&SubscriptionPlan> {
        self.plans.find_key(key)
    }

    pub fn all_plans(&self) -> Vec<&SubscriptionPlan> {
        self.plans.all()
    }

    /// Opens an invoice for `plan_id` and registers the payload's subscriber
    /// (inactive) unless one with that id already exists.
    pub fn create_invoice(
        &mut self,
        plan_id: impl ToString,
        subscriber: SubscriberParams,
    ) -> Result<Invoice> {
        let plan_key = plan_id.to_string();

        let disallowed = subscriber
            .extra
            .get(DISALLOWED_SUBSCRIBER_KEY)
            .is_some_and(|value| value.is_truthy());
        if disallowed {
            return Err(SpreedlyError::validation(DISALLOWED_SUBSCRIBER_KEY));
        }

        if self.plans.find_key(&plan_key).is_none() {
            return Err(SpreedlyError::not_found("the subscription plan does not exist"));
        }

        let invoice = Invoice::new(Arc::clone(&self.defaults), plan_key.as_str(), subscriber.clone());

        let registered = self.defaults.subscriber.build(subscriber.active(false))?;
        let customer_id = registered.customer_id.clone();
        if self.subscribers.insert_if_absent(registered) {
            info!("Registered subscriber {customer_id} from invoice for plan {plan_key}");
        }

        Ok(invoice)
    }

    /// Shortcut payment path: activates whichever subscriber was registered
    /// last. The card and token are not looked at; callers relying on it should
    /// create the paying subscriber immediately before paying.
    pub fn pay_invoice(&mut self, _card: &CreditCard, invoice_token: &str) -> Result<Subscriber> {
        let subscriber = self
            .subscribers
            .last_mut()
            .ok_or_else(|| SpreedlyError::not_found("no subscriber to pay invoice for"))?;
        subscriber.active = true;
        debug!(
            "Paid invoice {invoice_token} for most recent subscriber {}",
            subscriber.customer_id
        );
        Ok(subscriber.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{AttributeValue, Deferred};
    use crate::subscriber::SubscriberDefaults;

    fn client() -> MockClient {
        MockClient::new().unwrap()
    }

    #[test]
    fn test_configure_round_trips() {
        let mut client = client();
        assert!(client.site_name().is_none());

        client.configure("acme", "secret");
        assert_eq!(client.site_name(), Some("acme"));
        assert_eq!(client.api_token(), Some("secret"));
        assert_eq!(client.mode(), "mock");
    }

    #[test]
    fn test_from_env_reads_site_settings() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("spreedly.toml", "site_name = \"file-site\"\napi_token = \"t\"")?;
            jail.set_env("SPREEDLY_SITE_NAME", "env-site");

            let client = MockClient::from_env().map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(client.site_name(), Some("env-site"));
            assert_eq!(client.api_token(), Some("t"));
            Ok(())
        });
    }

    #[test]
    fn test_clients_are_isolated() {
        let mut first = client();
        let second = client();
        first
            .create_subscriber("1", None, None, SubscriberParams::default())
            .unwrap();
        assert!(first.find_subscriber("1").is_some());
        assert!(second.find_subscriber("1").is_none());
    }

    #[test]
    fn test_custom_defaults_flow_into_records() {
        let defaults = ResourceDefaults {
            subscriber: SubscriberDefaults {
                token: Deferred::constant(7),
                ..SubscriberDefaults::default()
            },
            ..ResourceDefaults::default()
        };
        let mut client = MockClient::with_defaults(MockConfig::default(), defaults).unwrap();
        let sub = client
            .create_subscriber("1", None, None, SubscriberParams::default())
            .unwrap();
        assert_eq!(sub.token, 7);
    }

    #[test]
    fn test_create_invoice_registers_inactive_subscriber() {
        let mut client = client();
        let invoice = client
            .create_invoice(1, SubscriberParams::with_customer_id("joe").active(true))
            .unwrap();

        assert_eq!(invoice.subscription_plan_id, "1");
        let stored = client.find_subscriber("joe").unwrap();
        assert!(!stored.active);
    }

    #[test]
    fn test_create_invoice_keeps_existing_subscriber() {
        let mut client = client();
        client
            .create_subscriber("joe", Some("joe@example.com"), None, SubscriberParams::default().active(true))
            .unwrap();

        client
            .create_invoice("3", SubscriberParams::with_customer_id("joe"))
            .unwrap();

        let stored = client.find_subscriber("joe").unwrap();
        assert!(stored.active);
        assert_eq!(stored.email.as_deref(), Some("joe@example.com"));
        assert_eq!(client.all_subscribers().len(), 1);
    }

    #[test]
    fn test_create_invoice_rejects_disallowed_key() {
        let mut client = client();
        let err = client
            .create_invoice(
                1,
                SubscriberParams::with_customer_id("joe").extra("extra_invalid_element", true),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "extra_invalid_element");
        assert!(client.find_subscriber("joe").is_none());
    }

    #[test]
    fn test_create_invoice_falsy_disallowed_key_is_ignored() {
        let mut client = client();
        let params = SubscriberParams::with_customer_id("joe")
            .extra("extra_invalid_element", AttributeValue::Null);
        assert!(client.create_invoice(1, params).is_ok());
    }

    #[test]
    fn test_create_invoice_unknown_plan() {
        let mut client = client();
        let err = client
            .create_invoice(999, SubscriberParams::with_customer_id("joe"))
            .unwrap_err();
        assert_eq!(err.to_string(), "the subscription plan does not exist");
        assert!(client.all_subscribers().is_empty());
    }

    #[test]
    fn test_create_invoice_blank_subscriber() {
        let mut client = client();
        let err = client
            .create_invoice(1, SubscriberParams::default())
            .unwrap_err();
        assert!(matches!(err, SpreedlyError::Validation(_)));
    }

    #[test]
    fn test_pay_invoice_shortcut_activates_latest() {
        let mut client = client();
        for id in ["a", "b"] {
            client
                .create_subscriber(id, None, None, SubscriberParams::default())
                .unwrap();
        }

        let paid = client
            .pay_invoice(&CreditCard::new("4012888888881881"), "ignored")
            .unwrap();
        assert_eq!(paid.customer_id, "b");
        assert!(client.find_subscriber("b").unwrap().active);
        assert!(!client.find_subscriber("a").unwrap().active);
    }

    #[test]
    fn test_pay_invoice_shortcut_without_subscribers() {
        let mut client = client();
        let err = client
            .pay_invoice(&CreditCard::new("1"), "token")
            .unwrap_err();
        assert!(matches!(err, SpreedlyError::NotFound(_)));
    }
}
