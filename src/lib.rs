//! In-memory fake of the Spreedly subscription billing client.
//!
//! Application tests construct a [`MockClient`] instead of the real client and
//! get the same resources (subscribers, subscription plans, invoices and line
//! items), the same validation failures and a couple of canned gateway
//! failures, without any network traffic.
//!
//! ```
//! use spreedly_mock::{CreditCard, MockClient, SubscriberParams};
//!
//! let mut client = MockClient::new()?;
//! client.create_subscriber("42", Some("joe@example.com"), Some("joe"), SubscriberParams::default())?;
//! client.comp("42", Some(1), Some("days"), None)?;
//! assert!(client.find_subscriber("42").is_some_and(|s| s.active));
//!
//! let mut invoice = client.create_invoice(4, SubscriberParams::with_customer_id("43"))?;
//! assert_eq!(invoice.line_items().len(), 2);
//! assert!(invoice.pay(&CreditCard::new("4012888888881881")).is_err());
//! assert!(invoice.closed);
//! # Ok::<(), spreedly_mock::SpreedlyError>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod invoice;
pub mod lifecycle;
pub mod mode;
pub mod plans;
pub mod resource;
pub mod subscriber;

pub use client::MockClient;
pub use config::MockConfig;
pub use error::{Result, SpreedlyError};
pub use invoice::{CreditCard, Invoice, LineItem, LineItemDefaults, LineItemParams};
pub use mode::{ClientMode, MOCK};
pub use plans::{PlanCatalog, PlanDefaults, PlanParams, SubscriptionPlan};
pub use resource::{AttributeValue, Deferred, Resource, ResourceDefaults};
pub use subscriber::{Subscriber, SubscriberDefaults, SubscriberParams, SubscriberRegistry};
