#![allow(dead_code)]

#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(err) => panic!("Expected Ok, got Err: {:?}", err),
        }
    };
}

#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(val) => panic!("Expected Err, got Ok: {:?}", val),
            Err(err) => err,
        }
    };
}

use spreedly_mock::{MockClient, Subscriber, SubscriberParams};
use std::sync::Once;

static INIT: Once = Once::new();

pub fn setup() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub fn client() -> MockClient {
    setup();
    assert_ok!(MockClient::new())
}

pub fn subscriber(client: &mut MockClient, customer_id: &str) -> Subscriber {
    let email = format!("{customer_id}@example.com");
    assert_ok!(client.create_subscriber(
        customer_id,
        Some(email.as_str()),
        Some(customer_id),
        SubscriberParams::default(),
    ))
}
