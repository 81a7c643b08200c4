//! Attribute plumbing shared by every mock resource kind.
//!
//! Each kind is a plain struct with a declared field list. Values that callers
//! pass for undeclared names land in an `extra` map and stay readable, but a
//! name that is neither declared nor supplied is an error.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, SpreedlyError};
use crate::invoice::{InvoiceDefaults, LineItemDefaults};
use crate::plans::PlanDefaults;
use crate::subscriber::SubscriberDefaults;

pub type ExtraAttributes = BTreeMap<String, AttributeValue>;

/// Dynamically typed attribute value.
///
/// Variant order matters for untagged deserialization: strings that parse as
/// RFC 3339 timestamps become `Time`, every other string stays `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Time(DateTime<Utc>),
    Text(String),
    Decimal(BigDecimal),
}

impl AttributeValue {
    /// Only `Null` and `Bool(false)` are falsy. Zero and the empty string are
    /// truthy, matching the provider's client library.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Null | Self::Bool(false))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<&BigDecimal> {
        match self {
            Self::Decimal(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Decimal(d) => write!(f, "{d}"),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<BigDecimal> for AttributeValue {
    fn from(value: BigDecimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Time(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Conversion back from a dynamic value into a declared field's type.
pub trait FromAttribute: Sized {
    fn from_attribute(value: AttributeValue) -> Option<Self>;
}

impl FromAttribute for bool {
    fn from_attribute(value: AttributeValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromAttribute for i64 {
    fn from_attribute(value: AttributeValue) -> Option<Self> {
        value.as_integer()
    }
}

impl FromAttribute for u32 {
    fn from_attribute(value: AttributeValue) -> Option<Self> {
        value.as_integer().and_then(|i| u32::try_from(i).ok())
    }
}

impl FromAttribute for String {
    fn from_attribute(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl FromAttribute for BigDecimal {
    fn from_attribute(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Decimal(d) => Some(d),
            AttributeValue::Integer(i) => Some(BigDecimal::from(i)),
            _ => None,
        }
    }
}

impl FromAttribute for DateTime<Utc> {
    fn from_attribute(value: AttributeValue) -> Option<Self> {
        value.as_time()
    }
}

impl<T: FromAttribute> FromAttribute for Option<T> {
    fn from_attribute(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Null => Some(None),
            other => T::from_attribute(other).map(Some),
        }
    }
}

/// Stores `value` into a declared field, rejecting values of the wrong shape.
pub(crate) fn assign<T: FromAttribute>(
    kind: &'static str,
    name: &str,
    slot: &mut T,
    value: AttributeValue,
) -> Result<()> {
    let rendered = value.to_string();
    *slot = T::from_attribute(value).ok_or_else(|| SpreedlyError::AttributeType {
        kind,
        name: name.to_string(),
        value: rendered,
    })?;
    Ok(())
}

/// Read/write access to a record's attributes by name.
pub trait Resource {
    const KIND: &'static str;

    /// Declared attribute names, in declaration order.
    const FIELDS: &'static [&'static str];

    /// Looks up a declared field or a caller-supplied extra attribute.
    fn read(&self, name: &str) -> Option<AttributeValue>;

    /// Stores a value without any domain validation. Undeclared names are
    /// kept as extra attributes.
    fn write(&mut self, name: &str, value: AttributeValue) -> Result<()>;

    fn extra(&self) -> &ExtraAttributes;

    fn id(&self) -> AttributeValue {
        self.read("id").unwrap_or(AttributeValue::Null)
    }

    /// Reads an attribute by name. A trailing `?` asks for the truthiness of
    /// the remaining name instead of its value.
    fn attribute(&self, name: &str) -> Result<AttributeValue> {
        if let Some(base) = name.strip_suffix('?') {
            return self
                .attribute(base)
                .map(|value| AttributeValue::Bool(value.is_truthy()));
        }
        self.read(name).ok_or_else(|| SpreedlyError::NoSuchAttribute {
            kind: Self::KIND,
            name: name.to_string(),
        })
    }

    fn is(&self, name: &str) -> Result<bool> {
        self.attribute(name).map(|value| value.is_truthy())
    }

    fn attribute_names(&self) -> Vec<String> {
        Self::FIELDS
            .iter()
            .map(|name| name.to_string())
            .chain(self.extra().keys().cloned())
            .collect()
    }
}

/// A zero-argument producer invoked once for every new record.
pub struct Deferred<T>(Arc<dyn Fn() -> T + Send + Sync>);

impl<T> Deferred<T> {
    pub fn new<F>(producer: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self(Arc::new(producer))
    }

    pub fn produce(&self) -> T {
        (self.0)()
    }
}

impl<T: Clone + Send + Sync + 'static> Deferred<T> {
    pub fn constant(value: T) -> Self {
        Self::new(move || value.clone())
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

/// Default producers for every resource kind, built once per client.
#[derive(Debug, Clone, Default)]
pub struct ResourceDefaults {
    pub subscriber: SubscriberDefaults,
    pub invoice: InvoiceDefaults,
    pub plan: PlanDefaults,
    pub line_item: LineItemDefaults,
}
