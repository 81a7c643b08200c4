use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

use crate::error::{Result, SpreedlyError};
use crate::plans::PlanCatalog;
use crate::subscriber::{Subscriber, SubscriberRegistry};

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const DAYS_PER_MONTH: i64 = 30;

const COMP_GONE: &str = "Could not comp subscriber: no longer exists.";
const COMP_INVALID: &str = "Could not comp subscriber: validation failed.";
const TRIAL_MISSING_PLAN: &str =
    "Could not activate free trial for subscriber: validation failed. missing subscription plan id";
const TRIAL_GONE: &str = "Could not activate free trial for subscriber: subscriber or subscription plan no longer exists.";
const TRIAL_INELIGIBLE: &str = "Could not activate free trial for subscriber: subscription plan either 1) isn't a free trial, 2) the subscriber is not eligible for a free trial, or 3) the subscription plan is not enabled.";
const STOP_RENEW_GONE: &str = "Could not stop auto renew for subscriber: subscriber does not exist.";

/// Computes the new paid-through time for a comp. `None` means the units are
/// not recognised; callers keep the stored `active_until` as it is instead of
/// resetting it to `None`.
pub fn extend_active_until(
    current: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    quantity: i64,
    units: &str,
) -> Result<Option<DateTime<Utc>>> {
    let days_per_unit = match units {
        "days" => 1,
        "months" => DAYS_PER_MONTH,
        _ => return Ok(None),
    };

    let start = current.map_or(now, |until| until.max(now));
    let extended = quantity
        .checked_mul(days_per_unit * SECONDS_PER_DAY)
        .and_then(Duration::try_seconds)
        .and_then(|delta| start.checked_add_signed(delta))
        .ok_or_else(|| SpreedlyError::validation(COMP_INVALID))?;
    Ok(Some(extended))
}

impl SubscriberRegistry {
    /// Grants access without a charge: pushes `active_until` forward from the
    /// later of now and the current value, and marks the subscriber active.
    pub fn comp(
        &mut self,
        customer_id: &str,
        quantity: Option<i64>,
        units: Option<&str>,
        feature_level: Option<&str>,
    ) -> Result<Subscriber> {
        let subscriber = self
            .find_mut(customer_id)
            .ok_or_else(|| SpreedlyError::not_found(COMP_GONE))?;

        let (Some(quantity), Some(units)) = (quantity, units) else {
            return Err(SpreedlyError::validation(COMP_INVALID));
        };

        match extend_active_until(subscriber.active_until, Utc::now(), quantity, units)? {
            Some(until) => subscriber.active_until = Some(until),
            None => warn!("Ignoring comp units {units:?} for subscriber {customer_id}"),
        }

        if let Some(level) = feature_level.filter(|level| !level.is_empty()) {
            subscriber.feature_level = level.to_string();
        }
        subscriber.active = true;

        info!(
            "Comped subscriber {customer_id} for {quantity} {units}, active until {:?}",
            subscriber.active_until
        );
        Ok(subscriber.clone())
    }

    pub fn activate_free_trial(
        &mut self,
        customer_id: &str,
        plan_id: Option<u32>,
        plans: &PlanCatalog,
    ) -> Result<Subscriber> {
        let plan_id = plan_id.ok_or_else(|| SpreedlyError::validation(TRIAL_MISSING_PLAN))?;
        let plan = plans
            .find(plan_id)
            .ok_or_else(|| SpreedlyError::not_found(TRIAL_GONE))?;
        let subscriber = self
            .find_mut(customer_id)
            .ok_or_else(|| SpreedlyError::not_found(TRIAL_GONE))?;

        if subscriber.on_trial {
            return Err(SpreedlyError::conflict(TRIAL_INELIGIBLE));
        }
        subscriber.on_trial = true;

        self.comp(
            customer_id,
            Some(plan.duration_quantity),
            Some(plan.duration_units.as_str()),
            Some(plan.feature_level.as_str()),
        )
    }

    pub fn stop_auto_renew(&mut self, customer_id: &str) -> Result<Subscriber> {
        let subscriber = self
            .find_mut(customer_id)
            .ok_or_else(|| SpreedlyError::not_found(STOP_RENEW_GONE))?;
        subscriber.recurring = false;
        Ok(subscriber.clone())
    }

    /// Turns on auto renew before looking at the plan, so an unknown plan id
    /// still leaves the subscriber recurring.
    pub fn subscribe(
        &mut self,
        customer_id: &str,
        plan_id: u32,
        plans: &PlanCatalog,
    ) -> Result<Subscriber> {
        if let Some(subscriber) = self.find_mut(customer_id) {
            subscriber.recurring = true;
        }

        let plan = plans.find(plan_id).ok_or_else(|| {
            SpreedlyError::not_found(format!("Couldn't find SubscriptionPlan with id={plan_id}"))
        })?;

        self.comp(
            customer_id,
            Some(plan.duration_quantity),
            Some(plan.duration_units.as_str()),
            Some(plan.feature_level.as_str()),
        )
    }
}
