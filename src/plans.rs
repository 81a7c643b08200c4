use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::resource::{assign, AttributeValue, Deferred, ExtraAttributes, Resource};

pub const REGULAR: &str = "regular";
pub const FREE_TRIAL: &str = "free_trial";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: u32,
    pub name: String,
    pub plan_type: String,
    pub feature_level: String,
    pub duration_quantity: i64,
    pub duration_units: String,
    #[serde(default)]
    pub extra: ExtraAttributes,
}

impl SubscriptionPlan {
    pub fn is_trial(&self) -> bool {
        self.plan_type == FREE_TRIAL
    }
}

impl Resource for SubscriptionPlan {
    const KIND: &'static str = "SubscriptionPlan";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "name",
        "plan_type",
        "feature_level",
        "duration_quantity",
        "duration_units",
        "trial",
    ];

    fn read(&self, name: &str) -> Option<AttributeValue> {
        let value = match name {
            "id" => self.id.into(),
            "name" => self.name.clone().into(),
            "plan_type" => self.plan_type.clone().into(),
            "feature_level" => self.feature_level.clone().into(),
            "duration_quantity" => self.duration_quantity.into(),
            "duration_units" => self.duration_units.clone().into(),
            "trial" => self.is_trial().into(),
            other => return self.extra.get(other).cloned(),
        };
        Some(value)
    }

    fn write(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        let kind = Self::KIND;
        match name {
            "id" => assign(kind, name, &mut self.id, value),
            "name" => assign(kind, name, &mut self.name, value),
            "plan_type" => assign(kind, name, &mut self.plan_type, value),
            "feature_level" => assign(kind, name, &mut self.feature_level, value),
            "duration_quantity" => assign(kind, name, &mut self.duration_quantity, value),
            "duration_units" => assign(kind, name, &mut self.duration_units, value),
            "trial" => {
                let mut trial = self.is_trial();
                assign(kind, name, &mut trial, value)?;
                self.plan_type = if trial { FREE_TRIAL } else { REGULAR }.to_string();
                Ok(())
            }
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
pub struct PlanParams {
    pub id: u32,
    pub name: String,
    pub plan_type: Option<String>,
    pub feature_level: Option<String>,
    pub duration_quantity: i64,
    pub duration_units: String,
    #[serde(flatten)]
    pub extra: ExtraAttributes,
}

#[derive(Debug, Clone)]
pub struct PlanDefaults {
    pub plan_type: Deferred<String>,
    pub feature_level: Deferred<String>,
}

impl Default for PlanDefaults {
    fn default() -> Self {
        Self {
            plan_type: Deferred::new(|| REGULAR.to_string()),
            feature_level: Deferred::new(String::new),
        }
    }
}

impl PlanDefaults {
    pub fn build(&self, params: PlanParams) -> SubscriptionPlan {
        let plan_type = self.plan_type.produce();
        let feature_level = self.feature_level.produce();
        SubscriptionPlan {
            id: params.id,
            name: params.name,
            plan_type: params.plan_type.unwrap_or(plan_type),
            feature_level: params.feature_level.unwrap_or(feature_level),
            duration_quantity: params.duration_quantity,
            duration_units: params.duration_units,
            extra: params.extra,
        }
    }
}

/// The fixed set of canned plans. Read-only once seeded.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: BTreeMap<u32, SubscriptionPlan>,
}

impl PlanCatalog {
    pub fn seeded(defaults: &PlanDefaults) -> Self {
        let day_plan = |id: u32, name: &str| PlanParams {
            id,
            name: name.to_string(),
            duration_quantity: 1,
            duration_units: "days".to_string(),
            ..PlanParams::default()
        };

        let plans = [
            day_plan(1, "Default mock plan"),
            PlanParams {
                plan_type: Some(FREE_TRIAL.to_string()),
                ..day_plan(2, "Test Free Trial Plan")
            },
            day_plan(3, "Test Regular Plan"),
            PlanParams {
                feature_level: Some("plus".to_string()),
                ..day_plan(4, "Test Plus Plan")
            },
        ]
        .into_iter()
        .map(|params| {
            let plan = defaults.build(params);
            (plan.id, plan)
        })
        .collect();

        Self { plans }
    }

    pub fn find(&self, id: u32) -> Option<&SubscriptionPlan> {
        self.plans.get(&id)
    }

    /// Looks a plan up by a loosely formatted id such as `"4"` or `" 2 "`.
    pub fn find_key(&self, key: &str) -> Option<&SubscriptionPlan> {
        self.find(plan_id_from_key(key)?)
    }

    pub fn all(&self) -> Vec<&SubscriptionPlan> {
        self.plans.values().collect()
    }
}

/// Leading-digit conversion: `"4"` and `"4 plus"` give 4, `"plus"` gives 0.
/// Returns `None` only when the digits overflow.
pub fn plan_id_from_key(key: &str) -> Option<u32> {
    let trimmed = key.trim_start();
    let digits: String = trimmed
        .strip_prefix('+')
        .unwrap_or(trimmed)
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return Some(0);
    }
    digits.parse().ok()
}
