use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::vendor_id::de_null_default;

/// One node of the vendor's nutrition tree. `Fat` typically has `Saturated Fat` and
/// `Trans Fat` underneath it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NutritionNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default, alias = "Children", deserialize_with = "de_null_default")]
    pub sub_list: Vec<NutritionNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NutritionField {
    Calories,
    Protein,
    Carbs,
    TransFat,
    SaturatedFat,
    UnsaturatedFat,
    Sugar,
    Fiber,
    Sodium,
}

impl NutritionField {
    /// Maps a normalized (lower case, `_` for spaces) vendor name onto a slot.
    pub fn from_normalized(name: &str) -> Option<Self> {
        let field = match name {
            "calories" => Self::Calories,
            "protein" | "total_protein" => Self::Protein,
            "carbs" | "carbohydrates" | "total_carbohydrates" => Self::Carbs,
            "trans_fat" => Self::TransFat,
            "saturated_fat" => Self::SaturatedFat,
            "unsaturated_fat" => Self::UnsaturatedFat,
            "sugar" | "sugars" | "total_sugars" => Self::Sugar,
            "fiber" | "dietary_fiber" => Self::Fiber,
            "sodium" => Self::Sodium,
            _ => return None,
        };
        Some(field)
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Numeric nutrition facts of one menu item. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutritionInfo {
    pub calories: Option<Decimal>,
    pub protein: Option<Decimal>,
    pub carbs: Option<Decimal>,
    pub trans_fat: Option<Decimal>,
    pub saturated_fat: Option<Decimal>,
    pub unsaturated_fat: Option<Decimal>,
    pub sugar: Option<Decimal>,
    pub fiber: Option<Decimal>,
    pub sodium: Option<Decimal>,
}

impl NutritionInfo {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn slot(&mut self, field: NutritionField) -> &mut Option<Decimal> {
        match field {
            NutritionField::Calories => &mut self.calories,
            NutritionField::Protein => &mut self.protein,
            NutritionField::Carbs => &mut self.carbs,
            NutritionField::TransFat => &mut self.trans_fat,
            NutritionField::SaturatedFat => &mut self.saturated_fat,
            NutritionField::UnsaturatedFat => &mut self.unsaturated_fat,
            NutritionField::Sugar => &mut self.sugar,
            NutritionField::Fiber => &mut self.fiber,
            NutritionField::Sodium => &mut self.sodium,
        }
    }
}

#[derive(Debug, Default)]
pub struct NutritionBuilder(NutritionInfo);

impl NutritionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `field` if it is still empty and `value` coerces. Returns whether it was set.
    pub fn set(&mut self, field: NutritionField, value: Option<&Value>) -> bool {
        let slot = self.0.slot(field);
        if slot.is_some() {
            return false;
        }
        match value.and_then(coerce_decimal) {
            Some(d) => {
                *slot = Some(d);
                true
            }
            None => {
                log::debug!("skipping nutrition value {value:?} for {field:?}");
                false
            }
        }
    }

    /// Depth-first walk over every level of the tree.
    pub fn walk(&mut self, nodes: &[NutritionNode]) {
        for node in nodes {
            if let Some(field) = node
                .name
                .as_deref()
                .and_then(|name| NutritionField::from_normalized(&normalize_name(name)))
            {
                self.set(field, node.value.as_ref());
            }
            self.walk(&node.sub_list);
        }
    }

    pub fn build(self) -> Option<NutritionInfo> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0)
        }
    }
}

/// Largest value the store keeps: six digits, two of them after the point.
const MAX_VALUE: Decimal = Decimal::from_parts(999_999, 0, 0, false, 2);

/// Coerces a vendor value into a non-negative two-decimal number.
pub fn coerce_decimal(value: &Value) -> Option<Decimal> {
    let d = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Decimal::from(i),
            None => Decimal::try_from(n.as_f64()?).ok()?,
        },
        Value::String(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()?
        }
        _ => return None,
    };
    let d = d.round_dp(2);
    if (d.is_sign_negative() && !d.is_zero()) || d > MAX_VALUE {
        return None;
    }
    Some(d.abs())
}
