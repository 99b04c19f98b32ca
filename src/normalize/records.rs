use bitflags::bitflags;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{hall::HallId, parse::NutritionInfo};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DietFlags: u8 {
        const GlutenFree = 1;
        const Vegan = 1 << 1;
        const Vegetarian = 1 << 2;
    }
}

impl DietFlags {
    pub fn from_bools(gluten_free: bool, vegan: bool, vegetarian: bool) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::GlutenFree, gluten_free);
        flags.set(Self::Vegan, vegan);
        flags.set(Self::Vegetarian, vegetarian);
        flags
    }
}

/// Index into [`CanonicalIngest::allergens`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AllergenId(pub usize);

/// Index into [`CanonicalIngest::ingredients`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IngredientId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiningHall {
    pub id: HallId,
    pub name: String,
    pub scrape_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub diet: DietFlags,
    pub allergens: Vec<AllergenId>,
    pub ingredients: Vec<IngredientId>,
    /// Free-text ingredient list, as the current payload shape sends it.
    pub ingredient_statement: Option<String>,
    pub nutrition: Option<NutritionInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub number: String,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub name: String,
    pub vendor_id: String,
    pub start_time: String,
    pub end_time: String,
    pub stations: Vec<Station>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
    pub date: NaiveDate,
    pub day_name: String,
    pub open_time: String,
    pub close_time: String,
    pub periods: Vec<Period>,
}

/// Everything one ingest run produced for one hall, ready for a [`crate::store::Sink`].
/// Allergen and ingredient names are unique within the run; items refer to them by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalIngest {
    pub hall: DiningHall,
    pub day: Day,
    pub allergens: Vec<String>,
    pub ingredients: Vec<String>,
}

impl CanonicalIngest {
    pub fn allergen(&self, id: AllergenId) -> &str {
        &self.allergens[id.0]
    }

    pub fn items(&self) -> impl Iterator<Item = &MenuItem> {
        self.day
            .periods
            .iter()
            .flat_map(|p| &p.stations)
            .flat_map(|s| &s.items)
    }

    pub fn item_allergens<'a>(&'a self, item: &'a MenuItem) -> impl Iterator<Item = &'a str> {
        item.allergens.iter().map(|id| self.allergen(*id))
    }
}
