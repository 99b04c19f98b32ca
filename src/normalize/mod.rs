mod records;

use std::collections::HashMap;

pub use records::{
    AllergenId, CanonicalIngest, Day, DietFlags, DiningHall, IngredientId, MenuItem, Period,
    Station,
};

use crate::{
    error::Result,
    hall::HallId,
    parse::{
        hours::HoursResult,
        nutrition::{NutritionBuilder, NutritionField},
        payload::{
            CurrentPeriod, CurrentProduct, LegacyPeriod, LegacyProduct, PeriodMeta, VendorStation,
        },
        remove_excess_whitespace, RawMenuPayload,
    },
};

const UNNAMED_ITEM: &str = "Unnamed Item";
const NOT_AVAILABLE_MARKER: &str = "information is not available";
/// Attached when the vendor says it has no allergen information for an item.
pub const INFORMATION_NOT_AVAILABLE: &str = "Information Not Available";
const FALLBACK_START: &str = "00:00";
const FALLBACK_END: &str = "23:59";

/// Name to index map that lives for exactly one ingest run.
#[derive(Debug, Default)]
struct DedupCache {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl DedupCache {
    fn intern(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), i);
        i
    }

    fn into_names(self) -> Vec<String> {
        self.names
    }
}

fn clean(s: Option<&str>) -> Option<String> {
    s.map(remove_excess_whitespace)
        .filter(|s| !s.is_empty())
        .map(|s| s.into_owned())
}

fn push_unique<T: PartialEq>(v: &mut Vec<T>, x: T) {
    if !v.contains(&x) {
        v.push(x);
    }
}

/// Turns a fetched payload plus the day's hours into canonical records.
pub fn normalize(hall: &str, payload: &RawMenuPayload, hours: &HoursResult) -> Result<CanonicalIngest> {
    let hall: HallId = hall.parse()?;
    let header = payload.header();
    let mut run = Normalizer::default();

    let periods: Vec<Period> = match payload {
        RawMenuPayload::Legacy { periods, .. } => periods
            .iter()
            .map(|p| run.legacy_period(p, hours))
            .collect(),
        RawMenuPayload::Current { periods, .. } => periods
            .iter()
            .map(|p| run.current_period(p, hours))
            .collect(),
    };

    let date = header.date.unwrap_or(hours.date);
    log::debug!(
        "{hall}: normalized {date} from {} payload (vendor location {})",
        if payload.is_current() { "current" } else { "legacy" },
        header.location_id.as_deref().unwrap_or("unknown")
    );
    Ok(CanonicalIngest {
        hall: DiningHall {
            id: hall,
            name: hall.display_name().to_string(),
            scrape_url: header.source_url.to_string(),
        },
        day: Day {
            date,
            day_name: date.format("%A").to_string(),
            open_time: hours.open.clone(),
            close_time: hours.close.clone(),
            periods,
        },
        allergens: run.allergens.into_names(),
        ingredients: run.ingredients.into_names(),
    })
}

#[derive(Debug, Default)]
struct Normalizer {
    allergens: DedupCache,
    ingredients: DedupCache,
}

impl Normalizer {
    fn period(meta: &PeriodMeta, hours: &HoursResult) -> Period {
        let (start_time, end_time) = hours.period(&meta.id).map_or_else(
            || (FALLBACK_START.to_string(), FALLBACK_END.to_string()),
            |h| (h.start.clone(), h.end.clone()),
        );
        Period {
            name: clean(Some(meta.name.as_str())).unwrap_or_else(|| format!("Period {}", meta.id)),
            vendor_id: meta.id.clone(),
            start_time,
            end_time,
            stations: Vec::new(),
        }
    }

    /// Creates the period's stations and returns where each station id landed.
    fn stations<'a>(
        period: &mut Period,
        stations: impl Iterator<Item = &'a VendorStation>,
    ) -> HashMap<String, usize> {
        let mut index = HashMap::new();
        for s in stations {
            if index.contains_key(&s.station_id) {
                continue;
            }
            index.insert(s.station_id.clone(), period.stations.len());
            period.stations.push(Station {
                name: clean(s.name.as_deref())
                    .unwrap_or_else(|| format!("Station {}", s.station_id)),
                number: s.station_id.clone(),
                items: Vec::new(),
            });
        }
        index
    }

    fn place(
        period: &mut Period,
        index: &HashMap<String, usize>,
        station_id: Option<&String>,
        item: MenuItem,
    ) {
        match station_id.and_then(|id| index.get(id)) {
            Some(&i) => period.stations[i].items.push(item),
            None => log::debug!(
                "period {}: no station {station_id:?} for {}",
                period.vendor_id,
                item.name
            ),
        }
    }

    fn legacy_period(&mut self, raw: &LegacyPeriod, hours: &HoursResult) -> Period {
        let mut period = Self::period(&raw.meta, hours);
        let index = Self::stations(&mut period, raw.stations.iter());
        for record in &raw.products {
            let item = self.legacy_item(&record.product);
            Self::place(&mut period, &index, record.station_id.as_ref(), item);
        }
        period
    }

    fn legacy_item(&mut self, p: &LegacyProduct) -> MenuItem {
        let mut allergens = Vec::new();
        for a in &p.allergens {
            if let Some(name) = clean(a.name.as_deref()) {
                push_unique(&mut allergens, AllergenId(self.allergens.intern(&name)));
            }
        }
        let mut ingredients = Vec::new();
        for i in &p.ingredients {
            if let Some(name) = clean(Some(i.as_str())) {
                push_unique(&mut ingredients, IngredientId(self.ingredients.intern(&name)));
            }
        }

        let mut nutrition = NutritionBuilder::new();
        for (field, value) in [
            (NutritionField::Calories, &p.calories),
            (NutritionField::Protein, &p.protein),
            (NutritionField::Carbs, &p.carbs),
            (NutritionField::TransFat, &p.trans_fat),
            (NutritionField::SaturatedFat, &p.saturated_fat),
            (NutritionField::UnsaturatedFat, &p.unsaturated_fat),
            (NutritionField::Sugar, &p.sugar),
            (NutritionField::Fiber, &p.fiber),
            (NutritionField::Sodium, &p.sodium),
        ] {
            nutrition.set(field, value.as_ref());
        }

        MenuItem {
            name: clean(p.product_name.as_deref()).unwrap_or_else(|| UNNAMED_ITEM.to_string()),
            description: clean(p.description.as_deref()),
            category: clean(p.category.as_deref()),
            diet: DietFlags::from_bools(
                p.is_gluten_free.unwrap_or(false),
                p.is_vegan.unwrap_or(false),
                p.is_vegetarian.unwrap_or(false),
            ),
            allergens,
            ingredients,
            ingredient_statement: None,
            nutrition: nutrition.build(),
        }
    }

    fn current_period(&mut self, raw: &CurrentPeriod, hours: &HoursResult) -> Period {
        let id = raw.meta.id.as_str();
        let mut period = Self::period(&raw.meta, hours);
        let index = Self::stations(
            &mut period,
            raw.stations
                .iter()
                .filter(|s| s.period_id.as_deref() == Some(id)),
        );
        // products without a PeriodId are scoped by their station alone
        let products = raw
            .products
            .iter()
            .filter(|p| p.period_id.as_deref().map_or(true, |pid| pid == id));
        for record in products {
            let item = self.current_item(&record.product);
            Self::place(&mut period, &index, record.station_id.as_ref(), item);
        }
        period
    }

    fn current_item(&mut self, p: &CurrentProduct) -> MenuItem {
        let mut allergens = Vec::new();
        for (flag, set) in &p.available_filters {
            let Some(name) = flag.strip_prefix("Contains") else {
                continue;
            };
            if name.is_empty() || set.as_bool() != Some(true) {
                continue;
            }
            push_unique(&mut allergens, AllergenId(self.allergens.intern(name)));
        }
        if p
            .allergen_statement
            .as_deref()
            .is_some_and(|s| s.contains(NOT_AVAILABLE_MARKER))
        {
            push_unique(
                &mut allergens,
                AllergenId(self.allergens.intern(INFORMATION_NOT_AVAILABLE)),
            );
        }

        let mut nutrition = NutritionBuilder::new();
        nutrition.walk(&p.nutritional_tree);

        let short_description = clean(p.short_description.as_deref());
        MenuItem {
            name: clean(p.marketing_name.as_deref())
                .or_else(|| short_description.clone())
                .unwrap_or_else(|| UNNAMED_ITEM.to_string()),
            description: short_description,
            category: clean(p.category.as_deref()),
            diet: DietFlags::empty(),
            allergens,
            ingredients: Vec::new(),
            ingredient_statement: p
                .ingredient_statement
                .clone()
                .filter(|s| !s.trim().is_empty()),
            nutrition: nutrition.build(),
        }
    }
}
