use std::{collections::HashMap, convert::Infallible};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{RowId, Sink};
use crate::{
    hall::HallId,
    normalize::{Day, DietFlags, DiningHall, MenuItem, Period, Station},
    parse::NutritionInfo,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallRow {
    pub id: RowId,
    pub key: HallId,
    pub name: String,
    pub scrape_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRow {
    pub id: RowId,
    pub hall: RowId,
    pub date: NaiveDate,
    pub day_name: String,
    pub open_time: String,
    pub close_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRow {
    pub id: RowId,
    pub day: RowId,
    pub name: String,
    pub vendor_id: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationRow {
    pub id: RowId,
    pub period: RowId,
    pub name: String,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemRow {
    pub id: RowId,
    pub station: RowId,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub diet: DietFlags,
    pub allergens: Vec<RowId>,
    pub ingredients: Vec<RowId>,
    pub ingredient_statement: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutritionRow {
    pub menu_item: RowId,
    pub info: NutritionInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRow {
    pub id: RowId,
    pub name: String,
}

/// A whole database held in memory. Days are keyed by (hall, date): creating a day that
/// already exists replaces it together with everything below it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStore {
    next_id: RowId,
    pub halls: Vec<HallRow>,
    pub days: Vec<DayRow>,
    pub periods: Vec<PeriodRow>,
    pub stations: Vec<StationRow>,
    pub menu_items: Vec<MenuItemRow>,
    pub nutrition: Vec<NutritionRow>,
    pub allergens: Vec<NameRow>,
    pub ingredients: Vec<NameRow>,
}

fn get_or_create(rows: &mut Vec<NameRow>, next_id: &mut RowId, name: &str) -> RowId {
    if let Some(row) = rows.iter().find(|r| r.name == name) {
        return row.id;
    }
    *next_id += 1;
    rows.push(NameRow {
        id: *next_id,
        name: name.to_string(),
    });
    *next_id
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> RowId {
        self.next_id += 1;
        self.next_id
    }

    #[cfg(test)]
    pub fn hall(&self, key: HallId) -> Option<&HallRow> {
        self.halls.iter().find(|h| h.key == key)
    }

    pub fn days_of(&self, hall: RowId) -> impl Iterator<Item = &DayRow> {
        self.days.iter().filter(move |d| d.hall == hall)
    }

    #[cfg(test)]
    pub fn allergen_name(&self, id: RowId) -> Option<&str> {
        self.allergens
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.name.as_str())
    }

    /// Removes a day and every period, station, item and nutrition row under it.
    fn remove_day(&mut self, day: RowId) {
        self.days.retain(|d| d.id != day);
        let periods: Vec<RowId> = self
            .periods
            .iter()
            .filter(|p| p.day == day)
            .map(|p| p.id)
            .collect();
        self.periods.retain(|p| p.day != day);
        let stations: Vec<RowId> = self
            .stations
            .iter()
            .filter(|s| periods.contains(&s.period))
            .map(|s| s.id)
            .collect();
        self.stations.retain(|s| !periods.contains(&s.period));
        let items: Vec<RowId> = self
            .menu_items
            .iter()
            .filter(|i| stations.contains(&i.station))
            .map(|i| i.id)
            .collect();
        self.menu_items.retain(|i| !stations.contains(&i.station));
        self.nutrition.retain(|n| !items.contains(&n.menu_item));
    }

    /// Row counts per table, for logging.
    pub fn counts(&self) -> HashMap<&'static str, usize> {
        HashMap::from([
            ("halls", self.halls.len()),
            ("days", self.days.len()),
            ("periods", self.periods.len()),
            ("stations", self.stations.len()),
            ("menu_items", self.menu_items.len()),
            ("nutrition", self.nutrition.len()),
            ("allergens", self.allergens.len()),
            ("ingredients", self.ingredients.len()),
        ])
    }
}

impl Sink for MemoryStore {
    type Error = Infallible;

    fn upsert_hall(&mut self, hall: &DiningHall) -> Result<RowId, Infallible> {
        if let Some(row) = self.halls.iter_mut().find(|h| h.name == hall.name) {
            row.key = hall.id;
            row.scrape_url.clone_from(&hall.scrape_url);
            return Ok(row.id);
        }
        let id = self.next();
        self.halls.push(HallRow {
            id,
            key: hall.id,
            name: hall.name.clone(),
            scrape_url: hall.scrape_url.clone(),
        });
        Ok(id)
    }

    fn create_day(&mut self, hall: RowId, day: &Day) -> Result<RowId, Infallible> {
        let existing: Vec<RowId> = self
            .days_of(hall)
            .filter(|d| d.date == day.date)
            .map(|d| d.id)
            .collect();
        for id in existing {
            log::info!("replacing day {} of hall {hall}", day.date);
            self.remove_day(id);
        }
        let id = self.next();
        self.days.push(DayRow {
            id,
            hall,
            date: day.date,
            day_name: day.day_name.clone(),
            open_time: day.open_time.clone(),
            close_time: day.close_time.clone(),
        });
        Ok(id)
    }

    fn create_period(&mut self, day: RowId, period: &Period) -> Result<RowId, Infallible> {
        let id = self.next();
        self.periods.push(PeriodRow {
            id,
            day,
            name: period.name.clone(),
            vendor_id: period.vendor_id.clone(),
            start_time: period.start_time.clone(),
            end_time: period.end_time.clone(),
        });
        Ok(id)
    }

    fn create_station(&mut self, period: RowId, station: &Station) -> Result<RowId, Infallible> {
        let id = self.next();
        self.stations.push(StationRow {
            id,
            period,
            name: station.name.clone(),
            number: station.number.clone(),
        });
        Ok(id)
    }

    fn get_or_create_allergen(&mut self, name: &str) -> Result<RowId, Infallible> {
        Ok(get_or_create(&mut self.allergens, &mut self.next_id, name))
    }

    fn get_or_create_ingredient(&mut self, name: &str) -> Result<RowId, Infallible> {
        Ok(get_or_create(&mut self.ingredients, &mut self.next_id, name))
    }

    fn create_menu_item(
        &mut self,
        station: RowId,
        item: &MenuItem,
        allergens: Vec<RowId>,
        ingredients: Vec<RowId>,
    ) -> Result<RowId, Infallible> {
        let id = self.next();
        self.menu_items.push(MenuItemRow {
            id,
            station,
            name: item.name.clone(),
            description: item.description.clone(),
            category: item.category.clone(),
            diet: item.diet,
            allergens,
            ingredients,
            ingredient_statement: item.ingredient_statement.clone(),
        });
        Ok(id)
    }

    fn create_nutrition(
        &mut self,
        menu_item: RowId,
        info: &NutritionInfo,
    ) -> Result<(), Infallible> {
        self.nutrition.retain(|n| n.menu_item != menu_item);
        self.nutrition.push(NutritionRow {
            menu_item,
            info: info.clone(),
        });
        Ok(())
    }
}
