mod local;
mod memory;

use std::path::Path;

use serde::Serialize;

use crate::{
    normalize::{CanonicalIngest, Day, DiningHall, MenuItem, Period, Station},
    parse::NutritionInfo,
};

use local::FileStore;
pub use memory::MemoryStore;

pub type RowId = u64;

/// Where canonical records end up. Halls are upserted by name and allergens/ingredients
/// are looked up by name before being created; everything else is created.
pub trait Sink {
    type Error;

    fn upsert_hall(&mut self, hall: &DiningHall) -> Result<RowId, Self::Error>;
    fn create_day(&mut self, hall: RowId, day: &Day) -> Result<RowId, Self::Error>;
    fn create_period(&mut self, day: RowId, period: &Period) -> Result<RowId, Self::Error>;
    fn create_station(&mut self, period: RowId, station: &Station) -> Result<RowId, Self::Error>;
    fn get_or_create_allergen(&mut self, name: &str) -> Result<RowId, Self::Error>;
    fn get_or_create_ingredient(&mut self, name: &str) -> Result<RowId, Self::Error>;
    fn create_menu_item(
        &mut self,
        station: RowId,
        item: &MenuItem,
        allergens: Vec<RowId>,
        ingredients: Vec<RowId>,
    ) -> Result<RowId, Self::Error>;
    fn create_nutrition(&mut self, menu_item: RowId, info: &NutritionInfo)
        -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistSummary {
    pub periods: usize,
    pub stations: usize,
    pub menu_items: usize,
    pub nutrition: usize,
}

/// Writes one ingest into `sink`, top-down, linking each record to the row created for
/// its parent.
pub fn persist<S: Sink>(ingest: &CanonicalIngest, sink: &mut S) -> Result<PersistSummary, S::Error> {
    let mut summary = PersistSummary::default();
    let hall = sink.upsert_hall(&ingest.hall)?;
    let allergens = ingest
        .allergens
        .iter()
        .map(|name| sink.get_or_create_allergen(name))
        .collect::<Result<Vec<_>, _>>()?;
    let ingredients = ingest
        .ingredients
        .iter()
        .map(|name| sink.get_or_create_ingredient(name))
        .collect::<Result<Vec<_>, _>>()?;

    let day = sink.create_day(hall, &ingest.day)?;
    for period in &ingest.day.periods {
        let period_id = sink.create_period(day, period)?;
        summary.periods += 1;
        for station in &period.stations {
            let station_id = sink.create_station(period_id, station)?;
            summary.stations += 1;
            for item in &station.items {
                let item_id = sink.create_menu_item(
                    station_id,
                    item,
                    item.allergens.iter().map(|a| allergens[a.0]).collect(),
                    item.ingredients.iter().map(|i| ingredients[i.0]).collect(),
                )?;
                summary.menu_items += 1;
                if let Some(info) = &item.nutrition {
                    sink.create_nutrition(item_id, info)?;
                    summary.nutrition += 1;
                }
            }
        }
    }
    Ok(summary)
}

#[derive(Debug)]
#[non_exhaustive]
pub enum Store {
    Local(FileStore),
    AdHoc,
}

impl Store {
    #[inline]
    pub fn local(p: impl AsRef<Path>) -> Self {
        Self::Local(FileStore::open(p))
    }

    pub async fn load(&self) -> crate::Result<MemoryStore> {
        let value = match self {
            Self::Local(f) => f.load().await?,
            Self::AdHoc => None,
        };
        Ok(value.unwrap_or_default())
    }

    pub async fn save(&self, data: &MemoryStore) -> crate::Result<()> {
        match self {
            Self::Local(f) => f.save(data).await,
            Self::AdHoc => Ok(()),
        }
    }
}
