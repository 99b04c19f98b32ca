//! Typed views over the vendor's `model` object.
//!
//! Two payload shapes have been observed. The legacy one carries `ProductName`, explicit
//! diet flags and allergen/ingredient lists with each period's stations already scoped.
//! The current one carries `MarketingName`, a map of `Contains<Allergen>` flags and a
//! nutrition tree, and lists every period's stations together.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use url::Url;

use super::{
    extract::{extract_balanced, model_anchor, strip_trailing_commas},
    nutrition::NutritionNode,
    vendor_id::{de_id, de_null_default, de_opt_id, id_from_value},
};
use crate::error::Result;

/// Parses the `model: {...}` object embedded in a menu page.
pub fn parse_model(html: &str) -> Result<Value> {
    let literal = extract_balanced(html, model_anchor())?;
    Ok(serde_json::from_str(&strip_trailing_commas(literal))?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodMeta {
    pub id: String,
    pub name: String,
}

/// The untyped result of scraping one hall: the top-level model plus, per period, the
/// model fetched with `periodId=<id>` (`None` when that fetch failed).
#[derive(Debug, Clone)]
pub struct MenuScrape {
    pub source_url: Url,
    pub base_model: Value,
    pub periods: Vec<(PeriodMeta, Option<Value>)>,
}

impl MenuScrape {
    pub fn date(&self) -> Option<NaiveDate> {
        self.base_model
            .get("Date")
            .and_then(Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%m/%d/%Y").ok())
    }

    pub fn location_id(&self) -> Option<String> {
        self.base_model.get("LocationId").and_then(id_from_value)
    }

    /// The period the top-level page was rendered for.
    pub fn selected_period_id(&self) -> Option<String> {
        self.base_model
            .get("SelectedPeriodId")
            .or_else(|| self.base_model.get("Menu")?.get("SelectedPeriodId"))
            .and_then(id_from_value)
    }

    /// The model holding `meta`'s lists in the legacy shape. Without a sub-fetch, only the
    /// period the top-level page was rendered for (or the sole period) has its lists there.
    fn legacy_model<'a>(&'a self, meta: &PeriodMeta, raw: Option<&'a Value>) -> Option<&'a Value> {
        raw.or_else(|| {
            let selected = self.selected_period_id();
            let is_base = match selected {
                Some(id) => id == meta.id,
                None => self.periods.len() == 1,
            };
            is_base.then_some(&self.base_model)
        })
    }
}

fn menu_list<'a>(model: &'a Value, key: &str) -> &'a [Value] {
    model
        .get("Menu")
        .and_then(|menu| menu.get(key))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Reads the period list of a top-level model. Without `MenuPeriods` the ids are taken
/// from the stations and products themselves.
pub fn menu_periods(model: &Value) -> Vec<PeriodMeta> {
    let listed: Vec<PeriodMeta> = menu_list(model, "MenuPeriods")
        .iter()
        .filter_map(|p| {
            let id = p
                .get("PeriodId")
                .or_else(|| p.get("Id"))
                .and_then(id_from_value)?;
            let name = p
                .get("Name")
                .and_then(Value::as_str)
                .map_or_else(|| format!("Period {id}"), str::to_string);
            Some(PeriodMeta { id, name })
        })
        .collect();
    if !listed.is_empty() {
        return listed;
    }

    let mut seen: Vec<String> = Vec::new();
    for record in menu_list(model, "MenuStations")
        .iter()
        .chain(menu_list(model, "MenuProducts"))
    {
        if let Some(id) = record.get("PeriodId").and_then(id_from_value) {
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
    }
    seen.into_iter()
        .map(|id| PeriodMeta {
            name: format!("Period {id}"),
            id,
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VendorStation {
    #[serde(deserialize_with = "de_id")]
    pub station_id: String,
    #[serde(default, alias = "StationName")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub period_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VendorProduct<P> {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub station_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub period_id: Option<String>,
    pub product: P,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NamedAllergen {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyProduct {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_gluten_free: Option<bool>,
    #[serde(default)]
    pub is_vegan: Option<bool>,
    #[serde(default)]
    pub is_vegetarian: Option<bool>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub allergens: Vec<NamedAllergen>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub calories: Option<Value>,
    #[serde(default)]
    pub protein: Option<Value>,
    #[serde(default)]
    pub carbs: Option<Value>,
    #[serde(default)]
    pub trans_fat: Option<Value>,
    #[serde(default)]
    pub saturated_fat: Option<Value>,
    #[serde(default)]
    pub unsaturated_fat: Option<Value>,
    #[serde(default)]
    pub sugar: Option<Value>,
    #[serde(default)]
    pub fiber: Option<Value>,
    #[serde(default)]
    pub sodium: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CurrentProduct {
    #[serde(default)]
    pub marketing_name: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub available_filters: BTreeMap<String, Value>,
    #[serde(default)]
    pub allergen_statement: Option<String>,
    #[serde(default)]
    pub ingredient_statement: Option<String>,
    #[serde(default, alias = "NutritionTree", deserialize_with = "de_null_default")]
    pub nutritional_tree: Vec<NutritionNode>,
}

/// A period of a legacy payload; its lists are already scoped to the period.
#[derive(Debug, Clone)]
pub struct LegacyPeriod {
    pub meta: PeriodMeta,
    pub stations: Vec<VendorStation>,
    pub products: Vec<VendorProduct<LegacyProduct>>,
}

/// A period of a current payload; its lists still hold every period's records.
#[derive(Debug, Clone)]
pub struct CurrentPeriod {
    pub meta: PeriodMeta,
    pub stations: Vec<VendorStation>,
    pub products: Vec<VendorProduct<CurrentProduct>>,
}

#[derive(Debug, Clone)]
pub struct MenuHeader {
    pub source_url: Url,
    pub date: Option<NaiveDate>,
    pub location_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RawMenuPayload {
    Legacy {
        header: MenuHeader,
        periods: Vec<LegacyPeriod>,
    },
    Current {
        header: MenuHeader,
        periods: Vec<CurrentPeriod>,
    },
}

impl RawMenuPayload {
    /// Decides which shape `scrape` is in by looking at its product records, then reads
    /// every period into the typed structs of that shape.
    pub fn detect(scrape: &MenuScrape) -> Self {
        let header = MenuHeader {
            source_url: scrape.source_url.clone(),
            date: scrape.date(),
            location_id: scrape.location_id(),
        };
        let is_current = std::iter::once(&scrape.base_model)
            .chain(scrape.periods.iter().filter_map(|(_, raw)| raw.as_ref()))
            .flat_map(|model| menu_list(model, "MenuProducts"))
            .any(is_current_product);

        if is_current {
            let periods = scrape
                .periods
                .iter()
                .map(|(meta, raw)| {
                    // the top-level model lists every period, so it stands in for a failed sub-fetch
                    let model = raw.as_ref().unwrap_or(&scrape.base_model);
                    CurrentPeriod {
                        meta: meta.clone(),
                        stations: typed_records(menu_list(model, "MenuStations"), "station"),
                        products: typed_records(menu_list(model, "MenuProducts"), "product"),
                    }
                })
                .collect();
            Self::Current { header, periods }
        } else {
            let periods = scrape
                .periods
                .iter()
                .map(|(meta, raw)| {
                    let (stations, products) = scrape.legacy_model(meta, raw.as_ref()).map_or_else(
                        || (Vec::new(), Vec::new()),
                        |model| {
                            (
                                typed_records(menu_list(model, "MenuStations"), "station"),
                                typed_records(menu_list(model, "MenuProducts"), "product"),
                            )
                        },
                    );
                    LegacyPeriod {
                        meta: meta.clone(),
                        stations,
                        products,
                    }
                })
                .collect();
            Self::Legacy { header, periods }
        }
    }

    pub const fn header(&self) -> &MenuHeader {
        match self {
            Self::Legacy { header, .. } | Self::Current { header, .. } => header,
        }
    }

    pub const fn is_current(&self) -> bool {
        matches!(self, Self::Current { .. })
    }
}

fn is_current_product(record: &Value) -> bool {
    let has_marker = |v: &Value| {
        v.get("MarketingName").is_some() || v.get("AvailableFilters").is_some()
    };
    has_marker(record) || record.get("Product").is_some_and(has_marker)
}

/// Deserializes each record on its own so one malformed record only loses itself.
fn typed_records<T: DeserializeOwned>(values: &[Value], label: &str) -> Vec<T> {
    values
        .iter()
        .filter_map(|v| match T::deserialize(v) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("skipping malformed {label} record: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::parse::ExtractionError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn scrape(base_model: Value, periods: Vec<(PeriodMeta, Option<Value>)>) -> MenuScrape {
        MenuScrape {
            source_url: "https://example.com/ohill/".parse().unwrap(),
            base_model,
            periods,
        }
    }

    fn meta(id: &str, name: &str) -> PeriodMeta {
        PeriodMeta {
            id: id.into(),
            name: name.into(),
        }
    }

    #[test]
    fn test_parse_model() {
        let html = r#"<script>
            window.app = new App({
                model: {"Date":"09/16/2025","LocationId":"6838","Menu":{"MenuPeriods":[{"PeriodId":"1421","Name":"Breakfast",},]}},
                settings: {"a": [1, 2]}
            });
        </script>"#;
        let model = parse_model(html).unwrap();
        assert_eq!(model["LocationId"], "6838");
        assert_eq!(menu_periods(&model), vec![meta("1421", "Breakfast")]);
    }

    #[test]
    fn test_parse_model_errors_are_distinct() {
        let err = parse_model("<p>nothing here</p>").unwrap_err();
        assert!(matches!(
            err,
            Error::Extraction(ExtractionError::AnchorNotFound(_))
        ));
        let err = parse_model("model: {Date: 09/16/2025}").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_periods_derived_from_records() {
        let model = json!({"Menu": {
            "MenuStations": [{"StationId": 1, "PeriodId": 1423}, {"StationId": 2, "PeriodId": "1421"}],
            "MenuProducts": [{"StationId": 1, "PeriodId": "1423"}, {"StationId": 3, "PeriodId": 1425}]
        }});
        assert_eq!(
            menu_periods(&model),
            vec![
                meta("1423", "Period 1423"),
                meta("1421", "Period 1421"),
                meta("1425", "Period 1425")
            ]
        );
    }

    #[test]
    fn test_scrape_header() {
        let s = scrape(json!({"Date": "09/16/2025", "LocationId": 6838}), vec![]);
        assert_eq!(s.date(), NaiveDate::from_ymd_opt(2025, 9, 16));
        assert_eq!(s.location_id().as_deref(), Some("6838"));
        assert_eq!(scrape(json!({"Date": "soon"}), vec![]).date(), None);
    }

    #[test]
    fn test_detect_legacy() {
        let raw = json!({"Menu": {
            "MenuStations": [{"StationId": "22683", "StationName": "Grill"}],
            "MenuProducts": [{"StationId": "22683", "Product": {"ProductName": "Burger", "Allergens": [{"Name": "Wheat"}]}}]
        }});
        let payload = RawMenuPayload::detect(&scrape(
            json!({}),
            vec![(meta("1423", "Lunch"), Some(raw)), (meta("1425", "Dinner"), None)],
        ));
        let RawMenuPayload::Legacy { periods, .. } = payload else {
            panic!("expected the legacy shape");
        };
        assert_eq!(periods[0].stations[0].name.as_deref(), Some("Grill"));
        assert_eq!(
            periods[0].products[0].product.product_name.as_deref(),
            Some("Burger")
        );
        assert!(periods[1].stations.is_empty());
    }

    #[test]
    fn test_legacy_selected_period_uses_base_model() {
        let base = json!({"SelectedPeriodId": "1421", "Menu": {
            "MenuStations": [{"StationId": "22683", "StationName": "Grill"}],
            "MenuProducts": [{"StationId": "22683", "Product": {"ProductName": "Toast"}}]
        }});
        let payload = RawMenuPayload::detect(&scrape(
            base,
            vec![(meta("1421", "Breakfast"), None), (meta("1423", "Lunch"), None)],
        ));
        let RawMenuPayload::Legacy { periods, .. } = payload else {
            panic!("expected the legacy shape");
        };
        assert_eq!(periods[0].stations.len(), 1);
        assert_eq!(periods[0].products.len(), 1);
        assert!(periods[1].stations.is_empty());
        assert!(periods[1].products.is_empty());
    }

    #[test]
    fn test_legacy_single_period_uses_base_model() {
        let base = json!({"Menu": {
            "MenuStations": [{"StationId": 1, "StationName": "Grill"}],
            "MenuProducts": [{"StationId": 1, "Product": {"ProductName": "Toast"}}]
        }});
        let s = scrape(base, vec![(meta("1421", "Breakfast"), None)]);
        assert_eq!(s.selected_period_id(), None);
        let RawMenuPayload::Legacy { periods, .. } = RawMenuPayload::detect(&s) else {
            panic!("expected the legacy shape");
        };
        assert_eq!(periods[0].products[0].product.product_name.as_deref(), Some("Toast"));
    }

    #[test]
    fn test_null_lists_keep_the_product() {
        let raw = json!({"Menu": {
            "MenuStations": [{"StationId": 1, "StationName": "Grill"}],
            "MenuProducts": [
                {"StationId": 1, "Product": {"ProductName": "Toast", "Allergens": null, "Ingredients": null}},
                {"StationId": 1, "Product": {"ProductName": "Bagel", "Allergens": [{"Name": null}, {"Name": "Wheat"}]}}
            ]
        }});
        let RawMenuPayload::Legacy { periods, .. } =
            RawMenuPayload::detect(&scrape(json!({}), vec![(meta("1421", "Breakfast"), Some(raw))]))
        else {
            panic!("expected the legacy shape");
        };
        let products = &periods[0].products;
        assert_eq!(products.len(), 2);
        assert!(products[0].product.allergens.is_empty());
        assert!(products[0].product.ingredients.is_empty());
        assert_eq!(products[1].product.allergens.len(), 2);

        let base = json!({"Menu": {
            "MenuStations": [{"StationId": 1, "Name": "Grill", "PeriodId": 1421}],
            "MenuProducts": [
                {"StationId": 1, "PeriodId": 1421, "Product": {"MarketingName": "Oatmeal", "AvailableFilters": null,
                    "NutritionalTree": [{"Name": "Calories", "Value": "250", "SubList": null}]}},
                {"StationId": 1, "PeriodId": 1421, "Product": {"MarketingName": "Grits", "AvailableFilters": {}, "NutritionalTree": null}}
            ]
        }});
        let RawMenuPayload::Current { periods, .. } =
            RawMenuPayload::detect(&scrape(base, vec![(meta("1421", "Breakfast"), None)]))
        else {
            panic!("expected the current shape");
        };
        let products = &periods[0].products;
        assert_eq!(products.len(), 2);
        assert!(products[0].product.available_filters.is_empty());
        assert_eq!(products[0].product.nutritional_tree.len(), 1);
        assert!(products[1].product.nutritional_tree.is_empty());
    }

    #[test]
    fn test_detect_current_falls_back_to_base_model() {
        let base = json!({"Menu": {
            "MenuStations": [{"StationId": 1, "Name": "Grill", "PeriodId": 1421}, {"StationId": "bad"}],
            "MenuProducts": [
                {"StationId": 1, "PeriodId": 1421, "Product": {"MarketingName": "Eggs", "AvailableFilters": {"ContainsEggs": true}}},
                {"StationId": 1, "Product": "not an object"}
            ]
        }});
        let payload = RawMenuPayload::detect(&scrape(base, vec![(meta("1421", "Breakfast"), None)]));
        assert!(payload.is_current());
        let RawMenuPayload::Current { periods, .. } = payload else {
            unreachable!()
        };
        assert_eq!(periods[0].stations.len(), 2);
        assert_eq!(periods[0].products.len(), 1);
    }
}
