use chrono::{DateTime, Utc};
use tracing::{instrument, Level};

use crate::{
    fetch::{Fetcher, Transport},
    normalize::{normalize, CanonicalIngest},
    Result,
};

/// One full pass for one hall: menu, then hours, then normalization.
#[instrument(skip(fetcher), level = Level::INFO)]
pub async fn ingest_hall<T: Transport>(
    fetcher: &Fetcher<T>,
    hall: &str,
    as_of: DateTime<Utc>,
) -> Result<CanonicalIngest> {
    let payload = fetcher.fetch_menu(hall).await?;
    let hours = fetcher.resolve_hours(hall, as_of).await?;
    if hours.is_closed() {
        log::info!("{hall} is closed on {}", hours.date);
    }
    normalize(hall, &payload, &hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        error::Error,
        fetch::tests::{wrap_model, FakeTransport, OHILL},
    };
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const MODEL: &str = r#"{"Date":"09/16/2025","LocationId":"6838","Menu":{
        "MenuPeriods":[{"PeriodId":"1421","Name":"Breakfast"}],
        "MenuStations":[{"StationId":"22683","Name":"  Hot   Line ","PeriodId":"1421"}],
        "MenuProducts":[{"StationId":"22683","PeriodId":"1421","Product":{
            "ProductName":"Scrambled Eggs","IsVegetarian":true,
            "Allergens":[{"Name":"Eggs"}],"Ingredients":["Eggs","Butter"]}}]}}"#;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 16, 15, 0, 0).unwrap()
    }

    fn fetcher(transport: FakeTransport) -> Fetcher<FakeTransport> {
        Fetcher::new(transport, Config::default())
    }

    #[tokio::test]
    async fn test_ingest_hall() {
        let page = wrap_model(MODEL);
        let fetcher = fetcher(
            FakeTransport::default()
                .with_page(OHILL, 200, &page)
                .with_page(&format!("{OHILL}?periodId=1421"), 200, &page),
        );
        let ingest = ingest_hall(&fetcher, "ohill", as_of()).await.unwrap();

        assert_eq!(ingest.hall.name, "Observatory Hill Dining Room");
        assert_eq!(ingest.day.day_name, "Tuesday");
        assert_eq!(ingest.day.open_time, "07:00");
        assert_eq!(ingest.day.close_time, "14:00");
        let period = &ingest.day.periods[0];
        assert_eq!(
            (period.name.as_str(), period.start_time.as_str(), period.end_time.as_str()),
            ("Breakfast", "07:00", "10:30")
        );
        assert_eq!(period.stations[0].name, "Hot Line");
        let item = &period.stations[0].items[0];
        assert_eq!(item.name, "Scrambled Eggs");
        assert_eq!(ingest.item_allergens(item).collect::<Vec<_>>(), vec!["Eggs"]);
        assert_eq!(ingest.ingredients, vec!["Eggs", "Butter"]);
    }

    #[tokio::test]
    async fn test_unknown_hall_fetches_nothing() {
        let fetcher = fetcher(FakeTransport::default());
        let err = ingest_hall(&fetcher, "crossroads", as_of()).await.unwrap_err();
        assert!(matches!(err, Error::UnknownHall(_)));
        assert!(fetcher.transport().requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_menu_failure_aborts_hall() {
        let fetcher = fetcher(FakeTransport::default().with_page(OHILL, 503, "busy"));
        let err = ingest_hall(&fetcher, "ohill", as_of()).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }
}
