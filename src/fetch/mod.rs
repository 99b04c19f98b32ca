use std::{fmt::Display, future::Future, time::Duration};

use chrono::{DateTime, Utc};
use governor::{
    clock::{QuantaClock, QuantaInstant},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Jitter, Quota, RateLimiter,
};
use reqwest::Client;
use tracing::{instrument, Level};
use url::Url;

use crate::{
    config::Config,
    error::Result,
    hall::HallId,
    parse::{
        hours::{hours_for_date, local_date, parse_hours_blob},
        payload::{menu_periods, parse_model, PeriodMeta},
        HoursResult, MenuScrape, RawMenuPayload,
    },
};

/// Status line and body of one GET.
#[derive(Debug, Clone)]
pub struct Page {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Status { url: String, status: u16 },
    Transport { url: String, message: String },
}

impl Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status { url, status } => write!(f, "GET {url} returned HTTP {status}"),
            Self::Transport { url, message } => write!(f, "GET {url} failed: {message}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// A GET-with-timeout capability.
pub trait Transport {
    fn get(&self, url: &Url) -> impl Future<Output = std::result::Result<Page, FetchError>>;
}

impl Transport for Client {
    async fn get(&self, url: &Url) -> std::result::Result<Page, FetchError> {
        let transport_error = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };
        let res = Client::get(self, url.clone())
            .send()
            .await
            .map_err(transport_error)?;
        let status = res.status().as_u16();
        let body = res.text().await.map_err(transport_error)?;
        Ok(Page { status, body })
    }
}

pub fn make_client(timeout: Duration) -> Client {
    Client::builder()
        .gzip(true)
        .timeout(timeout)
        .build()
        .expect("client creation should succeed")
}

static DELAY_JITTER: Duration = Duration::from_millis(500);

type Limiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock, NoOpMiddleware<QuantaInstant>>;

/// Fetches and extracts the vendor pages of the configured halls.
pub struct Fetcher<T> {
    transport: T,
    config: Config,
    limiter: Limiter,
}

impl Fetcher<Client> {
    pub fn from_config(config: Config) -> Self {
        Self::new(make_client(config.timeout), config)
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, config: Config) -> Self {
        let limiter = RateLimiter::direct(Quota::per_second(config.rate_limit));
        Self {
            transport,
            config,
            limiter,
        }
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[cfg(test)]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    #[instrument(skip(self, url), fields(url = %url), level = Level::TRACE)]
    async fn page(&self, url: &Url) -> std::result::Result<String, FetchError> {
        self.limiter
            .until_ready_with_jitter(Jitter::new(Duration::ZERO, DELAY_JITTER))
            .await;
        let start = std::time::Instant::now();
        let page = self.transport.get(url).await?;
        log::trace!("GET {url} -> {} in {:?}", page.status, start.elapsed());
        if !(200..300).contains(&page.status) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: page.status,
            });
        }
        Ok(page.body)
    }

    /// Scrapes the hall's menu page and, when enabled, one page per meal period.
    #[instrument(skip(self), level = Level::DEBUG)]
    pub async fn fetch_menu(&self, hall: &str) -> Result<RawMenuPayload> {
        let scrape = self.scrape_menu(hall.parse()?).await?;
        Ok(RawMenuPayload::detect(&scrape))
    }

    pub async fn scrape_menu(&self, hall: HallId) -> Result<MenuScrape> {
        let url = self.config.url(hall);
        let base_model = parse_model(&self.page(&url).await?)?;
        let periods = menu_periods(&base_model);
        log::info!("{hall}: {} meal periods listed", periods.len());

        let periods = if self.config.fetch_periods {
            futures::future::join_all(
                periods
                    .into_iter()
                    .map(|meta| self.fetch_period(&url, meta)),
            )
            .await
        } else {
            periods.into_iter().map(|meta| (meta, None)).collect()
        };

        Ok(MenuScrape {
            source_url: url,
            base_model,
            periods,
        })
    }

    async fn fetch_period(
        &self,
        url: &Url,
        meta: PeriodMeta,
    ) -> (PeriodMeta, Option<serde_json::Value>) {
        let mut url = url.clone();
        url.query_pairs_mut().append_pair("periodId", &meta.id);
        let model = match self.page(&url).await {
            Ok(html) => parse_model(&html),
            Err(e) => Err(e.into()),
        };
        match model {
            Ok(model) => (meta, Some(model)),
            Err(e) => {
                log::warn!("period {} ({}) unavailable: {e}", meta.id, meta.name);
                (meta, None)
            }
        }
    }

    /// Today's hours for `hall`, where "today" is `as_of` in the configured timezone.
    #[instrument(skip(self), level = Level::DEBUG)]
    pub async fn resolve_hours(&self, hall: &str, as_of: DateTime<Utc>) -> Result<HoursResult> {
        let hall: HallId = hall.parse()?;
        let url = self.config.url(hall);
        let html = self.page(&url).await?;
        let entries = parse_hours_blob(&html, url.as_str())?;
        Ok(hours_for_date(
            &entries,
            local_date(as_of, self.config.timezone),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use crate::parse::ExtractionError;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, collections::HashMap};

    /// Serves canned pages by URL and records every request.
    #[derive(Default)]
    pub struct FakeTransport {
        pages: HashMap<String, Page>,
        pub requests: RefCell<Vec<String>>,
    }

    impl FakeTransport {
        pub fn with_page(mut self, url: &str, status: u16, body: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                Page {
                    status,
                    body: body.to_string(),
                },
            );
            self
        }
    }

    impl Transport for FakeTransport {
        async fn get(&self, url: &Url) -> std::result::Result<Page, FetchError> {
            self.requests.borrow_mut().push(url.to_string());
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| FetchError::Transport {
                    url: url.to_string(),
                    message: "connection refused".into(),
                })
        }
    }

    pub const OHILL: &str = "https://virginia.campusdish.com/en/locationsandmenus/observatoryhilldiningroom/";

    pub fn wrap_model(model: &str) -> String {
        format!(
            r#"<html><body><script>
                window.menuApp = new MenuApp({{
                    model: {model},
                    settings: {{"lang": "en"}}
                }});
                var currentHoursOfOperations = JSON.parse('[{{"DayOfWeek":2,"MealPeriodId":"1421","StartTime":"2025-09-16T07:00:00","EndTime":"2025-09-16T10:30:00","IsClosed":false}},{{"DayOfWeek":2,"MealPeriodId":"1423","StartTime":"2025-09-16T11:00:00","EndTime":"2025-09-16T14:00:00","IsClosed":false}}]');
            </script></body></html>"#
        )
    }

    fn fetcher(transport: FakeTransport, fetch_periods: bool) -> Fetcher<FakeTransport> {
        let config = Config {
            fetch_periods,
            ..Config::default()
        };
        Fetcher::new(transport, config)
    }

    const BASE_MODEL: &str = r#"{"Date":"09/16/2025","LocationId":"6838","Menu":{
        "MenuPeriods":[{"PeriodId":"1421","Name":"Breakfast"},{"PeriodId":"1423","Name":"Lunch"}],
        "MenuStations":[],"MenuProducts":[]}}"#;

    #[tokio::test]
    async fn test_fetch_menu_with_periods() {
        let breakfast = r#"{"Menu":{"MenuStations":[{"StationId":"1","StationName":"Griddle"}],
            "MenuProducts":[{"StationId":"1","Product":{"ProductName":"Pancakes"}}]}}"#;
        let transport = FakeTransport::default()
            .with_page(OHILL, 200, &wrap_model(BASE_MODEL))
            .with_page(&format!("{OHILL}?periodId=1421"), 200, &wrap_model(breakfast))
            .with_page(&format!("{OHILL}?periodId=1423"), 503, "busy");
        let fetcher = fetcher(transport, true);
        let payload = fetcher.fetch_menu("ohill").await.unwrap();

        let RawMenuPayload::Legacy { header, periods } = payload else {
            panic!("expected the legacy shape");
        };
        assert_eq!(header.location_id.as_deref(), Some("6838"));
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].meta.name, "Breakfast");
        assert_eq!(periods[0].products.len(), 1);
        // the failed lunch fetch only loses lunch
        assert!(periods[1].stations.is_empty());
        assert_eq!(fetcher.transport.requests.borrow().len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_menu_without_periods() {
        let transport = FakeTransport::default().with_page(OHILL, 200, &wrap_model(BASE_MODEL));
        let fetcher = fetcher(transport, false);
        let scrape = fetcher.scrape_menu(HallId::Ohill).await.unwrap();
        assert_eq!(scrape.periods.len(), 2);
        assert!(scrape.periods.iter().all(|(_, raw)| raw.is_none()));
        assert_eq!(fetcher.transport.requests.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_errors() {
        let transport = FakeTransport::default().with_page(OHILL, 404, "gone");
        let err = fetcher(transport, true).fetch_menu("ohill").await.unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::Status { status: 404, .. })));

        let transport = FakeTransport::default().with_page(OHILL, 200, "<html>maintenance</html>");
        let err = fetcher(transport, true).fetch_menu("ohill").await.unwrap_err();
        assert!(matches!(err, Error::Extraction(ExtractionError::AnchorNotFound(_))));

        let transport = FakeTransport::default();
        let err = fetcher(transport, true).fetch_menu("runk").await.unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_unknown_hall_makes_no_request() {
        let fetcher = fetcher(FakeTransport::default(), true);
        let as_of = Utc::now();
        assert!(matches!(
            fetcher.fetch_menu("crossroads").await,
            Err(Error::UnknownHall(_))
        ));
        assert!(matches!(
            fetcher.resolve_hours("crossroads", as_of).await,
            Err(Error::UnknownHall(_))
        ));
        assert!(fetcher.transport.requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_hours() {
        let transport = FakeTransport::default().with_page(OHILL, 200, &wrap_model(BASE_MODEL));
        let fetcher = fetcher(transport, true);
        // 01:00 UTC Wednesday is Tuesday evening in New York
        let as_of = Utc.with_ymd_and_hms(2025, 9, 17, 1, 0, 0).unwrap();
        let hours = fetcher.resolve_hours("ohill", as_of).await.unwrap();
        assert_eq!(hours.day_of_week, 2);
        assert_eq!((hours.open.as_str(), hours.close.as_str()), ("07:00", "14:00"));
        assert_eq!(hours.period("1421").unwrap().end, "10:30");
    }

    #[tokio::test]
    async fn test_resolve_hours_without_blob() {
        let transport =
            FakeTransport::default().with_page(OHILL, 200, r#"<script>model: {"Menu":{}}</script>"#);
        let err = fetcher(transport, true)
            .resolve_hours("ohill", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HoursNotFound(_)));
    }
}
