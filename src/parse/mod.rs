mod error;
pub mod extract;
pub mod hours;
pub mod nutrition;
pub mod payload;
mod remove_excess_whitespace;
mod vendor_id;

pub use error::ExtractionError;
pub use hours::HoursResult;
pub use nutrition::NutritionInfo;
pub use payload::{MenuScrape, RawMenuPayload};
pub use remove_excess_whitespace::remove_excess_whitespace;
