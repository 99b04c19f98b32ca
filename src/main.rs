#![deny(unused_crate_dependencies)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod config;
mod error;
mod fetch;
mod hall;
mod ingest;
mod normalize;
mod parse;
mod store;

use std::{env, time::Instant};

use chrono::Utc;

use crate::{
    config::Config,
    fetch::Fetcher,
    hall::HallId,
    ingest::ingest_hall,
    store::{persist, Store},
};

pub use error::Result;

#[cfg(all(target_env = "musl", target_pointer_width = "64"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> core::result::Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let config = Config::from_env()?;
    let store = config.store.as_deref().map_or(Store::AdHoc, Store::local);
    log::debug!("{store:?}");

    let args: Vec<String> = env::args().skip(1).collect();
    let halls: Vec<String> = if args.is_empty() {
        HallId::ALL.iter().map(|h| h.key().to_string()).collect()
    } else {
        args
    };

    let mut data = store.load().await?;
    let fetcher = Fetcher::from_config(config);
    log::info!("resolving hours in {}", fetcher.config().timezone);
    for hall in &halls {
        let start = Instant::now();
        match ingest_hall(&fetcher, hall, Utc::now()).await {
            Ok(ingest) => {
                for item in ingest.items() {
                    log::trace!(
                        "{}: {:?}",
                        item.name,
                        ingest.item_allergens(item).collect::<Vec<_>>()
                    );
                }
                let summary = persist(&ingest, &mut data).unwrap_or_else(|e| match e {});
                println!(
                    "{hall}: {} {} periods, {} stations, {} items, {} with nutrition ({:?})",
                    ingest.day.date,
                    summary.periods,
                    summary.stations,
                    summary.menu_items,
                    summary.nutrition,
                    start.elapsed(),
                );
            }
            Err(e) => log::error!("skipping {hall}: {e}"),
        }
    }
    store.save(&data).await?;
    log::info!("store now holds {:?}", data.counts());
    Ok(())
}
