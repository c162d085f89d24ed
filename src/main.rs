use std::env;

use anyhow::{bail, Context};
use serde_json::json;

use radio_catalog::{
    logging::init_logger,
    stations::{all_presets, find_preset},
    AppState, Config, LoadOutcome, SearchOutcome,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = init_logger("radio-catalog");

    let config = Config::load().context("failed to load configuration")?;
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("check-config") => {
            logger.info(
                "config.check_passed",
                serde_json::to_value(&config).unwrap_or_else(|_| json!({ "status": "ok" })),
            );
            return Ok(());
        }
        Some("countries") => {
            for preset in all_presets() {
                println!("{}\t{}\t{}", preset.id, preset.country_code(), preset.display_name);
            }
            return Ok(());
        }
        _ => {}
    }

    let state = AppState::initialize(config)
        .await
        .context("failed to initialize application state")?;

    match args.first().map(String::as_str) {
        Some("load") => {
            let id = args.get(1).context("usage: radio-catalog load <country>")?;
            let Some(preset) = find_preset(id) else {
                bail!("unknown country preset: {id}");
            };
            match state.load_country(preset).await? {
                LoadOutcome::Applied(snapshot) => {
                    for station in &snapshot.top_stations {
                        println!("{}\t{}", station.id, station.name);
                    }
                    logger.info(
                        "catalog.load_completed",
                        json!({
                            "country": snapshot.country_id,
                            "stations": snapshot.station_count,
                            "clusters": snapshot.variants.len(),
                        }),
                    );
                }
                LoadOutcome::Superseded => logger.warn(
                    "catalog.load_superseded",
                    json!({ "country": preset.id }),
                ),
            }
        }
        Some("search") => {
            let query = args[1..].join(" ");
            if let SearchOutcome::Results(stations) = state.search(&query).await? {
                for station in &stations {
                    println!("{}\t{}\t{}", station.id, station.name, station.country);
                }
                logger.info(
                    "catalog.search_completed",
                    json!({ "query": query, "results": stations.len() }),
                );
            }
        }
        Some("refresh") => {
            let report = state.refresh_now().await;
            logger.info(
                "refresh.completed",
                serde_json::to_value(&report).unwrap_or_else(|_| json!({})),
            );
        }
        Some(other) => bail!("unknown command: {other}"),
        None => {
            logger.info(
                "catalog.initialized",
                json!({ "selected": state.selected_country() }),
            );
            state.start_background_refresh();
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for shutdown signal")?;
            state.stop_background_refresh();
            logger.info("catalog.shutdown", json!({}));
        }
    }

    Ok(())
}
