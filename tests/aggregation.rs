mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use radio_catalog::{
    aggregator::CatalogAggregator,
    stations::{find_preset, Station},
    CatalogError,
};

use common::{station, stations, test_config, MockDirectory};

fn aggregator(directory: Arc<MockDirectory>) -> CatalogAggregator {
    CatalogAggregator::new(directory, test_config().catalog)
}

#[tokio::test]
async fn one_surviving_bulk_query_is_enough() {
    let directory = MockDirectory::new();
    directory.set_country("GB", "United Kingdom", stations("gb", "United Kingdom", 5));
    for key in [
        "code:GB:votes",
        "code:GB:clickcount",
        "code:GB:name",
        "name:United Kingdom:votes",
        "name:United Kingdom:clickcount",
    ] {
        directory.fail(key);
    }

    let uk = find_preset("uk").unwrap();
    let found = aggregator(directory.clone())
        .fetch_country_stations(uk, 5)
        .await
        .unwrap();

    assert_eq!(found.len(), 5);
    assert_eq!(directory.bulk_calls(), 6);
}

#[tokio::test]
async fn all_bulk_queries_failing_is_directory_unavailable() {
    let directory = MockDirectory::new();
    directory.set_country("GB", "United Kingdom", stations("gb", "United Kingdom", 5));
    directory.fail("GB");
    directory.fail("United Kingdom");

    let uk = find_preset("uk").unwrap();
    let error = aggregator(directory)
        .fetch_country_stations(uk, 5)
        .await
        .unwrap_err();

    assert!(matches!(error, CatalogError::DirectoryUnavailable { ref country } if country == "uk"));
}

#[tokio::test]
async fn empty_answers_count_as_unavailable() {
    let directory = MockDirectory::new();
    let uk = find_preset("uk").unwrap();
    let error = aggregator(directory)
        .fetch_country_stations(uk, 5)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), "directory-unavailable");
}

#[tokio::test]
async fn duplicate_ids_across_queries_collapse() {
    let directory = MockDirectory::new();
    let list = stations("de", "Germany", 4);
    directory.set_country("DE", "Germany", list.clone());

    let de = find_preset("de").unwrap();
    let found = aggregator(directory)
        .fetch_country_stations(de, 10)
        .await
        .unwrap();

    let ids: Vec<&str> = found.iter().map(|station| station.id.as_str()).collect();
    assert_eq!(ids, vec!["de-1", "de-2", "de-3", "de-4"]);
}

#[tokio::test]
async fn brand_discovery_keeps_only_in_country_results() {
    let directory = MockDirectory::new();
    directory.set_search(
        "BBC Radio 1",
        vec![
            station("bbc1", "BBC Radio 1", "The United Kingdom Of Great Britain And Northern Ireland"),
            station("bbc1-fan", "BBC Radio 1 Fan Relay", "Germany"),
            station("bbc1-blank", "BBC Radio 1 Mirror", ""),
        ],
    );

    let uk = find_preset("uk").unwrap();
    let found = aggregator(directory)
        .fetch_major_brand_stations(uk)
        .await;

    let ids: Vec<&str> = found.iter().map(|station| station.id.as_str()).collect();
    assert_eq!(ids, vec!["bbc1"]);
}

#[tokio::test]
async fn aggregate_curates_brands_to_the_top() {
    let directory = MockDirectory::new();
    let mut list: Vec<Station> = stations("gb", "United Kingdom", 3);
    list.push(
        station("heart", "Heart London", "United Kingdom").with_popularity(10, 0),
    );
    list.push(
        station("radio2", "BBC Radio 2", "United Kingdom").with_popularity(5, 0),
    );
    directory.set_country("GB", "United Kingdom", list);

    let uk = find_preset("uk").unwrap();
    let snapshot = aggregator(directory).aggregate(uk, 10).await.unwrap();

    let top: Vec<&str> = snapshot
        .top_stations
        .iter()
        .map(|station| station.id.as_str())
        .collect();
    assert_eq!(top, vec!["radio2", "heart"]);
    assert_eq!(snapshot.station_count, 5);
    assert!(snapshot.brand_score(&snapshot.top_stations[0]) > snapshot.brand_score(&snapshot.top_stations[1]));
}

#[tokio::test]
async fn blank_search_never_reaches_the_directory() {
    let directory = MockDirectory::new();
    let found = aggregator(directory.clone())
        .search("   ", None)
        .await
        .unwrap();
    assert!(found.is_empty());
    assert_eq!(directory.search_calls(), 0);
}
