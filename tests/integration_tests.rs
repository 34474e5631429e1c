use geoscope::{
    Bounds, Config, EventDate, EventRecord, GeoscopeError, IndexBuilder, MemoryLookupService,
    MemoryTileSource, PlaceRecord, QueryDate, SpatialIndex, TileStatus, decode, encode,
};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Tile rows as they appear in a region tile: hybrid geokey, title, optional
/// display name, page length.
fn tile(rows: &[(&str, &str, &str, i64)]) -> String {
    let mut body = String::from("geokey\tpage_title\tname\tpage_len\n");
    for (geokey, title, name, len) in rows {
        body.push_str(&format!("{}\t{}\t{}\t{}\n", geokey, title, name, len));
    }
    body
}

fn index_with(source: Arc<MemoryTileSource>) -> SpatialIndex {
    IndexBuilder::new().tile_source(source).build().unwrap()
}

#[tokio::test]
async fn test_viewport_returns_best_place_per_cell() {
    init_logging();
    let key = encode(10.5, 10.5, 7).unwrap();
    // A sibling cell; every zoom-7 sibling here is centered inside the viewport.
    let sibling = format!("{}3", &key[..6]);
    let source = Arc::new(MemoryTileSource::new().with_tile(
        "geodata/s.csv.gz",
        tile(&[
            (key.as_str(), "Small", "Small", 3),
            (sibling.as_str(), "Big", "Big", 42),
        ]),
    ));
    let index = index_with(Arc::clone(&source));

    let bounds = Bounds::new(10.0, 11.0, 10.0, 11.0);
    let places = index.get_entries_in_bounds(&bounds, 2).await.unwrap();
    assert_eq!(places.len(), 1);
    assert_eq!(places[0].page_title, "Big");
    assert_eq!(places[0].page_len, 42);

    let best = index.get_best_representative("s0").unwrap().unwrap();
    assert_eq!(best.page_title, "Big");
    assert_eq!(source.fetch_count("geodata/s.csv.gz"), 1);
    assert_eq!(index.tile_status("geodata/s.csv.gz"), TileStatus::Done);
}

#[tokio::test]
async fn test_unnamed_place_outranks_named_duplicate() {
    let source = Arc::new(MemoryTileSource::new().with_tile(
        "geodata/s.csv.gz",
        tile(&[
            ("s000", "Curated", "Curated Name", 90_000),
            ("s001", "Raw_Page", "", 10),
        ]),
    ));
    let index = index_with(source);
    let places = index
        .get_entries_in_bounds(&Bounds::new(0.5, 10.0, 0.5, 10.0), 2)
        .await
        .unwrap();
    assert_eq!(places[0].page_title, "Raw_Page");
}

#[tokio::test]
async fn test_wide_viewport_loads_overview_tile() {
    let source = Arc::new(MemoryTileSource::new().with_tile(
        "geodata/geo3_unique.csv.gz",
        tile(&[("s03", "Somewhere", "Somewhere", 1), ("u12", "Elsewhere", "Elsewhere", 2)]),
    ));
    let index = index_with(Arc::clone(&source));

    let places = index.get_entries_in_bounds(&Bounds::world(), 1).await.unwrap();
    let titles: Vec<_> = places.iter().map(|p| p.page_title.as_str()).collect();
    assert_eq!(titles, vec!["Elsewhere", "Somewhere"]);
    assert_eq!(source.fetch_count("geodata/geo3_unique.csv.gz"), 1);
    assert_eq!(source.fetch_count("geodata/s.csv.gz"), 0);
}

#[tokio::test]
async fn test_max_results_thins_to_one_per_parent_cell() {
    let mut rows = Vec::new();
    for a in 0..4 {
        for b in 0..4 {
            rows.push((format!("s0{}{}", a, b), format!("P{}{}", a, b), a * 10 + b));
        }
    }
    let body = tile(
        &rows
            .iter()
            .map(|(k, t, len)| (k.as_str(), t.as_str(), "n", *len as i64))
            .collect::<Vec<_>>(),
    );
    let source = Arc::new(MemoryTileSource::new().with_tile("geodata/s.csv.gz", body));
    let index = IndexBuilder::new()
        .config(Config::default().with_max_results(5))
        .tile_source(source)
        .build()
        .unwrap();

    // Kept off the region edges so only the "s" tile is needed.
    let bounds = Bounds::new(0.5, 22.0, 0.5, 22.0);
    let places = index.get_entries_in_bounds(&bounds, 4).await.unwrap();
    let keys: Vec<_> = places.iter().map(|p| p.geokey.as_str()).collect();
    // 16 candidates, over the cap: the best of each "s0x" cell survives.
    assert_eq!(keys, vec!["s033", "s023", "s013", "s003"]);
}

#[tokio::test]
async fn test_text_search_after_ingestion() {
    let source = Arc::new(MemoryTileSource::new().with_tile(
        "geodata/s.csv.gz",
        tile(&[
            ("s01", "Lake_Chad", "Lake Chad", 500),
            ("s02", "Chad_Basin", "", 100),
        ]),
    ));
    let index = index_with(source);
    assert!(index.text_search("chad", 10).is_empty());

    index
        .ensure_loaded(&["geodata/s.csv.gz".to_string()])
        .await
        .unwrap();
    let hits = index.text_search("chad", 10);
    let titles: Vec<_> = hits.iter().map(|p| p.page_title.as_str()).collect();
    assert_eq!(titles, vec!["Chad_Basin", "Lake_Chad"]);
}

#[tokio::test]
async fn test_backend_geodata_from_bounds() {
    let service = Arc::new(MemoryLookupService::new());
    let mut place = PlaceRecord::new("s0", "Alpha", 10);
    place.full_geokey = Some("s0123".to_string());
    place.dots.insert(3, vec!["s00".to_string(), "s01".to_string()]);
    service.add_place(place);

    let index = IndexBuilder::new()
        .lookup_service(service)
        .build()
        .unwrap();
    let geodata = index
        .geodata_from_bounds(&Bounds::new(0.0, 22.5, 0.0, 22.5), 3)
        .await
        .unwrap();
    assert_eq!(geodata.entries.len(), 1);
    // Located at the more precise full geokey.
    let expected = decode("s0123").unwrap();
    assert_eq!(geodata.entries[0].lat, expected.y());
    assert_eq!(geodata.dots.len(), 2);
    assert!(geodata.dots.iter().all(|d| d.geokey.starts_with("dot-")));
}

#[tokio::test]
async fn test_events_for_bounds_and_date() {
    init_logging();
    let service = Arc::new(MemoryLookupService::new());
    let waterloo_day = EventDate::new(1815, 6, 18);
    let waterloo_key = encode(50.68, 4.41, 8).unwrap();
    let quatre_bras_key = encode(50.57, 4.45, 8).unwrap();
    service.add_month_region_event(
        "1815-6-u",
        EventRecord::new("waterloo", &waterloo_key, waterloo_day, waterloo_day)
            .with_name("Battle of Waterloo"),
    );
    service.add_month_region_event(
        "1815-6-u",
        EventRecord::new(
            "quatre_bras",
            &quatre_bras_key,
            EventDate::new(1815, 6, 16),
            EventDate::new(1815, 6, 16),
        ),
    );

    let index = IndexBuilder::new()
        .lookup_service(Arc::clone(&service) as Arc<dyn geoscope::LookupService>)
        .build()
        .unwrap();
    let bounds = Bounds::new(50.0, 51.0, 4.0, 5.0);
    let date = QueryDate::day(1815, 6, 18);

    let view = index
        .get_events_for_bounds_and_date(&bounds, 8, date, false)
        .await
        .unwrap();
    let mut ids: Vec<_> = view.events.iter().map(|m| m.event.event_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["quatre_bras", "waterloo"]);

    // Zoomed out the two battles share a cell: Waterloo overlaps the date and
    // wins, Quatre Bras becomes a dot.
    let shared = waterloo_key
        .chars()
        .zip(quatre_bras_key.chars())
        .take_while(|(a, b)| a == b)
        .count();
    let view = index
        .get_events_for_bounds_and_date(&bounds, shared, date, false)
        .await
        .unwrap();
    assert_eq!(view.events.len(), 1);
    assert_eq!(view.events[0].event.event_id, "waterloo");
    assert_eq!(view.dot_events.len(), 1);
    assert_eq!(view.dot_events[0].event_id, "quatre_bras");
}

#[tokio::test]
async fn test_invalid_inputs() {
    let index = SpatialIndex::builder().build().unwrap();
    let inverted = Bounds::new(11.0, 10.0, 10.0, 11.0);
    assert!(matches!(
        index.get_entries_in_bounds(&inverted, 2).await,
        Err(GeoscopeError::InvalidInput(_))
    ));
    assert!(matches!(
        index.get_best_representative(""),
        Err(GeoscopeError::InvalidInput(_))
    ));
    assert!(encode(91.0, 0.0, 4).is_err());
}
