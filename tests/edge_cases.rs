use geoscope::{
    Bounds, DecodeCache, IndexBuilder, MemoryTileSource, PrefixTrie, PlaceRecord, decode,
    GeoscopeError, decode_bounds, encode, overlapping_geokeys, overlapping_geokeys_within,
};
use std::sync::Arc;

/// Test 1: Extreme coordinate values
#[test]
fn test_extreme_coordinates() {
    assert_eq!(encode(90.0, 180.0, 4).expect("Failed to encode NE corner"), "z333");
    assert_eq!(encode(-90.0, -180.0, 4).expect("Failed to encode SW corner"), "0000");

    let cases = [
        (90.0, 0.0),
        (-90.0, 0.0),
        (0.0, 180.0),
        (0.0, -180.0),
        (89.999_999, 179.999_999),
    ];
    for (lat, lon) in cases {
        let key = encode(lat, lon, 12).unwrap_or_else(|_| panic!("Failed to encode {lat},{lon}"));
        let cell = decode_bounds(&key).expect("Failed to decode");
        assert!(cell.contains(lat, lon), "{key} does not cover {lat},{lon}");
    }

    assert!(encode(90.000_001, 0.0, 4).is_err());
    assert!(encode(0.0, -180.5, 4).is_err());
    assert!(encode(f64::NAN, 0.0, 4).is_err());
}

/// Test 2: Geokey length limits
#[test]
fn test_geokey_length_limits() {
    assert!(encode(10.0, 10.0, 0).is_err());
    assert_eq!(encode(10.0, 10.0, 24).expect("Failed to encode").len(), 24);
    assert!(encode(10.0, 10.0, 25).is_err());

    let bounds = Bounds::new(10.0, 10.0, 10.0, 10.0);
    assert!(overlapping_geokeys(&bounds, 0).is_err());
    assert!(overlapping_geokeys(&bounds, 25).is_err());
}

/// Test 3: Malformed geokeys are rejected rather than misread
#[test]
fn test_malformed_geokeys() {
    for key in ["", "a", "s4", "bc", "s0x", "S0"] {
        assert!(decode(key).is_err(), "{key:?} should not decode");
    }

    let cache = DecodeCache::new();
    assert!(cache.decode("s4").is_err());
    assert!(cache.is_empty());
    cache.decode("s0").expect("Failed to decode");
    cache.decode("s0").expect("Failed to decode");
    assert_eq!(cache.len(), 1);
}

/// Test 4: Degenerate and edge-aligned viewports
#[test]
fn test_degenerate_viewports() {
    let point = Bounds::new(10.0, 10.0, 10.0, 10.0);
    assert_eq!(overlapping_geokeys(&point, 3).expect("Enumeration failed"), vec!["s00"]);

    // A point on a shared corner touches all four cells.
    let corner = Bounds::new(22.5, 22.5, 22.5, 22.5);
    let keys = overlapping_geokeys(&corner, 2).expect("Enumeration failed");
    assert_eq!(keys, vec!["s0", "s1", "s2", "s3"]);

    let inverted = Bounds::new(10.0, 9.0, 10.0, 11.0);
    assert!(overlapping_geokeys(&inverted, 2).is_err());
}

/// Test 5: Whole-world enumeration stays ordered and unique
#[test]
fn test_world_enumeration() {
    let keys = overlapping_geokeys(&Bounds::world(), 2).expect("Enumeration failed");
    assert_eq!(keys.len(), 32 * 4);
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
}

/// Test 6: Trie keys at the length limit and beyond
#[test]
fn test_trie_key_limits() {
    let mut trie = PrefixTrie::new();
    let deep = encode(-33.9, 151.2, 24).expect("Failed to encode");
    trie.insert(Arc::new(PlaceRecord::new(deep.clone(), "Deep", 1)))
        .expect("Failed to insert");
    assert!(trie.insert(Arc::new(PlaceRecord::new("", "Empty", 1))).is_err());
    let too_long = format!("{}0", deep);
    assert!(trie.insert(Arc::new(PlaceRecord::new(too_long, "TooLong", 1))).is_err());

    assert!(trie.compute_best_entries(""));
    let best = trie.best(&deep[..1]).expect("Missing best entry");
    assert_eq!(best.entry.page_title, "Deep");
    assert_eq!(best.depth, 23);
}

/// Test 7: Bad tile rows are skipped, good ones still load
#[tokio::test]
async fn test_tile_with_bad_rows() {
    let tile = "geokey\tpage_title\tname\tpage_len\n\
                s00\tGood\tGood\t10\n\
                s4\tBadKey\t\t10\n\
                s01\t\t\t10\n\
                s02\tBadLen\t\tmany\n\
                s03\tAlsoGood\t\t\n";
    let source = Arc::new(MemoryTileSource::new().with_tile("geodata/s.csv.gz", tile));
    let index = IndexBuilder::new()
        .tile_source(source)
        .build()
        .expect("Failed to build index");

    index
        .ensure_loaded(&["geodata/s.csv.gz".to_string()])
        .await
        .expect("Failed to load tile");
    assert_eq!(index.stats().places, 2);
    let also_good = index
        .get_best_representative("s03")
        .expect("Invalid geokey")
        .expect("Missing place");
    assert_eq!(also_good.page_len, 0);
}

/// Test 8: A tile body without a header is a decode error
#[tokio::test]
async fn test_headerless_tile() {
    let source = Arc::new(MemoryTileSource::new().with_tile("geodata/s.csv.gz", ""));
    let index = IndexBuilder::new()
        .tile_source(source)
        .build()
        .expect("Failed to build index");
    let result = index.ensure_loaded(&["geodata/s.csv.gz".to_string()]).await;
    assert!(result.is_err());
    assert_eq!(index.stats().places, 0);
}

/// Test 9: Whole-world viewports at deep zoom hit the key budget
#[tokio::test]
async fn test_world_viewport_at_deep_zoom() {
    let started = std::time::Instant::now();
    for zoom in [10, 16, 24] {
        let err = overlapping_geokeys(&Bounds::world(), zoom).expect_err("Budget not enforced");
        assert!(matches!(err, GeoscopeError::InvalidInput(_)));
    }
    assert_eq!(
        overlapping_geokeys_within(&Bounds::world(), 3, 512)
            .expect("Enumeration failed")
            .len(),
        512
    );

    let source = Arc::new(MemoryTileSource::new());
    let index = IndexBuilder::new()
        .tile_source(source)
        .build()
        .expect("Failed to build index");
    let result = index.get_entries_in_bounds(&Bounds::world(), 16).await;
    assert!(matches!(result, Err(GeoscopeError::InvalidInput(_))));
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
}
