//! Unit tests for the correlation cache

use axum::body::Bytes;
use inpaint_gateway::correlation::{
    CorrelationCache, CorrelationMetadata, Correlator, LatestIngested,
};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn metadata(face: &str) -> CorrelationMetadata {
    assert_ok!(CorrelationMetadata::from_url(&format!(
        "https://cdn.example.com/images/cubemaps/PANO/PANO_{}.png",
        face
    )))
}

#[test]
fn test_metadata_from_cubemap_url() {
    let meta = metadata("f");
    assert_eq!(meta.correlation_key, "PANO");
    assert_eq!(meta.face_discriminator, "f");
    assert_eq!(meta.filename_base, "PANO_f");
    assert_eq!(meta.original_filename, "PANO_f.png");
    assert_eq!(meta.expected_result_filename, "PANO_f_m.png");
}

#[test]
fn test_metadata_rejects_short_paths() {
    assert_err!(CorrelationMetadata::from_url("https://h/file.png"));
    assert_err!(CorrelationMetadata::from_url("https://h/key/"));
    assert_err!(CorrelationMetadata::from_url("not a url"));
}

#[test]
fn test_capacity_evicts_oldest_id() {
    let cache = CorrelationCache::new(2, Duration::from_secs(60));
    cache.insert("unity_image_20240101_000001", Bytes::from_static(b"1"), metadata("f"));
    cache.insert("unity_image_20240101_000002", Bytes::from_static(b"2"), metadata("b"));
    cache.insert("unity_image_20240101_000003", Bytes::from_static(b"3"), metadata("l"));

    assert_eq!(cache.len(), 2);
    assert!(cache.get("unity_image_20240101_000001").is_none());
    assert_eq!(
        cache.get("unity_image_20240101_000003"),
        Some(Bytes::from_static(b"3"))
    );
}

#[test]
fn test_expired_entries_are_invisible_and_purged() {
    let cache = CorrelationCache::new(8, Duration::ZERO);
    cache.insert("unity_image_20240101_000001", Bytes::from_static(b"1"), metadata("f"));

    assert!(cache.get("unity_image_20240101_000001").is_none());
    assert!(cache.metadata("unity_image_20240101_000001").is_none());
    assert!(cache.select_pending(None).is_none());

    cache.insert("unity_image_20240101_000002", Bytes::from_static(b"2"), metadata("b"));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_select_pending_prefers_latest() {
    let cache = CorrelationCache::new(8, Duration::from_secs(60));
    cache.insert("unity_image_20240101_000009", Bytes::from_static(b"9"), metadata("r"));
    cache.insert("unity_image_20240101_000001", Bytes::from_static(b"1"), metadata("f"));

    let (id, meta) = cache.select_pending(None).unwrap();
    assert_eq!(id, "unity_image_20240101_000009");
    assert_eq!(meta.face_discriminator, "r");
}

#[test]
fn test_select_pending_honours_cached_hint() {
    let cache = CorrelationCache::new(8, Duration::from_secs(60));
    cache.insert("unity_image_20240101_000009", Bytes::from_static(b"9"), metadata("r"));
    cache.insert("unity_image_20240101_000001", Bytes::from_static(b"1"), metadata("f"));

    let (id, _) = cache.select_pending(Some("unity_image_20240101_000001")).unwrap();
    assert_eq!(id, "unity_image_20240101_000001");
}

#[test]
fn test_latest_ingested_ignores_hint() {
    let cache = CorrelationCache::with_correlator(
        8,
        Duration::from_secs(60),
        Box::new(LatestIngested),
    );
    cache.insert("unity_image_20240101_000009", Bytes::from_static(b"9"), metadata("r"));
    cache.insert("unity_image_20240101_000001", Bytes::from_static(b"1"), metadata("f"));

    let (id, _) = cache.select_pending(Some("unity_image_20240101_000001")).unwrap();
    assert_eq!(id, "unity_image_20240101_000009");
    assert_eq!(LatestIngested.select(&[], None), None);
}
