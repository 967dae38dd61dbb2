//! Store integration tests against in-memory SQLite.

use std::collections::HashMap;

use chrono::{Duration, TimeZone, Utc};
use limelight_common::{
    Alias, BaselineSignal, Document, Entity, EntityDailyDriver, EntityDailyMetrics, EntityType,
    EntityWeeklyBaseline, Mention, Run, RunMetricsRow, RunStatus, SourceItem, Source,
};
use limelight_store::{Store, StoreError};
use uuid::Uuid;

fn entity(id: &str, pinned: bool) -> Entity {
    Entity {
        entity_id: id.to_string(),
        entity_key: id.to_string(),
        canonical_name: format!("Entity {id}"),
        entity_type: EntityType::Person,
        is_pinned: pinned,
        is_active: true,
        first_seen_at: Some(Utc::now()),
        last_seen_at: None,
        dormant_since: None,
        external_ids: HashMap::new(),
        context_hints: vec!["hint".to_string()],
        metadata: serde_json::json!({}),
    }
}

fn source_item(id: &str) -> SourceItem {
    SourceItem {
        item_id: id.to_string(),
        source: Source::Reddit,
        url: format!("https://example.com/{id}"),
        published_at: Utc.with_ymd_and_hms(2026, 8, 1, 15, 0, 0).unwrap(),
        fetched_at: Utc::now(),
        title: "Title".to_string(),
        description: "Body".to_string(),
        author: Some("author".to_string()),
        engagement: [("score".to_string(), 10.0)].into(),
        raw_payload: serde_json::json!({"k": "v"}),
    }
}

fn document(doc_id: &str, item_id: &str) -> Document {
    Document {
        doc_id: doc_id.to_string(),
        item_id: item_id.to_string(),
        doc_timestamp: Utc.with_ymd_and_hms(2026, 8, 1, 15, 0, 0).unwrap(),
        lang: "en".to_string(),
        text_title: "Title".to_string(),
        text_caption: String::new(),
        text_body: "Body".to_string(),
        text_all: "Title\nBody".to_string(),
        quality_flags: Vec::new(),
        hash_sim: format!("hash_{doc_id}"),
    }
}

fn run_row(run_id: Uuid, offset_days: i64, status: RunStatus) -> Run {
    let start = Utc.with_ymd_and_hms(2026, 8, 1, 13, 0, 0).unwrap() + Duration::days(offset_days);
    Run {
        run_id,
        window_start: start,
        window_end: start + Duration::days(1),
        started_at: Utc::now(),
        finished_at: None,
        status,
        config_fingerprint: "fp".to_string(),
        notes: String::new(),
    }
}

fn metrics_row(run_id: Uuid, entity_id: &str, fame: f64) -> EntityDailyMetrics {
    EntityDailyMetrics {
        run_id,
        entity_id: entity_id.to_string(),
        fame,
        love: 50.0,
        attention: 10.0,
        baseline_fame: None,
        momentum: 0.0,
        polarization: 0.0,
        confidence: 20.0,
        mentions_explicit: 1,
        mentions_implicit: 0,
        sources_distinct: 1,
        is_dormant: false,
        dormancy_reason: None,
        metadata: serde_json::json!({}),
    }
}

#[tokio::test]
async fn source_item_upsert_is_idempotent() {
    let store = Store::connect_memory().await.unwrap();
    assert!(store.insert_source_item(&source_item("a")).await.unwrap());
    assert!(!store.insert_source_item(&source_item("a")).await.unwrap());

    let window_items = store
        .source_items_in_window(
            Utc.with_ymd_and_hms(2026, 8, 1, 13, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 8, 2, 13, 0, 0).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(window_items.len(), 1);
    assert_eq!(window_items[0].engagement["score"], 10.0);
    assert_eq!(window_items[0].raw_payload["k"], "v");
}

#[tokio::test]
async fn entity_and_alias_roundtrip() {
    let store = Store::connect_memory().await.unwrap();
    store.upsert_entity(&entity("e1", true)).await.unwrap();
    store
        .upsert_alias(&Alias {
            entity_id: "e1".to_string(),
            surface: "Alias One".to_string(),
            surface_norm: "alias one".to_string(),
            is_primary: true,
            confidence: 1.0,
        })
        .await
        .unwrap();
    // Same normalized form again is a no-op, not an error.
    store
        .upsert_alias(&Alias {
            entity_id: "e1".to_string(),
            surface: "ALIAS ONE".to_string(),
            surface_norm: "alias one".to_string(),
            is_primary: false,
            confidence: 0.9,
        })
        .await
        .unwrap();

    let entities = store.active_entities().await.unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].context_hints, vec!["hint"]);

    let aliases = store.aliases_by_entity().await.unwrap();
    assert_eq!(aliases["e1"].len(), 1);
}

#[tokio::test]
async fn run_window_refuses_second_success() {
    let store = Store::connect_memory().await.unwrap();
    let first = Uuid::new_v4();
    store.create_run(&run_row(first, 0, RunStatus::Running)).await.unwrap();
    store
        .update_run_status(first, RunStatus::Failed, Some(Utc::now()), "boom")
        .await
        .unwrap();

    // Failed window may be retried under a new run id.
    let second = Uuid::new_v4();
    store.create_run(&run_row(second, 0, RunStatus::Running)).await.unwrap();
    store
        .update_run_status(second, RunStatus::Success, Some(Utc::now()), "")
        .await
        .unwrap();

    // A SUCCESS window is final.
    let third = Uuid::new_v4();
    let err = store
        .create_run(&run_row(third, 0, RunStatus::Running))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::RunConflict(_)));
}

#[tokio::test]
async fn mention_counts_join_documents() {
    let store = Store::connect_memory().await.unwrap();
    store.upsert_entity(&entity("e1", false)).await.unwrap();
    store.insert_source_item(&source_item("i1")).await.unwrap();
    store.insert_document(&document("d1", "i1")).await.unwrap();

    let mention = Mention {
        mention_id: "m1".to_string(),
        doc_id: "d1".to_string(),
        entity_id: "e1".to_string(),
        sent_idx: 0,
        span_start: 0,
        span_end: 5,
        surface: "Title".to_string(),
        is_implicit: false,
        weight: 1.0,
        resolve_confidence: 1.0,
        features: Default::default(),
    };
    store.insert_mention(&mention).await.unwrap();
    store.insert_mention(&mention).await.unwrap(); // idempotent

    let count = store
        .mention_count_between(
            "e1",
            Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn snapshot_writes_are_transactional_per_entity() {
    let store = Store::connect_memory().await.unwrap();
    store.upsert_entity(&entity("e1", false)).await.unwrap();
    store.insert_source_item(&source_item("i1")).await.unwrap();
    let run_id = Uuid::new_v4();
    store.create_run(&run_row(run_id, 0, RunStatus::Running)).await.unwrap();

    let metrics = metrics_row(run_id, "e1", 70.0);
    let drivers = vec![EntityDailyDriver {
        run_id,
        entity_id: "e1".to_string(),
        rank: 1,
        item_id: "i1".to_string(),
        impact_score: 12.5,
        reason: "Entity e1 in a Reddit thread (10 upvotes, mixed)".to_string(),
    }];
    store
        .write_entity_snapshot(&metrics, &drivers, &[])
        .await
        .unwrap();

    let rows = store.daily_metrics_for_run(run_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].fame, 70.0);

    let stored_drivers = store.drivers_for_entity(run_id, "e1").await.unwrap();
    assert_eq!(stored_drivers.len(), 1);
    assert_eq!(stored_drivers[0].rank, 1);

    // Write-once: a second write for the same (run, entity) key fails.
    assert!(store
        .write_entity_snapshot(&metrics, &[], &[])
        .await
        .is_err());
}

#[tokio::test]
async fn fame_love_history_reads_only_success_runs() {
    let store = Store::connect_memory().await.unwrap();
    store.upsert_entity(&entity("e1", false)).await.unwrap();

    for (offset, status, fame) in [
        (0, RunStatus::Success, 60.0),
        (1, RunStatus::Partial, 10.0),
        (2, RunStatus::Success, 80.0),
    ] {
        let run_id = Uuid::new_v4();
        store.create_run(&run_row(run_id, offset, RunStatus::Running)).await.unwrap();
        store
            .write_entity_snapshot(&metrics_row(run_id, "e1", fame), &[], &[])
            .await
            .unwrap();
        store
            .update_run_status(run_id, status, Some(Utc::now()), "")
            .await
            .unwrap();
    }

    let history = store
        .fame_love_history(
            "e1",
            Utc.with_ymd_and_hms(2026, 7, 25, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].fame, 60.0);
    assert_eq!(history[1].fame, 80.0);
}

#[tokio::test]
async fn weekly_baseline_upsert_is_idempotent_within_week() {
    let store = Store::connect_memory().await.unwrap();
    store.upsert_entity(&entity("e1", true)).await.unwrap();

    let baseline = EntityWeeklyBaseline {
        entity_id: "e1".to_string(),
        iso_week: "2026-W31".to_string(),
        signal: BaselineSignal::Combined,
        baseline_fame: 42.0,
    };
    store.upsert_weekly_baseline(&baseline).await.unwrap();
    store
        .upsert_weekly_baseline(&EntityWeeklyBaseline {
            baseline_fame: 44.0,
            ..baseline.clone()
        })
        .await
        .unwrap();

    let latest = store
        .latest_combined_baseline("e1", "2026-W31")
        .await
        .unwrap();
    assert_eq!(latest, Some(44.0));

    // Later weeks see the last known value; earlier weeks see nothing.
    assert_eq!(
        store.latest_combined_baseline("e1", "2026-W40").await.unwrap(),
        Some(44.0)
    );
    assert_eq!(
        store.latest_combined_baseline("e1", "2026-W30").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn run_metrics_roundtrip() {
    let store = Store::connect_memory().await.unwrap();
    let run_id = Uuid::new_v4();
    store.create_run(&run_row(run_id, 0, RunStatus::Running)).await.unwrap();

    let mut metrics = RunMetricsRow::default();
    metrics.source_counts.insert("reddit".to_string(), 12);
    metrics.source_errors.insert("youtube".to_string(), "quota".to_string());
    metrics.mention_counts.total = 5;
    metrics.mention_counts.resolved = 4;
    metrics.mention_counts.unresolved = 1;
    metrics.timings_ms.insert("ingest".to_string(), 1200);

    store.write_run_metrics(run_id, &metrics).await.unwrap();
    let loaded = store.get_run_metrics(run_id).await.unwrap().unwrap();
    assert_eq!(loaded.source_counts["reddit"], 12);
    assert_eq!(loaded.mention_counts.resolved, 4);
    assert_eq!(loaded.timings_ms["ingest"], 1200);
}
