//! End-to-end pipeline scenarios: mock adapters and sentiment, in-memory
//! store, one `DailyRun::execute` per test, asserts against the persisted
//! snapshot.

mod harness;

use harness::*;
use limelight_common::{EntityType, RunStatus, SentimentScores};
use limelight_ingest::SourceAdapter;
use limelight_pipeline::DailyRun;
use limelight_store::Store;

#[tokio::test]
async fn single_explicit_mention() {
    let store = Store::connect_memory().await.unwrap();
    seed_entity(
        &store,
        "person_p1",
        "Alice Example",
        EntityType::Person,
        &[],
        true,
        &[],
    )
    .await;

    let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(MockAdapter {
        tag: "reddit",
        items: vec![reddit_post("a1", "Alice Example wins award", "", 10.0, 2.0)],
    })];
    let dir = tempfile::tempdir().unwrap();
    let runner = DailyRun::new(deps(
        store.clone(),
        adapters,
        Box::new(KeywordSentiment::fixed(0.9, 0.08, 0.02)),
        dir.path().to_path_buf(),
    ));

    let outcome = runner.execute(window()).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Success);

    let rows = store.daily_metrics_for_run(outcome.run_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.entity_id, "person_p1");
    assert_eq!(row.mentions_explicit, 1);
    assert_eq!(row.mentions_implicit, 0);
    assert!(!row.is_dormant);

    // Love raw ≈ 0.9 − 0.02 = 0.88 ⇒ 94 on the 0..100 axis.
    assert!((row.love - 94.0).abs() < 1e-6);
    assert_eq!(row.polarization, 0.0);
    assert!(row.confidence > 0.0);
    // attention = log1p(1 + 0.5·log1p(10 + 2·2)), calibration ×10.
    let expected_attention = 10.0 * (1.0f64 + 0.5 * (15.0f64).ln()).ln_1p();
    assert!((row.attention - expected_attention).abs() < 1e-6);
    // First-ever run: no momentum, flagged.
    assert_eq!(row.momentum, 0.0);
    assert_eq!(row.metadata["insufficient_history"], true);

    let metrics = store
        .get_run_metrics(outcome.run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metrics.mention_counts.resolved, 1);
    assert_eq!(metrics.mention_counts.unresolved, 0);
    assert_eq!(metrics.source_counts["reddit"], 1);
    assert!(metrics.timings_ms.contains_key("ingest"));
}

#[tokio::test]
async fn shared_surface_without_context_goes_to_queue() {
    let store = Store::connect_memory().await.unwrap();
    seed_entity(
        &store,
        "person_p2",
        "Jordan One",
        EntityType::Person,
        &["Jordan"],
        true,
        &[],
    )
    .await;
    seed_entity(
        &store,
        "person_p3",
        "Jordan Two",
        EntityType::Person,
        &["Jordan"],
        true,
        &[],
    )
    .await;

    let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(MockAdapter {
        tag: "reddit",
        items: vec![reddit_post("j1", "Jordan was great.", "", 5.0, 0.0)],
    })];
    let dir = tempfile::tempdir().unwrap();
    let runner = DailyRun::new(deps(
        store.clone(),
        adapters,
        Box::new(KeywordSentiment::fixed(0.5, 0.4, 0.1)),
        dir.path().to_path_buf(),
    ));

    let outcome = runner.execute(window()).await.unwrap();

    let metrics = store
        .get_run_metrics(outcome.run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metrics.mention_counts.resolved, 0);
    assert_eq!(metrics.mention_counts.unresolved, 1);
    assert_eq!(metrics.unresolved_top.len(), 1);
    assert_eq!(metrics.unresolved_top[0].surface, "Jordan");

    let queue = store.unresolved_queue(10).await.unwrap();
    assert_eq!(queue.len(), 1);
    let unresolved = &queue[0];
    assert_eq!(unresolved.candidates.len(), 2);
    // No disambiguating context: the two candidates tie.
    assert!((unresolved.top_score - unresolved.second_score).abs() < 1e-9);

    // Both pinned entities still get (dormant) rows, so the run succeeds.
    let rows = store.daily_metrics_for_run(outcome.run_id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.is_dormant));
    assert_eq!(outcome.status, RunStatus::Success);
}

#[tokio::test]
async fn implicit_attribution_follows_primary_entity() {
    let store = Store::connect_memory().await.unwrap();
    seed_entity(
        &store,
        "show_w",
        "The White Lotus",
        EntityType::Show,
        &[],
        true,
        &[],
    )
    .await;

    let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(MockAdapter {
        tag: "reddit",
        items: vec![reddit_post(
            "w1",
            "The White Lotus finale",
            "It was divisive.",
            20.0,
            5.0,
        )],
    })];
    // Positive on the title sentence, negative on the pronoun sentence.
    let sentiment = KeywordSentiment {
        positive: SentimentScores {
            pos: 0.9,
            neu: 0.1,
            neg: 0.0,
            intensity: 0.6,
        },
        negative: SentimentScores {
            pos: 0.0,
            neu: 0.1,
            neg: 0.9,
            intensity: 0.6,
        },
        negative_keyword: "divisive",
    };
    let dir = tempfile::tempdir().unwrap();
    let runner = DailyRun::new(deps(
        store.clone(),
        vec![adapters.into_iter().next().unwrap()],
        Box::new(sentiment),
        dir.path().to_path_buf(),
    ));

    let outcome = runner.execute(window()).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Success);

    let rows = store.daily_metrics_for_run(outcome.run_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.mentions_explicit, 1);
    assert_eq!(row.mentions_implicit, 1);

    // Implicit contribution is half-weighted: signed love is
    // (1·0.9 + 0.5·(−0.9)) / 1.5 = 0.3 ⇒ 65, not the 50 an equal
    // weighting would give.
    assert!((row.love - 65.0).abs() < 1e-6);
}

#[tokio::test]
async fn pronoun_only_document_attributes_nothing() {
    let store = Store::connect_memory().await.unwrap();
    seed_entity(
        &store,
        "show_w",
        "The White Lotus",
        EntityType::Show,
        &[],
        false,
        &[],
    )
    .await;

    // Pronoun sentence, but no explicit catalog surface anywhere.
    let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(MockAdapter {
        tag: "reddit",
        items: vec![reddit_post(
            "p1",
            "Last night was wild",
            "It was divisive.",
            3.0,
            0.0,
        )],
    })];
    let dir = tempfile::tempdir().unwrap();
    let runner = DailyRun::new(deps(
        store.clone(),
        adapters,
        Box::new(KeywordSentiment::fixed(0.2, 0.7, 0.1)),
        dir.path().to_path_buf(),
    ));

    let outcome = runner.execute(window()).await.unwrap();
    let metrics = store
        .get_run_metrics(outcome.run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metrics.mention_counts.resolved, 0);
    assert_eq!(metrics.mention_counts.implicit, 0);
}

#[tokio::test]
async fn cross_source_engagement_ranks_video_first() {
    let store = Store::connect_memory().await.unwrap();
    seed_entity(
        &store,
        "person_p1",
        "Alice Example",
        EntityType::Person,
        &[],
        true,
        &[],
    )
    .await;

    let adapters: Vec<Box<dyn SourceAdapter>> = vec![
        Box::new(MockAdapter {
            tag: "reddit",
            items: vec![reddit_post(
                "a1",
                "Alice Example wins award",
                "",
                10.0,
                2.0,
            )],
        }),
        Box::new(MockAdapter {
            tag: "youtube",
            items: vec![youtube_video(
                "v1",
                "Alice Example interview",
                "The full conversation.",
                100_000.0,
                3_000.0,
                500.0,
            )],
        }),
    ];
    let dir = tempfile::tempdir().unwrap();
    let runner = DailyRun::new(deps(
        store.clone(),
        adapters,
        Box::new(KeywordSentiment::fixed(0.6, 0.3, 0.1)),
        dir.path().to_path_buf(),
    ));

    let outcome = runner.execute(window()).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Success);

    let drivers = store
        .drivers_for_entity(outcome.run_id, "person_p1")
        .await
        .unwrap();
    assert_eq!(drivers.len(), 2);
    assert_eq!(drivers[0].item_id, "youtube_video_v1");
    assert_eq!(drivers[0].rank, 1);
    assert!(drivers[0].impact_score > drivers[1].impact_score);
    assert!(drivers[0].reason.contains("Alice Example"));
    assert!(drivers[0].reason.contains("views"));

    let rows = store.daily_metrics_for_run(outcome.run_id).await.unwrap();
    assert_eq!(rows[0].sources_distinct, 2);
}

#[tokio::test]
async fn dormant_pinned_entity_gets_neutral_row() {
    let store = Store::connect_memory().await.unwrap();
    seed_entity(
        &store,
        "person_p4",
        "Quiet Star",
        EntityType::Person,
        &[],
        true,
        &[],
    )
    .await;
    // A known weekly baseline feeds Fame even while dormant.
    store
        .upsert_weekly_baseline(&limelight_common::EntityWeeklyBaseline {
            entity_id: "person_p4".to_string(),
            iso_week: "2026-W31".to_string(),
            signal: limelight_common::BaselineSignal::Combined,
            baseline_fame: 80.0,
        })
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let runner = DailyRun::new(deps(
        store.clone(),
        Vec::new(),
        Box::new(KeywordSentiment::fixed(0.3, 0.6, 0.1)),
        dir.path().to_path_buf(),
    ));

    let outcome = runner.execute(window()).await.unwrap();
    // Zero ingested items, but the pinned entity got its dormant row.
    assert_eq!(outcome.status, RunStatus::Success);

    let rows = store.daily_metrics_for_run(outcome.run_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert!(row.is_dormant);
    assert_eq!(row.mentions_explicit, 0);
    assert_eq!(row.mentions_implicit, 0);
    assert_eq!(row.love, 50.0);
    assert_eq!(row.polarization, 0.0);
    // Fame = 0.3·baseline + 0.7·0.
    assert!((row.fame - 0.3 * 80.0).abs() < 1e-6);
    assert_eq!(row.baseline_fame, Some(80.0));
    assert_eq!(row.confidence, 0.0);
}

#[tokio::test]
async fn success_window_cannot_be_rerun() {
    let store = Store::connect_memory().await.unwrap();
    seed_entity(
        &store,
        "person_p1",
        "Alice Example",
        EntityType::Person,
        &[],
        true,
        &[],
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let runner = DailyRun::new(deps(
        store.clone(),
        Vec::new(),
        Box::new(KeywordSentiment::fixed(0.3, 0.6, 0.1)),
        dir.path().to_path_buf(),
    ));
    let outcome = runner.execute(window()).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Success);

    // Snapshot rows are final; the same window is refused outright.
    let again = runner.execute(window()).await;
    assert!(again.is_err());
}

#[tokio::test]
async fn themes_built_above_mention_floor() {
    let store = Store::connect_memory().await.unwrap();
    seed_entity(
        &store,
        "show_w",
        "The White Lotus",
        EntityType::Show,
        &[],
        true,
        &[],
    )
    .await;

    // Five documents, each mentioning the show in a finale-flavored
    // sentence, clears the default K=5 floor.
    let items = (0..5)
        .map(|i| {
            reddit_post(
                &format!("t{i}"),
                &format!("The White Lotus finale episode discussion part {i}"),
                "",
                10.0 + i as f64,
                1.0,
            )
        })
        .collect();
    let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(MockAdapter {
        tag: "reddit",
        items,
    })];
    let dir = tempfile::tempdir().unwrap();
    let runner = DailyRun::new(deps(
        store.clone(),
        adapters,
        Box::new(KeywordSentiment::fixed(0.6, 0.3, 0.1)),
        dir.path().to_path_buf(),
    ));

    let outcome = runner.execute(window()).await.unwrap();
    let themes = store
        .themes_for_entity(outcome.run_id, "show_w")
        .await
        .unwrap();
    assert!(!themes.is_empty());
    let theme = &themes[0];
    assert!(theme.volume >= 2);
    assert!(!theme.keywords.is_empty());
    let mix = &theme.sentiment_mix;
    assert!((mix.pos + mix.neu + mix.neg - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn resolver_is_deterministic_across_runs() {
    // Two identical stores and inputs, two executions: identical mention
    // and unresolved sets (ids are content-derived).
    async fn run_once() -> (Vec<String>, Vec<String>) {
        let store = Store::connect_memory().await.unwrap();
        seed_entity(
            &store,
            "person_p2",
            "Jordan One",
            EntityType::Person,
            &["Jordan"],
            true,
            &[],
        )
        .await;
        seed_entity(
            &store,
            "person_p3",
            "Jordan Two",
            EntityType::Person,
            &["Jordan"],
            true,
            &[],
        )
        .await;
        seed_entity(
            &store,
            "show_w",
            "The White Lotus",
            EntityType::Show,
            &[],
            true,
            &[],
        )
        .await;

        let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(MockAdapter {
            tag: "reddit",
            items: vec![
                reddit_post("x1", "Jordan was great.", "", 5.0, 0.0),
                reddit_post("x2", "The White Lotus finale", "It was divisive.", 8.0, 2.0),
            ],
        })];
        let dir = tempfile::tempdir().unwrap();
        let runner = DailyRun::new(deps(
            store.clone(),
            adapters,
            Box::new(KeywordSentiment::fixed(0.4, 0.5, 0.1)),
            dir.path().to_path_buf(),
        ));
        let outcome = runner.execute(window()).await.unwrap();

        let queue = store.unresolved_queue(100).await.unwrap();
        let unresolved_ids: Vec<String> =
            queue.into_iter().map(|u| u.unresolved_id).collect();
        let rows = store.daily_metrics_for_run(outcome.run_id).await.unwrap();
        let row_keys: Vec<String> = rows
            .iter()
            .map(|r| format!("{}:{}:{}", r.entity_id, r.mentions_explicit, r.mentions_implicit))
            .collect();
        (unresolved_ids, row_keys)
    }

    let first = run_once().await;
    let second = run_once().await;
    assert_eq!(first, second);
}
