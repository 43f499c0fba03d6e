//! Comment-campaign engine behaviour against an in-memory store.

mod common;

use std::collections::HashSet;

use chrono::Duration;
use pretty_assertions::assert_eq;

use common::{FakeGenerator, FakeThreads, Harness, start_time};
use spindle_store::{
    Account, CommentCampaign, CommentStatus, NewCampaign, NewLlmSetting, Store,
};
use spindle_threads::SearchResult;

fn result(id: &str, text: &str) -> SearchResult {
    SearchResult {
        id: id.into(),
        text: text.into(),
        username: Some("someone".into()),
    }
}

fn threads_with(results: Vec<SearchResult>) -> FakeThreads {
    FakeThreads {
        search_results: results,
        ..Default::default()
    }
}

async fn campaign(h: &Harness, account: &Account, max_per_run: u32) -> CommentCampaign {
    campaign_with_delays(h, account, max_per_run, 0, 0).await
}

async fn campaign_with_delays(
    h: &Harness,
    account: &Account,
    max_per_run: u32,
    min_delay_seconds: u64,
    max_delay_seconds: u64,
) -> CommentCampaign {
    h.store
        .create_campaign(NewCampaign {
            user_id: "u1".into(),
            account_id: account.id,
            target_keywords: "rust, tokio".into(),
            comment_style: "witty".into(),
            niche: None,
            max_comments_per_run: max_per_run,
            min_delay_seconds,
            max_delay_seconds,
            interval_minutes: 30,
        })
        .await
        .unwrap()
}

/// Seconds from every "Waiting Ns" progress line, in order.
fn waits(logs: &[String]) -> Vec<u64> {
    logs.iter()
        .filter_map(|line| line.strip_prefix("Waiting ")?.strip_suffix('s')?.parse().ok())
        .collect()
}

#[tokio::test]
async fn test_zero_results_reschedules_by_interval() {
    let h = Harness::new(FakeThreads::default(), FakeGenerator::returning("unused"));
    let account = h.connected_account().await;
    h.default_llm().await;
    let c = campaign(&h, &account, 5).await;

    let summaries = h.campaign_engine().process_due().await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].published, 0);
    assert!(h.generator.calls().is_empty());

    let searched = h.threads.searches.lock().unwrap().clone();
    assert_eq!(searched.len(), 1);
    assert!(["rust", "tokio"].contains(&searched[0].as_str()));

    let stored = h.store.get_campaign(c.id).await.unwrap().unwrap();
    assert!(stored.active);
    assert_eq!(stored.last_run_at, Some(start_time()));
    assert_eq!(stored.next_run_at, Some(start_time() + Duration::minutes(30)));
    assert_eq!(stored.total_comments, 0);
}

#[tokio::test]
async fn test_replies_are_cleaned_published_and_logged() {
    let h = Harness::new(
        threads_with(vec![result("t1", "first post"), result("t2", "second post")]),
        FakeGenerator::returning("unused")
            .then(Ok("\"Great point!\""))
            .then(Ok("«Nice»")),
    );
    let account = h.connected_account().await;
    h.default_llm().await;
    let c = campaign(&h, &account, 5).await;

    let summaries = h.campaign_engine().process_due().await;
    assert_eq!(summaries[0].published, 2);
    assert_eq!(summaries[0].failed, 0);

    assert_eq!(
        h.threads.creates(),
        vec![
            ("Great point!".to_string(), Some("t1".to_string())),
            ("Nice".to_string(), Some("t2".to_string())),
        ]
    );

    let logs = h.store.list_comment_logs(c.id).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].target_remote_id, "t1");
    assert_eq!(logs[0].target_snippet, "first post");
    assert_eq!(logs[0].comment_text, "Great point!");
    assert_eq!(logs[0].status, CommentStatus::Published);
    assert_eq!(logs[0].remote_id.as_deref(), Some("m1"));

    let stored = h.store.get_campaign(c.id).await.unwrap().unwrap();
    assert_eq!(stored.total_comments, 2);

    let (_, request) = &h.generator.calls()[0];
    assert!(request.user_prompt.contains("first post"));
    assert!(request.system_prompt.contains("Russian"));
}

#[tokio::test]
async fn test_comment_count_capped_per_run() {
    let h = Harness::new(
        threads_with(vec![
            result("t1", "a"),
            result("t2", "b"),
            result("t3", "c"),
        ]),
        FakeGenerator::returning("ok"),
    );
    let account = h.connected_account().await;
    h.default_llm().await;
    campaign(&h, &account, 2).await;

    let summaries = h.campaign_engine().process_due().await;
    assert_eq!(summaries[0].published, 2);
    assert_eq!(h.threads.creates().len(), 2);
}

#[tokio::test]
async fn test_failed_publish_is_logged_and_run_continues() {
    let threads = FakeThreads {
        search_results: vec![result("t1", "a"), result("t2", "b")],
        fail_publish: HashSet::from([1]),
        ..Default::default()
    };
    let h = Harness::new(threads, FakeGenerator::returning("good one"));
    let account = h.connected_account().await;
    h.default_llm().await;
    let c = campaign(&h, &account, 5).await;

    let summaries = h.campaign_engine().process_due().await;
    assert_eq!(summaries[0].published, 1);
    assert_eq!(summaries[0].failed, 1);

    let logs = h.store.list_comment_logs(c.id).await.unwrap();
    assert_eq!(logs[0].status, CommentStatus::Failed);
    assert_eq!(logs[0].error.as_deref(), Some("API error: publish rejected"));
    assert_eq!(logs[0].comment_text, "good one");
    assert_eq!(logs[0].remote_id, None);
    assert_eq!(logs[1].status, CommentStatus::Published);

    let stored = h.store.get_campaign(c.id).await.unwrap().unwrap();
    assert_eq!(stored.total_comments, 1);
}

#[tokio::test]
async fn test_empty_generation_is_a_failed_attempt() {
    let h = Harness::new(
        threads_with(vec![result("t1", "a")]),
        FakeGenerator::returning("  \"\"  "),
    );
    let account = h.connected_account().await;
    h.default_llm().await;
    let c = campaign(&h, &account, 5).await;

    let summaries = h.campaign_engine().process_due().await;
    assert_eq!(summaries[0].failed, 1);
    assert!(h.threads.creates().is_empty());

    let logs = h.store.list_comment_logs(c.id).await.unwrap();
    assert_eq!(logs[0].error.as_deref(), Some("generated comment was empty"));
}

#[tokio::test]
async fn test_configuration_error_still_reschedules() {
    let h = Harness::new(
        threads_with(vec![result("t1", "a")]),
        FakeGenerator::returning("unused"),
    );
    let account = h.draft_account().await;
    h.default_llm().await;
    let c = campaign(&h, &account, 5).await;

    let summaries = h.campaign_engine().process_due().await;
    assert!(summaries[0].logs[0].starts_with("Configuration error"));
    assert!(summaries[0].logs[0].contains("@bob is not connected"));
    assert!(h.threads.searches.lock().unwrap().is_empty());

    let stored = h.store.get_campaign(c.id).await.unwrap().unwrap();
    assert_eq!(stored.next_run_at, Some(start_time() + Duration::minutes(30)));
    assert!(stored.active);
}

#[tokio::test]
async fn test_missing_provider_is_a_configuration_error() {
    let h = Harness::new(
        threads_with(vec![result("t1", "a")]),
        FakeGenerator::returning("unused"),
    );
    let account = h.connected_account().await;
    campaign(&h, &account, 5).await;

    let summaries = h.campaign_engine().process_due().await;
    assert!(summaries[0].logs[0].contains("no LLM provider"));
    assert!(h.threads.creates().is_empty());
}

#[tokio::test]
async fn test_search_error_counts_as_no_results() {
    let threads = FakeThreads {
        search_fails: true,
        ..Default::default()
    };
    let h = Harness::new(threads, FakeGenerator::returning("unused"));
    let account = h.connected_account().await;
    h.default_llm().await;
    let c = campaign(&h, &account, 5).await;

    let summaries = h.campaign_engine().process_due().await;
    assert_eq!(summaries[0].published, 0);
    assert!(summaries[0].logs.iter().any(|l| l.starts_with("Search error")));
    assert!(h.generator.calls().is_empty());

    let stored = h.store.get_campaign(c.id).await.unwrap().unwrap();
    assert_eq!(stored.next_run_at, Some(start_time() + Duration::minutes(30)));
}

#[tokio::test]
async fn test_rescheduled_campaign_is_not_due_again() {
    let h = Harness::new(FakeThreads::default(), FakeGenerator::returning("unused"));
    let account = h.connected_account().await;
    h.default_llm().await;
    campaign(&h, &account, 5).await;

    let engine = h.campaign_engine();
    assert_eq!(engine.process_due().await.len(), 1);
    assert!(engine.process_due().await.is_empty());

    h.clock.advance(Duration::minutes(30));
    assert_eq!(engine.process_due().await.len(), 1);
}

#[tokio::test]
async fn test_inactive_campaign_is_skipped() {
    let h = Harness::new(FakeThreads::default(), FakeGenerator::returning("unused"));
    let account = h.connected_account().await;
    h.default_llm().await;
    let c = campaign(&h, &account, 5).await;
    h.store.set_campaign_active(c.id, false).await.unwrap();

    assert!(h.campaign_engine().process_due().await.is_empty());
}

#[tokio::test]
async fn test_niche_falls_back_to_utility_setting() {
    let h = Harness::new(
        threads_with(vec![result("t1", "a")]),
        FakeGenerator::returning("sure"),
    );
    let account = h.connected_account().await;
    h.default_llm().await;
    h.store
        .create_llm_setting(NewLlmSetting {
            user_id: "u1".into(),
            provider: "user_niche".into(),
            model_id: "-".into(),
            api_key: Some("home gardening".into()),
            is_active: true,
            ..Default::default()
        })
        .await
        .unwrap();
    campaign(&h, &account, 5).await;

    h.campaign_engine().process_due().await;

    let (config, request) = &h.generator.calls()[0];
    assert_eq!(config.provider, "openrouter");
    assert!(request.system_prompt.contains("home gardening"));
}

#[tokio::test(start_paused = true)]
async fn test_delay_between_comments_only() {
    let h = Harness::new(
        threads_with(vec![
            result("t1", "a"),
            result("t2", "b"),
            result("t3", "c"),
        ]),
        FakeGenerator::returning("sure"),
    );
    let account = h.connected_account().await;
    h.default_llm().await;
    campaign_with_delays(&h, &account, 5, 30, 60).await;

    let started = tokio::time::Instant::now();
    let summaries = h.campaign_engine().process_due().await;
    let elapsed = started.elapsed();

    let logs = &summaries[0].logs;
    assert_eq!(summaries[0].published, 3);
    // The first target is answered straight away
    assert!(logs[2].starts_with("Commented on"), "{:?}", logs);

    let waits = waits(logs);
    assert_eq!(waits.len(), 2);
    assert!(waits.iter().all(|w| (30..=60).contains(w)), "{:?}", waits);

    let total = std::time::Duration::from_secs(waits.iter().sum());
    assert!(elapsed >= total, "{:?} < {:?}", elapsed, total);
    assert!(elapsed < total + std::time::Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_inverted_delay_range_still_bounds_the_wait() {
    let h = Harness::new(
        threads_with(vec![result("t1", "a"), result("t2", "b")]),
        FakeGenerator::returning("sure"),
    );
    let account = h.connected_account().await;
    h.default_llm().await;
    let mut c = campaign(&h, &account, 5).await;
    c.min_delay_seconds = 50;
    c.max_delay_seconds = 40;

    let summary = h.campaign_engine().execute(c).await;
    assert_eq!(summary.published, 2);

    let waits = waits(&summary.logs);
    assert_eq!(waits.len(), 1);
    assert!((40..=50).contains(&waits[0]), "{:?}", waits);
}

#[tokio::test]
async fn test_manual_run_ignores_schedule() {
    let h = Harness::new(
        threads_with(vec![result("t1", "a")]),
        FakeGenerator::returning("sure"),
    );
    let account = h.connected_account().await;
    h.default_llm().await;
    let c = campaign(&h, &account, 5).await;

    let engine = h.campaign_engine();
    assert_eq!(engine.process_due().await.len(), 1);
    assert!(engine.process_due().await.is_empty());

    let summary = engine.run_now(c.id).await.unwrap();
    assert_eq!(summary.campaign_id, c.id);
    assert_eq!(summary.published, 1);
    assert!(summary.logs.iter().any(|l| l.starts_with("Commented on")));

    let stored = h.store.get_campaign(c.id).await.unwrap().unwrap();
    assert_eq!(stored.total_comments, 2);
    assert_eq!(stored.claimed_at, None);
    assert_eq!(stored.next_run_at, Some(start_time() + Duration::minutes(30)));
}

#[tokio::test]
async fn test_manual_run_refused_when_paused_running_or_missing() {
    let h = Harness::new(threads_with(vec![]), FakeGenerator::returning("sure"));
    let account = h.connected_account().await;
    h.default_llm().await;
    let c = campaign(&h, &account, 5).await;
    let engine = h.campaign_engine();

    h.store
        .claim_campaign(c.id, h.now(), h.now() + Duration::hours(2))
        .await
        .unwrap()
        .unwrap();
    let err = engine.run_now(c.id).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("invalid configuration: campaign {} is already running", c.id)
    );

    h.store.set_campaign_active(c.id, false).await.unwrap();
    let err = engine.run_now(c.id).await.unwrap_err();
    assert!(err.to_string().ends_with("is paused"), "{}", err);

    assert!(engine.run_now(c.id + 100).await.is_err());
    assert!(h.threads.searches.lock().unwrap().is_empty());
}
