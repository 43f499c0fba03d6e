//! End-to-end publishing through the real HTTP adapters against mock servers
//! and an on-disk database.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use spindle_llm::ChatClient;
use spindle_scheduler::{CampaignEngine, JobEngine, SchedulerConfig, SystemClock, WebhookNotifier};
use spindle_store::{
    CommentStatus, JobStatus, NewAccount, NewCampaign, NewJob, NewLlmSetting, PostStatus,
    SqliteStore, Store,
};
use spindle_threads::{ChainPublisher, ThreadsClient};

async fn mount_threads(server: &MockServer) {
    for (text, reply_to, container) in [("first", None, "c1"), ("second", Some("m1"), "c2")] {
        let mut body = json!({"text": text, "media_type": "TEXT"});
        if let Some(reply_to) = reply_to {
            body["reply_to_id"] = json!(reply_to);
        }
        Mock::given(method("POST"))
            .and(path("/1001/threads"))
            .and(body_partial_json(body))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": container})))
            .expect(1)
            .mount(server)
            .await;
    }

    for (container, media) in [("c1", "m1"), ("c2", "m2")] {
        Mock::given(method("POST"))
            .and(path("/1001/threads_publish"))
            .and(body_partial_json(json!({"creation_id": container})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": media})))
            .expect(1)
            .mount(server)
            .await;
    }
}

async fn mount_llm(server: &MockServer) {
    let content = json!({"branches": ["first", "second"]}).to_string();
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "local-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_generated_thread_published_through_http_adapters() {
    let threads_server = MockServer::start().await;
    let llm_server = MockServer::start().await;
    let hook_server = MockServer::start().await;
    mount_threads(&threads_server).await;
    mount_llm(&llm_server).await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&hook_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("spindle.db")).unwrap());

    let account = store
        .create_account(NewAccount {
            user_id: "u1".into(),
            username: "alice".into(),
            access_token: Some("token".into()),
            threads_user_id: Some("1001".into()),
            token_expires_at: None,
        })
        .await
        .unwrap();
    store
        .create_llm_setting(NewLlmSetting {
            user_id: "u1".into(),
            provider: "custom".into(),
            model_id: "local-model".into(),
            base_url: Some(format!("{}/v1", llm_server.uri())),
            is_default: true,
            is_active: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let job = store
        .create_job(NewJob {
            user_id: "u1".into(),
            account_id: account.id,
            topic: Some("sqlite".into()),
            branches: Some(2),
            scheduled_at: Some(Utc::now() - chrono::Duration::minutes(1)),
            ..Default::default()
        })
        .await
        .unwrap();

    let threads = Arc::new(ThreadsClient::new(threads_server.uri()).unwrap());
    let engine = JobEngine::new(
        store.clone(),
        Arc::new(ChatClient::new().unwrap()),
        ChainPublisher::new(threads).with_post_delay(Duration::ZERO),
        Arc::new(WebhookNotifier::new(format!("{}/hook", hook_server.uri())).unwrap()),
        Arc::new(SystemClock),
        SchedulerConfig::default(),
    );

    let reports = engine.process_due().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].published, 2);
    assert_eq!(reports[0].status, JobStatus::Completed);

    let posts = store.list_posts_for_job(job.id).await.unwrap();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|p| p.status == PostStatus::Published));
    assert_eq!(posts[1].parent_remote_id.as_deref(), Some("m1"));

    // Webhook delivery happens on a spawned task
    let mut delivered = Vec::new();
    for _ in 0..50 {
        delivered = hook_server.received_requests().await.unwrap_or_default();
        if !delivered.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(delivered.len(), 1);
    let event: serde_json::Value = serde_json::from_slice(&delivered[0].body).unwrap();
    assert_eq!(event["type"], "publish_success");
    assert_eq!(event["data"]["postCount"], 2);
}

#[tokio::test]
async fn test_job_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("spindle.db");

    let job_id = {
        let store = SqliteStore::open(&db).unwrap();
        let account = store
            .create_account(NewAccount {
                user_id: "u1".into(),
                username: "alice".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .create_job(NewJob {
                user_id: "u1".into(),
                account_id: account.id,
                recurrence: Some("every_2h".into()),
                scheduled_at: Some(Utc::now()),
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    };

    let store = SqliteStore::open(&db).unwrap();
    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Recurring);
    assert_eq!(job.recurrence.as_deref(), Some("every_2h"));
}

#[tokio::test]
async fn test_manual_campaign_run_through_http_adapters() {
    let threads_server = MockServer::start().await;
    let llm_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/threads/search"))
        .and(query_param("q", "sqlite"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "t1", "text": "sqlite in production?", "username": "bob"}]
        })))
        .expect(1)
        .mount(&threads_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1001/threads"))
        .and(body_partial_json(json!({"text": "It holds up well", "reply_to_id": "t1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c1"})))
        .expect(1)
        .mount(&threads_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1001/threads_publish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m1"})))
        .expect(1)
        .mount(&threads_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "It holds up well"}}]
        })))
        .expect(1)
        .mount(&llm_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("spindle.db")).unwrap());
    let account = store
        .create_account(NewAccount {
            user_id: "u1".into(),
            username: "alice".into(),
            access_token: Some("token".into()),
            threads_user_id: Some("1001".into()),
            token_expires_at: None,
        })
        .await
        .unwrap();
    store
        .create_llm_setting(NewLlmSetting {
            user_id: "u1".into(),
            provider: "custom".into(),
            model_id: "local-model".into(),
            base_url: Some(format!("{}/v1", llm_server.uri())),
            is_default: true,
            is_active: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let campaign = store
        .create_campaign(NewCampaign {
            user_id: "u1".into(),
            account_id: account.id,
            target_keywords: "sqlite".into(),
            comment_style: "expert".into(),
            niche: None,
            max_comments_per_run: 3,
            min_delay_seconds: 0,
            max_delay_seconds: 0,
            interval_minutes: 60,
        })
        .await
        .unwrap();

    let engine = CampaignEngine::new(
        store.clone(),
        Arc::new(ChatClient::new().unwrap()),
        Arc::new(ThreadsClient::new(threads_server.uri()).unwrap()),
        Arc::new(SystemClock),
        SchedulerConfig::default(),
    );
    let summary = engine.run_now(campaign.id).await.unwrap();
    assert_eq!(summary.published, 1);
    assert_eq!(summary.failed, 0);

    let logs = store.list_comment_logs(campaign.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, CommentStatus::Published);
    assert_eq!(logs[0].remote_id.as_deref(), Some("m1"));

    let stored = store.get_campaign(campaign.id).await.unwrap().unwrap();
    assert_eq!(stored.total_comments, 1);
    assert!(stored.next_run_at.is_some_and(|next| next > Utc::now()));
}
