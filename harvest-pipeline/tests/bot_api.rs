use harvest_config::BotApiConfig;
use harvest_http::RetryPolicy;
use harvest_pipeline::{
    AuthorRegistry, AuthorUpdate, BotApiClient, PipelineError, PublishOutcome, PublishRequest,
    Publisher,
};
use harvest_social::twitter::PostId;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> BotApiClient {
    let cfg = BotApiConfig {
        base_url: server.uri(),
        api_key: "bot-secret".into(),
        timeout_secs: 5,
    };
    BotApiClient::new(&cfg, RetryPolicy::new(3, Duration::ZERO, Duration::ZERO)).unwrap()
}

fn request() -> PublishRequest {
    PublishRequest {
        title: "Neon fox".into(),
        body_text: "a neon fox --ar 2:3".into(),
        media_urls: vec!["https://pbs.twimg.com/media/a?format=jpg&name=large".into()],
        author_handle: "artist".into(),
        negative_text: None,
        model: Some("midjourney-v6".into()),
        description: Some("Source: https://twitter.com/artist/status/1".into()),
    }
}

#[tokio::test]
async fn lists_creators_with_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bot/creators"))
        .and(header("x-api-key", "bot-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "creators": [
                { "id": "c-1", "username": "artist", "display_name": "Artist", "last_tweet_id": "1790" },
                { "id": "c-2", "username": "newbie", "display_name": null, "last_tweet_id": null }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let authors = client(&server).list_authors().await.unwrap();
    assert_eq!(authors.len(), 2);
    assert_eq!(authors[0].handle, "artist");
    assert_eq!(authors[0].last_seen_id, Some(PostId::from("1790")));
    assert_eq!(authors[1].last_seen_id, None);
}

#[tokio::test]
async fn patches_creator_status() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/bot/creators"))
        .and(body_json(json!({
            "creator_id": "c-1",
            "last_tweet_id": "1800",
            "increment_fetch": true,
            "increment_success": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let update = AuthorUpdate {
        author_id: "c-1".into(),
        last_seen_id: Some(PostId::from("1800")),
        increment_fetch: true,
        increment_success: false,
    };
    client(&server).update_author(&update).await.unwrap();
}

#[tokio::test]
async fn patch_failure_is_a_registry_error_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/bot/creators"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "db down" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .update_author(&AuthorUpdate::success("c-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Registry(_)));
}

#[tokio::test]
async fn publish_maps_created_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bot/prompts"))
        .and(header("x-api-key", "bot-secret"))
        .and(body_partial_json(json!({
            "title": "Neon fox",
            "prompt_text": "a neon fox --ar 2:3",
            "author_name": "artist",
            "source": "twitter",
            "is_published": true,
            "is_featured": false,
            "model": "midjourney-v6"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "prompt": { "id": "p-9", "title": "Neon fox" },
            "images_count": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = client(&server).publish(&request()).await.unwrap();
    assert_eq!(
        out,
        PublishOutcome::Created {
            id: "p-9".into(),
            images_count: 1,
            failed_urls: vec![]
        }
    );
}

#[tokio::test]
async fn publish_reads_rejection_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bot/prompts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "error": "All images failed to process",
            "failed_urls": ["https://pbs.twimg.com/media/a?format=jpg&name=large"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = client(&server).publish(&request()).await.unwrap();
    match out {
        PublishOutcome::Rejected { error, failed_urls } => {
            assert!(error.contains("All images failed"));
            assert_eq!(failed_urls.len(), 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn publish_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bot/prompts"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/bot/prompts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "skipped": true,
            "reason": "duplicate"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = client(&server).publish(&request()).await.unwrap();
    assert_eq!(
        out,
        PublishOutcome::Duplicate {
            reason: "duplicate".into()
        }
    );
}

#[tokio::test]
async fn publish_gives_up_after_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bot/prompts"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server).publish(&request()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Publish(_)));
    assert!(err.to_string().contains("3 attempt"));
}
