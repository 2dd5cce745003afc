//! End-to-end batch flows against mocked vendor endpoints

use shelfmark_core::{BackendStatus, BatchBackend, BatchRequest, SubRequestOutcome};
use shelfmark_llm::{AnthropicBatchBackend, OpenAIBatchBackend};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn requests() -> Vec<BatchRequest> {
    (0..3)
        .map(|i| BatchRequest::new(format!("taxonomy-{i}"), format!("Classify product {i}"), 256))
        .collect()
}

fn anthropic_message(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "msg",
        "type": "message",
        "model": "claude-test",
        "content": [{"type": "text", "text": text}],
        "usage": {"input_tokens": 5, "output_tokens": 2}
    })
}

#[tokio::test]
async fn anthropic_batch_submit_poll_results() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages/batches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msgbatch_1",
            "processing_status": "in_progress",
            "request_counts": {"processing": 3, "succeeded": 0, "errored": 0, "canceled": 0, "expired": 0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/messages/batches/msgbatch_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msgbatch_1",
            "processing_status": "ended",
            "request_counts": {"processing": 0, "succeeded": 2, "errored": 1, "canceled": 0, "expired": 0}
        })))
        .mount(&server)
        .await;

    // Results deliberately out of submission order
    let jsonl = [
        serde_json::json!({"custom_id": "taxonomy-2", "result": {"type": "succeeded", "message": anthropic_message("two")}}),
        serde_json::json!({"custom_id": "taxonomy-1", "result": {"type": "errored", "error": {"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}}}),
        serde_json::json!({"custom_id": "taxonomy-0", "result": {"type": "succeeded", "message": anthropic_message("zero")}}),
    ]
    .iter()
    .map(|v| v.to_string())
    .collect::<Vec<_>>()
    .join("\n");

    Mock::given(method("GET"))
        .and(path("/messages/batches/msgbatch_1/results"))
        .respond_with(ResponseTemplate::new(200).set_body_string(jsonl))
        .mount(&server)
        .await;

    let backend = AnthropicBatchBackend::new("key".into(), Some(server.uri()), "claude-test".into(), 5);

    let job_id = backend.submit(&requests()).await.unwrap();
    assert_eq!(job_id, "msgbatch_1");

    let snapshot = backend.poll(&job_id).await.unwrap();
    assert_eq!(snapshot.status, BackendStatus::Ended);
    assert_eq!(snapshot.counts.errored, 1);

    let results = backend.results(&job_id).await.unwrap();
    let find = |id: &str| {
        results
            .iter()
            .find(|item| item.correlation_id == id)
            .map(|item| item.outcome.clone())
    };
    match find("taxonomy-0") {
        Some(SubRequestOutcome::Succeeded(c)) => assert_eq!(c.text, "zero"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(find("taxonomy-1"), Some(SubRequestOutcome::Errored("Overloaded".into())));
}

#[tokio::test]
async fn openai_batch_reads_output_and_error_files() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "file-in", "object": "file", "purpose": "batch"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/batches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "batch_1", "status": "validating"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/batches/batch_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "batch_1",
            "status": "completed",
            "request_counts": {"total": 3, "completed": 2, "failed": 1},
            "output_file_id": "file-out",
            "error_file_id": "file-err"
        })))
        .mount(&server)
        .await;

    let chat = |text: &str| {
        serde_json::json!({
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1}
        })
    };
    let output = [
        serde_json::json!({"custom_id": "taxonomy-1", "response": {"status_code": 200, "body": chat("one")}, "error": null}),
        serde_json::json!({"custom_id": "taxonomy-0", "response": {"status_code": 200, "body": chat("zero")}, "error": null}),
    ]
    .iter()
    .map(|v| v.to_string())
    .collect::<Vec<_>>()
    .join("\n");
    let errors = serde_json::json!({
        "custom_id": "taxonomy-2",
        "response": null,
        "error": {"code": "server_error", "message": "internal"}
    })
    .to_string();

    Mock::given(method("GET"))
        .and(path("/files/file-out/content"))
        .respond_with(ResponseTemplate::new(200).set_body_string(output))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/file-err/content"))
        .respond_with(ResponseTemplate::new(200).set_body_string(errors))
        .mount(&server)
        .await;

    let backend =
        OpenAIBatchBackend::new("key".into(), Some(server.uri()), "gpt-4o".into(), "24h".into(), 5);

    let job_id = backend.submit(&requests()).await.unwrap();
    assert_eq!(job_id, "batch_1");
    assert_eq!(backend.poll(&job_id).await.unwrap().status, BackendStatus::Ended);

    let results = backend.results(&job_id).await.unwrap();
    assert_eq!(results.len(), 3);
    let errored = results
        .iter()
        .find(|item| item.correlation_id == "taxonomy-2")
        .unwrap();
    assert_eq!(errored.outcome, SubRequestOutcome::Errored("internal".into()));
}

#[tokio::test]
async fn openai_failed_batch_reports_failed_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/batches/batch_x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "batch_x", "status": "expired"
        })))
        .mount(&server)
        .await;

    let backend =
        OpenAIBatchBackend::new("key".into(), Some(server.uri()), "gpt-4o".into(), "24h".into(), 5);
    let snapshot = backend.poll("batch_x").await.unwrap();
    assert!(matches!(snapshot.status, BackendStatus::Failed(_)));
}

#[tokio::test]
async fn anthropic_unreadable_result_line_fails_only_its_request() {
    let server = MockServer::start().await;

    let jsonl = [
        serde_json::json!({"custom_id": "taxonomy-0", "result": {"type": "succeeded", "message": anthropic_message("zero")}}),
        serde_json::json!({"custom_id": "taxonomy-1", "result": {"type": "refused"}}),
        serde_json::json!({"result": {"type": "succeeded", "message": anthropic_message("orphan")}}),
        serde_json::json!({"custom_id": "taxonomy-2", "result": {"type": "succeeded", "message": anthropic_message("two")}}),
    ]
    .iter()
    .map(|v| v.to_string())
    .collect::<Vec<_>>()
    .join("\n");

    Mock::given(method("GET"))
        .and(path("/messages/batches/msgbatch_2/results"))
        .respond_with(ResponseTemplate::new(200).set_body_string(jsonl))
        .mount(&server)
        .await;

    let backend = AnthropicBatchBackend::new("key".into(), Some(server.uri()), "claude-test".into(), 5);
    let results = backend.results("msgbatch_2").await.unwrap();

    assert_eq!(results.len(), 3);
    match &results[0].outcome {
        SubRequestOutcome::Succeeded(c) => assert_eq!(c.text, "zero"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(results[1].correlation_id, "taxonomy-1");
    match &results[1].outcome {
        SubRequestOutcome::Errored(message) => assert!(message.contains("refused"), "{message}"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(results[2].correlation_id, "taxonomy-2");
    assert!(matches!(results[2].outcome, SubRequestOutcome::Succeeded(_)));
}

#[tokio::test]
async fn openai_unreadable_output_line_fails_only_its_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/batches/batch_2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "batch_2",
            "status": "completed",
            "output_file_id": "file-out"
        })))
        .mount(&server)
        .await;

    let output = [
        serde_json::json!({"custom_id": "taxonomy-0", "response": {"status_code": "ok", "body": {}}}),
        serde_json::json!({"custom_id": "taxonomy-1", "response": {"status_code": 200, "body": {
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "one"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1}
        }}}),
    ]
    .iter()
    .map(|v| v.to_string())
    .collect::<Vec<_>>()
    .join("\n");

    Mock::given(method("GET"))
        .and(path("/files/file-out/content"))
        .respond_with(ResponseTemplate::new(200).set_body_string(output))
        .mount(&server)
        .await;

    let backend =
        OpenAIBatchBackend::new("key".into(), Some(server.uri()), "gpt-4o".into(), "24h".into(), 5);
    let results = backend.results("batch_2").await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].correlation_id, "taxonomy-0");
    assert!(matches!(results[0].outcome, SubRequestOutcome::Errored(_)));
    match &results[1].outcome {
        SubRequestOutcome::Succeeded(c) => assert_eq!(c.text, "one"),
        other => panic!("unexpected outcome {other:?}"),
    }
}
