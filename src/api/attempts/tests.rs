use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::test_support::{self, DefinitionFixture};

#[tokio::test]
async fn start_answer_submit_and_review_over_http() {
    let Some(ctx) = test_support::setup_test_context().await else { return };
    let catalog = test_support::insert_definition(ctx.state.db(), DefinitionFixture::default()).await;
    let token = test_support::bearer_token("student-1", ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts",
            Some(&token),
            Some(json!({ "test_definition_id": catalog.definition_id })),
        ))
        .await
        .expect("start");
    assert_eq!(response.status(), StatusCode::CREATED);
    let started = test_support::read_json(response).await;
    assert_eq!(started["resumed"], false);
    assert_eq!(started["status"], "started");
    assert_eq!(started["total_questions"], 5);
    let attempt_id = started["id"].as_str().expect("attempt id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts",
            Some(&token),
            Some(json!({ "test_definition_id": catalog.definition_id })),
        ))
        .await
        .expect("resume");
    assert_eq!(response.status(), StatusCode::OK);
    let resumed = test_support::read_json(response).await;
    assert_eq!(resumed["resumed"], true);
    assert_eq!(resumed["id"], attempt_id.as_str());

    let uri = format!(
        "/api/v1/attempts/{attempt_id}/sections/{}/questions",
        catalog.section_ids[0]
    );
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, &uri, Some(&token), None))
        .await
        .expect("section questions");
    assert_eq!(response.status(), StatusCode::OK);
    let section = test_support::read_json(response).await;
    let questions = section["questions"].as_array().expect("questions");
    assert_eq!(questions.len(), 3);
    assert!(questions.iter().all(|question| question.get("right_answer").is_none()));
    assert!(section["remaining_seconds"].as_i64().expect("remaining") > 0);
    let first = questions[0]["id"].as_str().expect("question id").to_string();
    let second = questions[1]["id"].as_str().expect("question id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/attempts/{attempt_id}/questions/{first}/answer"),
            Some(&token),
            Some(json!({ "answer": "A", "time_spent_delta": 12 })),
        ))
        .await
        .expect("answer");
    assert_eq!(response.status(), StatusCode::OK);
    let answered = test_support::read_json(response).await;
    assert_eq!(answered["status"], "attempted");
    assert_eq!(answered["user_answer"], "A");
    assert_eq!(answered["time_spent_seconds"], 12);
    assert!(answered.get("is_correct").is_none());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/attempts/{attempt_id}/questions/{second}/review"),
            Some(&token),
            Some(json!({ "marked_for_review": true })),
        ))
        .await
        .expect("review");
    assert_eq!(response.status(), StatusCode::OK);
    let reviewed = test_support::read_json(response).await;
    assert_eq!(reviewed["is_marked_for_review"], true);
    assert_eq!(reviewed["status"], "unattempted");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/attempts/{attempt_id}/result"),
            Some(&token),
            None,
        ))
        .await
        .expect("result before submit");
    let pending = test_support::read_json(response).await;
    assert!(pending["percentile"].is_null());
    assert!(pending["questions"][0].get("right_answer").is_none());

    let submit_uri = format!("/api/v1/attempts/{attempt_id}/submit");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &submit_uri, Some(&token), None))
        .await
        .expect("submit");
    assert_eq!(response.status(), StatusCode::OK);
    let scored = test_support::read_json(response).await;
    assert_eq!(scored["status"], "completed");
    assert_eq!(scored["attempted_count"], 1);
    assert_eq!(scored["correct_count"], 1);
    assert_eq!(scored["marked_for_review_count"], 1);
    assert_eq!(scored["total_score"], 2.0);
    assert_eq!(scored["max_score"], 10.0);
    assert_eq!(scored["percentage"], 20.0);
    assert_eq!(scored["rank"], 1);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &submit_uri, Some(&token), None))
        .await
        .expect("second submit");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = test_support::read_json(response).await;
    assert_eq!(body["code"], "ALREADY_COMPLETED");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/attempts/{attempt_id}/questions/{second}/answer"),
            Some(&token),
            Some(json!({ "answer": "B" })),
        ))
        .await
        .expect("late answer");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = test_support::read_json(response).await;
    assert_eq!(body["code"], "ATTEMPT_COMPLETED");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/attempts/{attempt_id}/result"),
            Some(&token),
            None,
        ))
        .await
        .expect("result");
    assert_eq!(response.status(), StatusCode::OK);
    let result = test_support::read_json(response).await;
    assert_eq!(result["percentile"], 100.0);
    assert_eq!(result["passed"], false);
    assert_eq!(result["questions"][0]["right_answer"], "A");
    assert_eq!(result["questions"][0]["is_correct"], true);
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/attempts", None, None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn paid_test_without_purchase_returns_403() {
    let Some(ctx) = test_support::setup_test_context().await else { return };
    let catalog = test_support::insert_definition(
        ctx.state.db(),
        DefinitionFixture { is_free: false, ..DefinitionFixture::default() },
    )
    .await;
    let token = test_support::bearer_token("student-2", ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts",
            Some(&token),
            Some(json!({ "test_definition_id": catalog.definition_id })),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = test_support::read_json(response).await;
    assert_eq!(body["code"], "ENTITLEMENT_REQUIRED");
}

#[tokio::test]
async fn invalid_payloads_return_validation_errors() {
    let Some(ctx) = test_support::setup_test_context().await else { return };
    let catalog = test_support::insert_definition(ctx.state.db(), DefinitionFixture::default()).await;
    let token = test_support::bearer_token("student-3", ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts",
            Some(&token),
            Some(json!({ "test_definition_id": "" })),
        ))
        .await
        .expect("empty id");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = test_support::read_json(response).await;
    assert_eq!(body["code"], "VALIDATION");

    let started = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts",
            Some(&token),
            Some(json!({ "test_definition_id": catalog.definition_id })),
        ))
        .await
        .expect("start");
    let started = test_support::read_json(started).await;
    let attempt_id = started["id"].as_str().expect("attempt id");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/attempts/{attempt_id}/sections/{}/timing", catalog.section_ids[0]),
            Some(&token),
            Some(json!({ "time_spent_delta": -5 })),
        ))
        .await
        .expect("negative delta");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn other_users_cannot_read_an_attempt() {
    let Some(ctx) = test_support::setup_test_context().await else { return };
    let catalog = test_support::insert_definition(ctx.state.db(), DefinitionFixture::default()).await;
    let owner = test_support::bearer_token("owner", ctx.state.settings());
    let intruder = test_support::bearer_token("intruder", ctx.state.settings());

    let started = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts",
            Some(&owner),
            Some(json!({ "test_definition_id": catalog.definition_id })),
        ))
        .await
        .expect("start");
    let started = test_support::read_json(started).await;
    let attempt_id = started["id"].as_str().expect("attempt id");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/attempts/{attempt_id}"),
            Some(&intruder),
            None,
        ))
        .await
        .expect("overview");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/attempts/{attempt_id}"),
            Some(&owner),
            None,
        ))
        .await
        .expect("overview");
    assert_eq!(response.status(), StatusCode::OK);
    let overview = test_support::read_json(response).await;
    let sections = overview["sections"].as_array().expect("sections");
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0]["title"], "Section 1");
    assert_eq!(sections[0]["unvisited"], 3);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/attempts?limit=10",
            Some(&intruder),
            None,
        ))
        .await
        .expect("history");
    let history = test_support::read_json(response).await;
    assert_eq!(history["total_count"], 0);
    assert_eq!(history["limit"], 10);
}
