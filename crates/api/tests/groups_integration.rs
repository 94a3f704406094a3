//! Integration tests for groups, membership and invitations.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::{id_of, money, setup};
use rust_decimal_macros::dec;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn test_create_and_list_groups() {
    let Some(t) = setup().await else { return };
    let chair = Uuid::new_v4();

    let (status, body) = t
        .post(
            "/api/v1/groups",
            chair,
            json!({
                "name": "Umoja Savers",
                "category": "chama",
                "contribution_amount": "1000",
                "contribution_frequency": "monthly",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["name"], "Umoja Savers");
    assert_eq!(body["data"]["member_count"], 1);
    assert_eq!(money(&body["data"]["total_funds"]), dec!(0));
    assert_eq!(body["data"]["your_membership"]["role"], "chairperson");
    let group = id_of(&body["data"]["id"]);

    let (status, body) = t.get("/api/v1/groups", chair).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let groups = body["data"].as_array().unwrap();
    assert!(groups
        .iter()
        .any(|g| id_of(&g["id"]) == group && g["your_role"] == "chairperson"));

    // The group wallet exists from creation.
    let (status, body) = t.get(&format!("/api/v1/groups/{}/wallet", group), chair).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(money(&body["data"]["balance"]), dec!(0));
}

#[tokio::test]
async fn test_group_detail_is_members_only() {
    let Some(t) = setup().await else { return };
    let group = t.create_group(Uuid::new_v4(), None).await;

    let (status, body) = t.get(&format!("/api/v1/groups/{}", group), Uuid::new_v4()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not_a_member");

    let (status, _) = t
        .get(&format!("/api/v1/groups/{}", Uuid::new_v4()), Uuid::new_v4())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let Some(t) = setup().await else { return };
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/groups")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invitation_accept_adds_member() {
    let Some(t) = setup().await else { return };
    let chair = Uuid::new_v4();
    let invitee = Uuid::new_v4();
    let group = t.create_group(chair, None).await;

    let (status, body) = t
        .post(
            &format!("/api/v1/groups/{}/invitations", group),
            chair,
            json!({ "invitee_user_id": invitee, "role": "treasurer", "message": "Join us" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "pending");
    let invitation = id_of(&body["data"]["id"]);

    // Only the invitee can answer.
    let respond = format!("/api/v1/invitations/{}/respond", invitation);
    let (status, _) = t.post(&respond, Uuid::new_v4(), json!({ "action": "accept" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = t.post(&respond, invitee, json!({ "action": "accept" })).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "accepted");

    let (status, body) = t.get(&format!("/api/v1/groups/{}", group), invitee).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["member_count"], 2);
    assert_eq!(body["data"]["your_membership"]["role"], "treasurer");

    // Answered invitations stay answered.
    let (status, _) = t.post(&respond, invitee, json!({ "action": "decline" })).await;
    assert_ne!(status, StatusCode::OK);

    // Already a member.
    let (status, _) = t
        .post(
            &format!("/api/v1/groups/{}/invitations", group),
            chair,
            json!({ "invitee_user_id": invitee }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_member_cannot_invite() {
    let Some(t) = setup().await else { return };
    let member = Uuid::new_v4();
    let group = t.create_group(Uuid::new_v4(), None).await;
    t.add_member(group, member, "member").await;

    let (status, _) = t
        .post(
            &format!("/api/v1/groups/{}/invitations", group),
            member,
            json!({ "invitee_user_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_last_chairperson_cannot_step_down() {
    let Some(t) = setup().await else { return };
    let chair = Uuid::new_v4();
    let member = Uuid::new_v4();
    let group = t.create_group(chair, None).await;
    t.add_member(group, member, "member").await;

    let (status, body) = t
        .put(
            &format!("/api/v1/groups/{}/members/{}/role", group, chair),
            chair,
            json!({ "role": "member" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    // Promote a second chair; the first may then step down.
    let (status, body) = t
        .put(
            &format!("/api/v1/groups/{}/members/{}/role", group, member),
            chair,
            json!({ "role": "chairperson" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["role"], "chairperson");

    let (status, body) = t
        .put(
            &format!("/api/v1/groups/{}/members/{}/role", group, chair),
            chair,
            json!({ "role": "member" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["role"], "member");
}

#[tokio::test]
async fn test_health_probes() {
    let Some(t) = setup().await else { return };
    for uri in ["/api/health/live", "/api/health/ready", "/api/health"] {
        let response = t
            .app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(!bytes.is_empty() || uri.ends_with("live"));
    }
}
