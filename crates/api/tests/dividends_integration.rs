//! Integration tests for share holdings and dividend distribution.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{id_of, money, setup, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

struct Shareholders {
    group: Uuid,
    chair: Uuid,
    members: [Uuid; 3],
}

async fn shareholders(t: &TestApp, shares: [i64; 3]) -> Shareholders {
    let chair = Uuid::new_v4();
    let members = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    let group = t.create_group(chair, None).await;

    for (member, count) in members.iter().zip(shares) {
        t.add_member(group, *member, "member").await;
        let (status, body) = t
            .put(
                &format!("/api/v1/groups/{}/shares/{}", group, member),
                chair,
                json!({ "shares_owned": count }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["shares_owned"], count);
    }

    Shareholders {
        group,
        chair,
        members,
    }
}

async fn declare(t: &TestApp, s: &Shareholders, body: Value) -> (StatusCode, Value) {
    t.post(&format!("/api/v1/groups/{}/dividends", s.group), s.chair, body)
        .await
}

fn payment_date() -> String {
    (Utc::now() + Duration::days(14)).to_rfc3339()
}

/// Payment amounts keyed by member, in `members` order.
fn amounts_by_member(payments: &Value, members: &[Uuid; 3]) -> Vec<Decimal> {
    let payments = payments.as_array().unwrap();
    members
        .iter()
        .map(|m| {
            payments
                .iter()
                .find(|p| id_of(&p["member_id"]) == *m)
                .map(|p| money(&p["amount"]))
                .unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_dividend_approve_and_process() {
    let Some(t) = setup().await else { return };
    let s = shareholders(&t, [100, 50, 200]).await;
    t.fund(s.group, "group", dec!(4000)).await;

    let (status, body) = declare(
        &t,
        &s,
        json!({ "per_share_amount": "10", "payment_date": payment_date() }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "draft");
    assert_eq!(money(&body["data"]["total_amount"]), dec!(3500));
    let declaration = id_of(&body["data"]["id"]);

    // Approving twice leaves exactly one payment per holder.
    for _ in 0..2 {
        let (status, body) = t
            .post(
                &format!("/api/v1/dividends/{}/approve", declaration),
                s.chair,
                json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "approved");
    }

    let payments_uri = format!("/api/v1/dividends/{}/payments", declaration);
    let (status, body) = t.get(&payments_uri, s.members[0]).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    assert_eq!(
        amounts_by_member(&body["data"], &s.members),
        vec![dec!(1000), dec!(500), dec!(2000)]
    );

    let process = format!("/api/v1/dividends/{}/process", declaration);
    let (status, body) = t.post(&process, s.chair, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["payments_paid"], 3);
    assert_eq!(money(&body["data"]["amount_paid"]), dec!(3500));
    assert_eq!(body["data"]["declaration"]["status"], "paid");

    assert_eq!(t.balance(s.group, "group").await, dec!(500));
    assert_eq!(t.balance(s.members[0], "personal").await, dec!(1000));
    assert_eq!(t.balance(s.members[1], "personal").await, dec!(500));
    assert_eq!(t.balance(s.members[2], "personal").await, dec!(2000));
    assert_eq!(t.group_entries(s.group, "transfer").await, 3);

    let mut owners = s.members.to_vec();
    owners.push(s.group);
    assert_eq!(t.unbalanced_wallets(&owners).await, 0);

    let (_, body) = t.get(&payments_uri, s.members[0]).await;
    for payment in body["data"].as_array().unwrap() {
        assert_eq!(payment["status"], "paid");
        assert!(!payment["transaction_id"].is_null());
    }

    // Processing a paid declaration moves nothing.
    let (status, body) = t.post(&process, s.chair, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["payments_paid"], 0);
    assert_eq!(t.balance(s.group, "group").await, dec!(500));
    assert_eq!(t.group_entries(s.group, "transfer").await, 3);
}

#[tokio::test]
async fn test_processing_aborts_when_group_short() {
    let Some(t) = setup().await else { return };
    let s = shareholders(&t, [100, 50, 200]).await;
    t.fund(s.group, "group", dec!(1200)).await;

    let (_, body) = declare(
        &t,
        &s,
        json!({ "per_share_amount": "10", "payment_date": payment_date() }),
    )
    .await;
    let declaration = id_of(&body["data"]["id"]);
    t.post(
        &format!("/api/v1/dividends/{}/approve", declaration),
        s.chair,
        json!({}),
    )
    .await;

    let (status, body) = t
        .post(
            &format!("/api/v1/dividends/{}/process", declaration),
            s.chair,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
    assert_eq!(body["error"], "insufficient_group_funds");

    assert_eq!(t.balance(s.group, "group").await, dec!(1200));
    assert_eq!(t.group_entries(s.group, "transfer").await, 0);
    let (_, body) = t
        .get(&format!("/api/v1/dividends/{}/payments", declaration), s.chair)
        .await;
    for payment in body["data"].as_array().unwrap() {
        assert_eq!(payment["status"], "pending");
    }
}

#[tokio::test]
async fn test_declare_from_total_rounds_down_per_share() {
    let Some(t) = setup().await else { return };
    let s = shareholders(&t, [1, 1, 1]).await;

    let (status, body) = declare(
        &t,
        &s,
        json!({ "total_amount": "100", "payment_date": payment_date() }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(money(&body["data"]["per_share_amount"]), dec!(33.33));
    assert_eq!(money(&body["data"]["total_amount"]), dec!(99.99));

    let (status, _) = declare(
        &t,
        &s,
        json!({ "total_amount": "100", "per_share_amount": "10", "payment_date": payment_date() }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_officers_manage_dividends() {
    let Some(t) = setup().await else { return };
    let s = shareholders(&t, [10, 10, 10]).await;
    let member = s.members[0];

    let (status, _) = t
        .put(
            &format!("/api/v1/groups/{}/shares/{}", s.group, member),
            member,
            json!({ "shares_owned": 1000 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .post(
            &format!("/api/v1/groups/{}/dividends", s.group),
            member,
            json!({ "per_share_amount": "10", "payment_date": payment_date() }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
