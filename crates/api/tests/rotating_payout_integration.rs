//! Integration tests for rotating payout cycles.

mod common;

use axum::http::StatusCode;
use chrono::{DateTime, Months, Utc};
use common::{id_of, rotating_contribution, setup};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn test_full_round_pays_recipient_and_advances() {
    let Some(t) = setup().await else { return };
    let c = t.rotating_cycle::<3>().await;
    let [u1, u2, u3] = c.users;
    let uri = format!("/api/v1/groups/{}/contributions", c.group);

    let (_, before) = t.get(&format!("/api/v1/cycles/{}", c.id), u1).await;
    let start: DateTime<Utc> =
        serde_json::from_value(before["data"]["start_date"].clone()).unwrap();

    let (status, body) = t.post(&uri, u2, rotating_contribution()).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["round"]["outcome"], "round_in_progress");

    let (status, body) = t.post(&uri, u3, rotating_contribution()).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["round"]["outcome"], "advanced");
    assert_eq!(body["data"]["round"]["round"], 2);

    assert_eq!(t.balance(u1, "personal").await, dec!(1000));
    assert_eq!(t.balance(u2, "personal").await, dec!(1500));
    assert_eq!(t.balance(c.group, "group").await, dec!(0));
    assert_eq!(t.group_entries(c.group, "contribution").await, 2);
    assert_eq!(t.unbalanced_wallets(&[u1, u2, u3]).await, 0);

    let (_, after) = t.get(&format!("/api/v1/cycles/{}", c.id), u1).await;
    assert_eq!(after["data"]["current_round"], 2);
    assert_eq!(id_of(&after["data"]["current_recipient"]), u2);
    let next_payout: DateTime<Utc> =
        serde_json::from_value(after["data"]["next_payout_date"].clone()).unwrap();
    assert_eq!(next_payout, start + Months::new(2));

    // Round 2 now: u2 is the recipient and cannot pay into their own round.
    let (status, _) = t.post(&uri, u2, rotating_contribution()).await;
    assert_ne!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_duplicate_round_contribution_rejected() {
    let Some(t) = setup().await else { return };
    let c = t.rotating_cycle::<3>().await;
    let [_, u2, _] = c.users;
    let uri = format!("/api/v1/groups/{}/contributions", c.group);

    let (status, _) = t.post(&uri, u2, rotating_contribution()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = t.post(&uri, u2, rotating_contribution()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "duplicate_round_contribution");
    assert_eq!(t.balance(u2, "personal").await, dec!(1500));
}

#[tokio::test]
async fn test_rotating_amount_must_match_round() {
    let Some(t) = setup().await else { return };
    let c = t.rotating_cycle::<3>().await;

    let (status, body) = t
        .post(
            &format!("/api/v1/groups/{}/contributions", c.group),
            c.users[1],
            json!({ "amount": "450", "type": "rotating_payout", "payment_method": "internal_wallet" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(body["error"], "amount_mismatch");
}

#[tokio::test]
async fn test_advance_without_contributions_is_noop() {
    let Some(t) = setup().await else { return };
    let c = t.rotating_cycle::<3>().await;
    let advance = format!("/api/v1/cycles/{}/advance", c.id);

    for _ in 0..2 {
        let (status, body) = t.post(&advance, c.users[0], json!({})).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["outcome"], "round_in_progress");
        assert_eq!(body["data"]["round"], 1);
    }
}
