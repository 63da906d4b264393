//! Session establishment and analytics operations end to end.

mod common;

use common::{payload, Harness, TOKEN, ZONE};
use serde_json::json;

#[tokio::test]
async fn test_identity_validated_once_per_session() {
    let h = Harness::start().await;
    for _ in 0..3 {
        let result = h.call("list_custom_rules", json!({"zoneId": ZONE})).await;
        assert!(!result.is_error);
    }
    let validations = h
        .requests()
        .await
        .iter()
        .filter(|r| *r == "GET /user")
        .count();
    assert_eq!(validations, 1);
    assert_eq!(h.host.session_count().await, 1);
}

#[tokio::test]
async fn test_missing_or_rejected_credential_requires_authentication() {
    let h = Harness::start().await;

    let anonymous = h
        .host
        .dispatch(&h.registry, None, "list_accounts", json!({}))
        .await;
    assert!(anonymous.is_error);
    assert!(anonymous.joined_text().starts_with("AuthenticationRequired"));

    let rejected = h
        .host
        .dispatch(&h.registry, Some("wrong-token"), "list_accounts", json!({}))
        .await;
    assert!(rejected.is_error);
    let text = rejected.joined_text();
    assert!(text.starts_with("AuthenticationRequired"));
    assert!(!text.contains("wrong-token"));
    assert_eq!(h.host.session_count().await, 0);
}

#[tokio::test]
async fn test_ended_session_revalidates() {
    let h = Harness::start().await;
    assert!(!h.call("list_custom_rules", json!({"zoneId": ZONE})).await.is_error);
    assert!(h.host.end(TOKEN).await);
    assert!(!h.call("list_custom_rules", json!({"zoneId": ZONE})).await.is_error);
    let validations = h
        .requests()
        .await
        .iter()
        .filter(|r| *r == "GET /user")
        .count();
    assert_eq!(validations, 2);
}

#[tokio::test]
async fn test_attack_summary_for_quiet_zone_is_empty() {
    let h = Harness::start().await;
    h.provider
        .set_graphql_data(json!({"viewer": {"zones": [{"byAction": [], "bySource": [], "byCountry": []}]}}));
    let result = h.call("get_attack_summary", json!({"zoneId": ZONE})).await;
    assert!(!result.is_error, "{}", result.joined_text());
    assert_eq!(
        payload(&result)["summary"],
        json!({"byAction": [], "bySource": [], "byCountry": []})
    );
}

#[tokio::test]
async fn test_attack_summary_window_spans_requested_minutes() {
    let h = Harness::start().await;
    let result = h.call("get_attack_summary", json!({"zoneId": ZONE, "minutes": 60})).await;
    let window = &payload(&result)["window"];
    let start: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(window["startTime"].clone()).unwrap();
    let end: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(window["endTime"].clone()).unwrap();
    assert_eq!((end - start).num_seconds(), 3600);
    assert!((chrono::Utc::now() - end).num_seconds().abs() <= 1);
}

#[tokio::test]
async fn test_security_events_most_recent_first() {
    let h = Harness::start().await;
    h.provider.set_graphql_data(json!({"viewer": {"zones": [{"firewallEventsAdaptive": [
        {"action": "block", "clientIP": "192.0.2.1", "clientRequestPath": "/a", "datetime": "2024-05-01T11:00:00Z"},
        {"action": "block", "clientIP": "192.0.2.2", "clientRequestPath": "/b", "datetime": "2024-05-01T11:30:00Z"}
    ]}]}}));
    let result = h
        .call("get_security_events", json!({"zoneId": ZONE, "limit": 1}))
        .await;
    assert!(!result.is_error, "{}", result.joined_text());
    let events = payload(&result);
    assert_eq!(events.as_array().unwrap().len(), 1);
    assert_eq!(events[0]["datetime"], "2024-05-01T11:30:00Z");
}

#[tokio::test]
async fn test_suggestion_without_hostile_traffic() {
    let h = Harness::start().await;
    let result = h
        .call("suggest_rule_from_events", json!({"zoneId": ZONE}))
        .await;
    assert!(!result.is_error);
    assert!(result.joined_text().starts_with("No suggestion"));
    assert!(h.provider.ruleset_count() == 0);
}

#[tokio::test]
async fn test_suggestion_proposes_without_creating() {
    let h = Harness::start().await;
    let events: Vec<_> = (0..4)
        .map(|i| {
            json!({
                "action": "block",
                "clientIP": "203.0.113.9",
                "clientAsn": "64496",
                "clientRequestPath": "/xmlrpc.php",
                "datetime": format!("2024-05-01T11:0{i}:00Z"),
            })
        })
        .collect();
    h.provider
        .set_graphql_data(json!({"viewer": {"zones": [{"firewallEventsAdaptive": events}]}}));

    let result = h
        .call("suggest_rule_from_events", json!({"zoneId": ZONE, "actionType": "challenge"}))
        .await;
    assert!(!result.is_error, "{}", result.joined_text());
    let suggestion = payload(&result);
    assert_eq!(suggestion["action"], "challenge");
    let expression = suggestion["expression"].as_str().unwrap();
    assert!(expression.contains("ip.src in {203.0.113.9}"));
    assert!(expression.contains("\"/xmlrpc.php\""));
    assert_eq!(h.provider.ruleset_count(), 0);
}
