//! Probe CRUD against a mock API server.

mod common;

use common::*;
use serde_json::json;
use smapi_lib::model::Label;
use smapi_lib::{Error, Probe};
use wiremock::matchers::{
    any, body_partial_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, ResponseTemplate};

fn probe_42() -> Probe {
    Probe {
        id: 42,
        tenant_id: TENANT_ID,
        name: "probe-42".to_string(),
        latitude: 10.0,
        longitude: -84.0,
        public: false,
        ..Default::default()
    }
}

/// Compare probes ignoring the fields the server assigns.
fn assert_same_probe(want: &Probe, got: &Probe) {
    let strip = |p: &Probe| Probe {
        id: 0,
        tenant_id: 0,
        online_change: 0.0,
        created: 0.0,
        modified: 0.0,
        ..p.clone()
    };
    assert_eq!(strip(want), strip(got));
}

#[tokio::test]
async fn test_add_probe() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/probe/add"))
        .and(header("Authorization", bearer(TENANT_TOKEN).as_str()))
        .and(body_partial_json(json!({"name": "new-probe", "region": "AMER"})))
        .respond_with(ok_json(json!({
            "probe": {
                "id": PROBE_ID,
                "tenantId": TENANT_ID,
                "name": "new-probe",
                "region": "AMER",
                "labels": [{"name": "env", "value": "test"}],
                "onlineChange": 100,
                "created": 101,
                "modified": 102
            },
            "token": PROBE_TOKEN_B64
        })))
        .expect(1)
        .mount(&server)
        .await;

    let c = client(&server, TENANT_TOKEN);
    let probe = Probe {
        name: "new-probe".to_string(),
        region: "AMER".to_string(),
        labels: vec![Label {
            name: "env".to_string(),
            value: "test".to_string(),
        }],
        ..Default::default()
    };
    let (created, token) = c.add_probe(&probe).await.expect("add probe");

    assert_eq!(created.id, PROBE_ID);
    assert_eq!(created.tenant_id, TENANT_ID);
    assert!(created.online_change > 0.0);
    assert!(created.created > 0.0);
    assert!(created.modified > 0.0);
    assert!(created.created_at().is_some());
    assert_same_probe(&probe, &created);
    assert_eq!(token, vec![0x01, 0x02, 0x03, 0x04]);
}

#[tokio::test]
async fn test_update_probe_returns_no_token() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/probe/update"))
        .and(query_param_is_missing("reset-token"))
        .and(body_partial_json(json!({"id": PROBE_ID})))
        .respond_with(ok_json(json!({
            "probe": {
                "id": PROBE_ID,
                "tenantId": TENANT_ID,
                "onlineChange": 100,
                "created": 101,
                "modified": 102
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let c = client(&server, TENANT_TOKEN);
    let probe = Probe {
        id: PROBE_ID,
        ..Default::default()
    };
    let updated = c.update_probe(&probe).await.expect("update probe");

    assert_eq!(updated.id, PROBE_ID);
    assert_eq!(updated.tenant_id, TENANT_ID);
    assert_same_probe(&probe, &updated);
}

#[tokio::test]
async fn test_reset_probe_token() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/probe/update"))
        .and(query_param("reset-token", ""))
        .respond_with(ok_json(json!({
            "probe": {"id": PROBE_ID, "tenantId": TENANT_ID, "created": 101, "modified": 102},
            "token": "ICEiIw=="
        })))
        .expect(1)
        .mount(&server)
        .await;

    let c = client(&server, TENANT_TOKEN);
    let probe = Probe {
        id: PROBE_ID,
        ..Default::default()
    };
    let (updated, token) = c.reset_probe_token(&probe).await.expect("reset token");

    assert_eq!(updated.id, PROBE_ID);
    assert_eq!(token, vec![0x20, 0x21, 0x22, 0x23]);
}

#[tokio::test]
async fn test_reset_probe_token_without_token_in_response() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/probe/update"))
        .respond_with(ok_json(json!({"probe": {"id": PROBE_ID}})))
        .mount(&server)
        .await;

    let c = client(&server, TENANT_TOKEN);
    let err = c
        .reset_probe_token(&Probe {
            id: PROBE_ID,
            ..Default::default()
        })
        .await
        .expect_err("missing token");
    assert!(matches!(err, Error::UnexpectedResponse(_)));
}

#[tokio::test]
async fn test_get_probe() {
    let server = setup_mock_server().await;
    let want = probe_42();
    Mock::given(method("GET"))
        .and(path("/api/v1/probe/42"))
        .respond_with(ok_json(serde_json::to_value(&want).unwrap()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/probe/41"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"msg": "probe 41 not found", "err": "probe not found"})),
        )
        .mount(&server)
        .await;

    let c = client(&server, TENANT_TOKEN);

    let err = c.get_probe(41).await.expect_err("not found");
    assert!(err.is_not_found());
    assert_eq!(
        err.to_string(),
        "probe get request: status=\"404 Not Found\", msg=\"probe 41 not found\", err=\"probe not found\""
    );

    let got = c.get_probe(42).await.expect("get probe");
    assert_eq!(got, want);
}

#[tokio::test]
async fn test_list_probes_keeps_server_order() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/probe/list"))
        .respond_with(ok_json(json!([
            {"id": 43, "tenantId": TENANT_ID, "name": "probe-43", "latitude": 10, "longitude": -84},
            {"id": 42, "tenantId": 1, "name": "probe-42", "latitude": -33, "longitude": 151, "public": true}
        ])))
        .mount(&server)
        .await;

    let c = client(&server, TENANT_TOKEN);
    let probes = c.list_probes().await.expect("list probes");

    let ids: Vec<i64> = probes.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![43, 42]);
    assert!(probes[1].public);
    assert_eq!(probes[1].longitude, 151.0);
}

#[tokio::test]
async fn test_delete_probe() {
    let server = setup_mock_server().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/probe/delete/42"))
        .and(header("Authorization", bearer(TENANT_TOKEN).as_str()))
        .respond_with(ok_json(json!({"msg": "probe deleted", "probeId": 42})))
        .expect(1)
        .mount(&server)
        .await;

    let c = client(&server, TENANT_TOKEN);
    let ack = c.delete_probe(42).await.expect("delete probe");
    assert_eq!(ack.msg, "probe deleted");
    assert_eq!(ack.probe_id, 42);
}

#[tokio::test]
async fn test_probe_calls_without_token_make_no_requests() {
    let server = setup_mock_server().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let c = client(&server, "");
    let probe = probe_42();
    assert!(matches!(c.add_probe(&probe).await, Err(Error::AuthorizationRequired)));
    assert!(matches!(c.update_probe(&probe).await, Err(Error::AuthorizationRequired)));
    assert!(matches!(
        c.reset_probe_token(&probe).await,
        Err(Error::AuthorizationRequired)
    ));
    assert!(matches!(c.get_probe(42).await, Err(Error::AuthorizationRequired)));
    assert!(matches!(c.list_probes().await, Err(Error::AuthorizationRequired)));
    assert!(matches!(c.delete_probe(42).await, Err(Error::AuthorizationRequired)));

    server.verify().await;
}
