//! HTTP-level tests for the compute and Octavia REST clients.

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cto_cloudup::error::CloudupError;
use cto_cloudup::providers::gce::{ComputeApi, ComputeForwardingRule, Gce};
use cto_cloudup::providers::openstack::{
    DeleteLoadBalancerOpts, LoadBalancerApi, ListPoolsOpts, Octavia, UpdateMemberOpts,
};

const RULE_PATH: &str = "/projects/p1/regions/us-east1/forwardingRules/api";

fn gce(server: &MockServer) -> Gce {
    Gce::new("test-token").unwrap().with_endpoint(server.uri())
}

fn octavia(server: &MockServer) -> Octavia {
    Octavia::new(server.uri(), "keystone-token").unwrap()
}

// =============================================================================
// Compute
// =============================================================================

#[tokio::test]
async fn test_gce_get_forwarding_rule() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RULE_PATH))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "api",
            "IPAddress": "34.1.2.3",
            "IPProtocol": "TCP",
            "portRange": "443-443",
            "labelFingerprint": "42WmSpB8rSM="
        })))
        .mount(&server)
        .await;

    let rule = gce(&server)
        .get_forwarding_rule("p1", "us-east1", "api")
        .await
        .unwrap();
    assert_eq!(rule.ip_address, "34.1.2.3");
    assert_eq!(rule.port_range, "443-443");
    assert_eq!(rule.label_fingerprint, "42WmSpB8rSM=");
}

#[tokio::test]
async fn test_gce_error_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RULE_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/projects/p1/regions/us-east1/forwardingRules"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let client = gce(&server);
    let err = client
        .get_forwarding_rule("p1", "us-east1", "api")
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = client
        .insert_forwarding_rule("p1", "us-east1", &ComputeForwardingRule::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CloudupError::Auth(_)));
}

#[tokio::test]
async fn test_gce_list_addresses_follows_pages() {
    let server = MockServer::start().await;
    let addresses = "/projects/p1/regions/us-east1/addresses";
    Mock::given(method("GET"))
        .and(path(addresses))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "b", "address": "34.1.2.4"}]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(addresses))
        .and(query_param("filter", "address eq 34.1.2.3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "a", "address": "34.1.2.3"}],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;

    let found = gce(&server)
        .list_addresses("p1", "us-east1", "address eq 34.1.2.3")
        .await
        .unwrap();
    let names: Vec<_> = found.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn test_gce_operation_poll() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/p1/regions/us-east1/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "op-1",
            "status": "DONE",
            "error": {"errors": [{"code": "QUOTA_EXCEEDED", "message": "quota"}]}
        })))
        .mount(&server)
        .await;

    let op = gce(&server)
        .get_region_operation("p1", "us-east1", "op-1")
        .await
        .unwrap();
    assert!(op.is_done());
    assert_eq!(op.error_message().as_deref(), Some("QUOTA_EXCEEDED: quota"));
}

// =============================================================================
// Octavia
// =============================================================================

#[tokio::test]
async fn test_octavia_list_pools_follows_links() {
    let server = MockServer::start().await;
    let next = format!("{}/v2/lbaas/pools?marker=pool-1", server.uri());
    Mock::given(method("GET"))
        .and(path("/v2/lbaas/pools"))
        .and(query_param("marker", "pool-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pools": [{"id": "pool-2", "name": "api"}],
            "pools_links": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/lbaas/pools"))
        .and(query_param("name", "api"))
        .and(header("x-auth-token", "keystone-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pools": [{"id": "pool-1", "name": "api"}],
            "pools_links": [{"rel": "next", "href": next}]
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let pools = octavia(&server)
        .list_pools(&ListPoolsOpts {
            name: Some("api".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    let ids: Vec<_> = pools.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["pool-1", "pool-2"]);
}

#[tokio::test]
async fn test_octavia_update_member_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v2/lbaas/pools/pool-1/members/m1"))
        .and(body_json(json!({"member": {"weight": 0}})))
        .respond_with(ResponseTemplate::new(409).set_body_string("Pool is immutable"))
        .mount(&server)
        .await;

    let err = octavia(&server)
        .update_member(
            "pool-1",
            "m1",
            &UpdateMemberOpts {
                weight: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_octavia_delete_load_balancer() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v2/lbaas/loadbalancers/lb-1"))
        .and(query_param("cascade", "true"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2/lbaas/loadbalancers/lb-2"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let client = octavia(&server);
    client
        .delete_load_balancer("lb-1", DeleteLoadBalancerOpts { cascade: true })
        .await
        .unwrap();
    let err = client
        .delete_load_balancer("lb-2", DeleteLoadBalancerOpts::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_octavia_get_load_balancer_unwraps_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/lbaas/loadbalancers/lb-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "loadbalancer": {
                "id": "lb-1",
                "name": "api",
                "vip_address": "10.0.0.10",
                "provisioning_status": "ACTIVE",
                "created_at": "2024-03-01T12:30:00"
            }
        })))
        .mount(&server)
        .await;

    let lb = octavia(&server).get_load_balancer("lb-1").await.unwrap();
    assert_eq!(lb.vip_address, "10.0.0.10");
    assert!(lb.created_at().is_some());
}
