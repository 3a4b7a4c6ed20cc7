//! Serialized forms exposed to management tooling.

use std::net::SocketAddr;

use serde_json::json;
use vortex_balancer::{BalancerConfig, ControllerState, WeightedSelector};

#[test]
fn endpoint_stats_serialize_for_the_admin_api() {
    let selector = WeightedSelector::new(BalancerConfig::default()).unwrap();
    selector
        .add_endpoint("api-1", SocketAddr::from(([127, 0, 0, 1], 7000)), 3)
        .unwrap();

    let value = serde_json::to_value(selector.snapshot()).unwrap();
    assert_eq!(
        value,
        json!([{
            "id": "api-1",
            "address": "127.0.0.1:7000",
            "base_weight": 3,
            "effective_weight": 3,
            "failure_rate": 0.0,
            "is_meter_ready": false,
        }])
    );
}

#[test]
fn controller_state_serializes_by_name() {
    assert_eq!(
        serde_json::to_value(ControllerState::Rollback).unwrap(),
        json!("Rollback")
    );
}

#[test]
fn config_round_trips_through_json() {
    let config = BalancerConfig {
        max_weight: 512,
        ..Default::default()
    };
    let text = serde_json::to_string(&config).unwrap();
    let back: BalancerConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(back, config);
}
