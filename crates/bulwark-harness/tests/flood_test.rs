//! Flood delivery across simulated topologies.

use std::time::Duration;

use bulwark_harness::{Scenario, Target};

const FLOOD_AT: Duration = Duration::from_secs(3);

#[test]
fn flood_crosses_a_line() {
    let result = Scenario::new("flood over line")
        .node("a")
        .node("b")
        .node("c")
        .link("a", "b")
        .link("b", "c")
        .flood("a", Target::Node("c".into()), FLOOD_AT)
        .oracle(Box::new(|world| {
            let delivered = world.delivered("c");
            assert_eq!(delivered.len(), 1, "c should receive exactly one flood");
            assert_eq!(Some(delivered[0].source.clone()), world.id("a"));
            assert_eq!(delivered[0].payload, "hello 0");

            assert!(world.delivered("a").is_empty());
            assert!(world.delivered("b").is_empty());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn consecutive_floods_arrive_in_order() {
    let result = Scenario::new("burst over line")
        .seed(9)
        .node("a")
        .node("b")
        .node("c")
        .link("a", "b")
        .link("b", "c")
        .floods("a", Target::Node("c".into()), FLOOD_AT, 3)
        .oracle(Box::new(|world| {
            let payloads: Vec<String> =
                world.delivered("c").into_iter().map(|packet| packet.payload).collect();
            assert_eq!(payloads, vec!["hello 0", "hello 1", "hello 2"]);
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn flood_reaches_attached_host() {
    let result = Scenario::new("flood to host")
        .node("a")
        .node("b")
        .node("c")
        .host("c", "10.9.0.3")
        .link("a", "b")
        .link("b", "c")
        .flood("a", Target::Address("10.9.0.3".into()), FLOOD_AT)
        .oracle(Box::new(|world| {
            let delivered = world.delivered("c");
            assert_eq!(delivered.len(), 1);
            assert_eq!(delivered[0].destination, "10.9.0.3");
            assert!(world.delivered("b").is_empty());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn redundant_paths_deliver_once() {
    let result = Scenario::new("diamond")
        .seed(2)
        .node("a")
        .node("b")
        .node("m")
        .node("c")
        .link("a", "b")
        .link("a", "m")
        .link("b", "c")
        .link("m", "c")
        .flood("a", Target::Node("c".into()), FLOOD_AT)
        .oracle(Box::new(|world| {
            assert_eq!(world.delivered("c").len(), 1, "second copy must be rejected as a replay");
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn flood_to_self_is_delivered_locally() {
    let result = Scenario::new("self flood")
        .node("a")
        .node("b")
        .link("a", "b")
        .flood("a", Target::Node("a".into()), FLOOD_AT)
        .oracle(Box::new(|world| {
            assert_eq!(world.delivered("a").len(), 1);
            assert!(world.delivered("b").is_empty());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}
