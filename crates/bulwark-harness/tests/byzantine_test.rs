//! Routers that drop transit floods.
//!
//! A dropping router still authenticates, learns routes, and advertises;
//! it only refuses to relay floods that are not addressed to it.

use std::time::Duration;

use bulwark_harness::{Scenario, Target};

const FLOOD_AT: Duration = Duration::from_secs(3);

#[test]
fn dropping_middle_cuts_a_line() {
    let result = Scenario::new("blackhole line")
        .node("a")
        .dropping_node("m")
        .node("c")
        .link("a", "m")
        .link("m", "c")
        .flood("a", Target::Node("c".into()), FLOOD_AT)
        .oracle(Box::new(|world| {
            assert!(world.delivered("c").is_empty(), "m must not relay");
            // Routing is unaffected.
            assert_eq!(world.next_hop("a", "c").as_deref(), Some("m"));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn honest_path_routes_around_dropper() {
    let result = Scenario::new("blackhole diamond")
        .seed(5)
        .node("a")
        .node("b")
        .dropping_node("m")
        .node("c")
        .link("a", "b")
        .link("a", "m")
        .link("b", "c")
        .link("m", "c")
        .flood("a", Target::Node("c".into()), FLOOD_AT)
        .oracle(Box::new(|world| {
            assert_eq!(world.delivered("c").len(), 1);
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn dropper_still_receives_its_own_floods() {
    let result = Scenario::new("dropper as destination")
        .node("a")
        .dropping_node("m")
        .link("a", "m")
        .flood("a", Target::Node("m".into()), FLOOD_AT)
        .oracle(Box::new(|world| {
            assert_eq!(world.delivered("m").len(), 1);
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}
