//! Route convergence over simulated TCP.
//!
//! Routers learn their neighbors from the pushed MASTERCONFIG and everything
//! further away from periodic split-horizon advertisements.

use bulwark_harness::Scenario;

#[test]
fn line_converges_through_middle() {
    let result = Scenario::new("line of three")
        .node("a")
        .node("b")
        .node("c")
        .link("a", "b")
        .link("b", "c")
        .oracle(Box::new(|world| {
            assert_eq!(world.next_hop("a", "c").as_deref(), Some("b"));
            assert_eq!(world.next_hop("c", "a").as_deref(), Some("b"));
            assert_eq!(world.next_hop("a", "b").as_deref(), Some("b"));
            assert_eq!(world.next_hop("b", "c").as_deref(), Some("c"));
            assert_eq!(world.neighbors("b"), vec!["a".to_string(), "c".to_string()]);
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn routes_propagate_hop_by_hop() {
    let result = Scenario::new("line of four")
        .seed(4)
        .node("a")
        .node("b")
        .node("c")
        .node("d")
        .link("a", "b")
        .link("b", "c")
        .link("c", "d")
        .oracle(Box::new(|world| {
            assert_eq!(world.next_hop("a", "d").as_deref(), Some("b"));
            assert_eq!(world.next_hop("b", "d").as_deref(), Some("c"));
            assert_eq!(world.next_hop("d", "a").as_deref(), Some("c"));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn no_router_routes_to_itself() {
    let result = Scenario::new("triangle")
        .seed(3)
        .node("a")
        .node("b")
        .node("c")
        .link("a", "b")
        .link("b", "c")
        .link("c", "a")
        .oracle(Box::new(|world| {
            for name in world.node_names() {
                if world.knows(&name, &name) {
                    return Err(format!("{name} has a route to itself"));
                }
            }
            // Direct links are never overridden by advertisements.
            assert_eq!(world.next_hop("a", "c").as_deref(), Some("c"));
            assert_eq!(world.next_hop("b", "a").as_deref(), Some("a"));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn isolated_router_learns_nothing() {
    let result = Scenario::new("island")
        .node("a")
        .node("b")
        .node("island")
        .link("a", "b")
        .oracle(Box::new(|world| {
            assert!(!world.knows("a", "island"));
            assert!(!world.knows("island", "a"));
            assert!(world.neighbors("island").is_empty());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}
