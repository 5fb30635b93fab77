use super::*;
use pretty_assertions::assert_eq;

use hub_ir::Modifiers;

use crate::testing::Fixture;

fn ids(raw: &[u32]) -> Vec<ArtifactId> {
    raw.iter().copied().map(ArtifactId).collect()
}

#[test]
fn records_are_indexed_once_per_context() {
    let tracker = DependencyTracker::new();
    let a = TypeId::from_raw(1);
    let b = TypeId::from_raw(2);
    let batch = AssumptionBatch::new()
        .unique_concrete_subtype(a, TypeId::from_raw(3))
        .unique_concrete_subtype(b, TypeId::from_raw(4))
        .unique_concrete_subtype(a, TypeId::from_raw(3));

    let first = tracker.register(&batch);
    let second = tracker.register(&AssumptionBatch::new().unique_concrete_subtype(b, b));

    assert_eq!(first.id(), ArtifactId(0));
    assert_eq!(tracker.dependents_of(a), ids(&[0]));
    assert_eq!(tracker.dependents_of(b), ids(&[0, 1]));
    assert_eq!(
        tracker.stats(),
        DependencyStats {
            live_records: 2,
            types_with_dependents: 2,
            dependency_edges: 3,
            max_dependents_per_type: 2,
            validated: 2,
            rejected: 0,
            invalidated: 0,
        }
    );
    drop(second);
}

#[test]
fn discard_unindexes_and_recycles_the_id() {
    let tracker = DependencyTracker::new();
    let ctx = TypeId::from_raw(5);
    let batch = AssumptionBatch::new().unique_concrete_subtype(ctx, ctx);

    let first = tracker.register(&batch);
    let second = tracker.register(&batch);
    tracker.discard(first);

    assert_eq!(tracker.dependents_of(ctx), [second.id()]);
    let third = tracker.register(&batch);
    assert_eq!(third.id(), ArtifactId(0));

    tracker.discard(second);
    tracker.discard(third);
    assert_eq!(tracker.stats().types_with_dependents, 0);
    assert_eq!(tracker.stats().live_records, 0);
}

#[test]
fn attach_refuses_invalidated_records() {
    let tracker = DependencyTracker::new();
    let ctx = TypeId::from_raw(1);
    let token = tracker.register(&AssumptionBatch::new().unique_concrete_subtype(ctx, ctx));

    assert_eq!(tracker.attach(&token, ArtifactHandle(7)), Installation::Installed);
    assert_eq!(token.record.artifact(), Some(ArtifactHandle(7)));

    tracker.retire(&token.record);
    assert!(!token.is_valid());
    assert_eq!(tracker.attach(&token, ArtifactHandle(8)), Installation::Rejected);
    // Retiring twice is harmless.
    tracker.retire(&token.record);
    assert_eq!(tracker.stats().live_records, 1);
    drop(token);
    assert_eq!(tracker.stats().live_records, 0);
}

#[test]
fn invalidated_ids_stay_reserved_while_the_token_lives() {
    let fx = Fixture::new();
    let shape = fx.define(fx.class("Shape", &fx.root).with_modifiers(Modifiers::ABSTRACT));
    let circle = fx.define(fx.class("Circle", &shape));
    let tracker = DependencyTracker::new();
    let batch = AssumptionBatch::new().unique_concrete_subtype(shape.id(), circle.id());
    let stale = tracker.register(&batch);
    tracker.attach(&stale, ArtifactHandle(1));

    let square = fx.define(fx.class("Square", &shape));
    let mut sweep = InvalidationSweep::new(&tracker, &square);
    sweep.flush(&shape);
    assert_eq!(sweep.finish(), [ArtifactHandle(1)]);
    assert!(!stale.is_valid());

    let fresh = tracker.register(&batch);
    assert_ne!(fresh.id(), stale.id());

    let stale_id = stale.id();
    drop(stale);
    assert_eq!(tracker.register(&batch).id(), stale_id);
}

#[test]
fn sweep_falsifies_subtype_facts_and_keeps_matching_method_facts() {
    let fx = Fixture::new();
    let shape = fx.define(fx.method(
        fx.class("Shape", &fx.root).with_modifiers(Modifiers::ABSTRACT),
        "draw",
    ));
    let circle = fx.define(fx.class("Circle", &shape));
    let square = fx.define(fx.method(fx.class("Square", &shape), "draw"));
    let draw = fx.find(&shape, "draw");

    let tracker = DependencyTracker::new();
    let subtype = tracker.register(
        &AssumptionBatch::new().unique_concrete_subtype(shape.id(), circle.id()),
    );
    let same_impl = tracker.register(&AssumptionBatch::new().unique_concrete_method(
        shape.id(),
        Arc::clone(&draw),
        Arc::clone(&draw),
    ));
    let other_impl = tracker.register(&AssumptionBatch::new().unique_concrete_method(
        shape.id(),
        Arc::clone(&draw),
        fx.find(&square, "draw"),
    ));
    tracker.attach(&subtype, ArtifactHandle(1));
    tracker.attach(&other_impl, ArtifactHandle(3));

    // A new subclass inheriting Shape.draw.
    let triangle = fx.define(fx.class("Triangle", &shape));
    let mut sweep = InvalidationSweep::new(&tracker, &triangle);
    sweep.flush(&shape);
    let handles = sweep.finish();

    assert_eq!(handles, [ArtifactHandle(1), ArtifactHandle(3)]);
    assert!(!subtype.is_valid());
    assert!(same_impl.is_valid());
    assert!(!other_impl.is_valid());
    assert_eq!(tracker.dependents_of(shape.id()), [same_impl.id()]);
    assert_eq!(tracker.stats().invalidated, 2);
}

#[test]
fn sweep_only_checks_facts_about_the_flushed_context() {
    let fx = Fixture::new();
    let a = fx.define(fx.class("A", &fx.root).with_modifiers(Modifiers::ABSTRACT));
    let b = fx.define(fx.class("B", &fx.root).with_modifiers(Modifiers::ABSTRACT));
    let tracker = DependencyTracker::new();
    let token = tracker.register(
        &AssumptionBatch::new()
            .unique_concrete_subtype(a.id(), a.id())
            .unique_concrete_subtype(b.id(), b.id()),
    );

    let mut sweep = InvalidationSweep::new(&tracker, &fx.root);
    sweep.flush(&fx.root);
    assert!(sweep.finish().is_empty());
    assert!(token.is_valid());

    let mut sweep = InvalidationSweep::new(&tracker, &fx.root);
    sweep.flush(&b);
    sweep.flush(&a);
    // Uninstalled: nothing to deoptimize, but the record is gone.
    assert!(sweep.finish().is_empty());
    assert!(!token.is_valid());
    assert!(tracker.dependents_of(a.id()).is_empty());
}

#[test]
fn queue_delivers_in_order() {
    let fx = Fixture::new();
    let queue = InvalidationQueue::new();
    let receiver = queue.receiver();

    queue.artifacts_invalidated(&fx.root, &[ArtifactHandle(4), ArtifactHandle(2)]);
    queue.artifacts_invalidated(&fx.root, &[ArtifactHandle(9)]);

    assert_eq!(queue.len(), 3);
    assert_eq!(receiver.recv().unwrap(), ArtifactHandle(4));
    assert_eq!(queue.drain(), [ArtifactHandle(2), ArtifactHandle(9)]);
    assert!(queue.is_empty());
}

#[test]
fn validation_accessors() {
    assert!(Validation::Rejected.is_rejected());
    assert!(Validation::NoAssumptions.token().is_none());

    let tracker = DependencyTracker::new();
    let ctx = TypeId::from_raw(0);
    let token = tracker.register(&AssumptionBatch::new().unique_concrete_subtype(ctx, ctx));
    let id = token.id();
    let validation = Validation::Valid(token);
    assert!(!validation.is_rejected());
    assert_eq!(validation.token().map(|t| t.id()), Some(id));
}
