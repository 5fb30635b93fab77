use super::*;
use pretty_assertions::assert_eq;

use crate::testing::Fixture;

#[test]
fn allocation_is_dense_and_recycles_lowest() {
    let registry = IdentityRegistry::new(8);
    let ids: Vec<u32> = (0..4).map(|_| registry.allocate().raw()).collect();
    assert_eq!(ids, [0, 1, 2, 3]);

    registry.release(TypeId::from_raw(1));
    registry.release(TypeId::from_raw(2));
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.allocate().raw(), 1);
    assert_eq!(registry.allocate().raw(), 2);
    assert_eq!(registry.allocate().raw(), 4);
}

#[test]
fn ids_spill_past_the_prefix() {
    let registry = IdentityRegistry::new(2);
    let ids: Vec<TypeId> = (0..5).map(|_| registry.allocate()).collect();
    for id in &ids {
        assert!(matches!(registry.state(*id), IdState::Reserved));
    }
    assert!(matches!(
        registry.state(TypeId::from_raw(40)),
        IdState::Unallocated
    ));
}

#[test]
fn lookup_sees_only_bound_records() {
    let fx = Fixture::new();
    let registry = fx.hierarchy.registry();
    let reserved = registry.allocate();

    assert!(registry.lookup(reserved).is_none());
    assert!(matches!(registry.state(reserved), IdState::Reserved));

    let root = registry.lookup(fx.root.id()).unwrap();
    assert!(Arc::ptr_eq(&root, &fx.root));
    assert!(matches!(registry.state(fx.root.id()), IdState::Bound(_)));
}

#[test]
fn array_ids_reserve_every_lower_dimension() {
    let registry = IdentityRegistry::new(16);
    let element = registry.allocate();

    let three = registry.array_id(element, 3);
    assert_eq!(registry.len(), 4);

    let one = registry.array_id(element, 1);
    let two = registry.array_id(element, 2);
    assert_eq!(registry.len(), 4, "lower dimensions were already reserved");
    assert_eq!(registry.array_id(element, 3), three);
    assert_eq!(
        registry.array_origin(two),
        Some(ArrayOrigin {
            element,
            dimensions: 2
        })
    );
    assert_eq!(registry.array_origin(element), None);

    // An array element is normalized to its innermost element.
    assert_eq!(registry.array_id(one, 2), three);
    assert_eq!(registry.array_of(two), Some(three));
    assert_eq!(registry.array_of(element), Some(one));
}

#[test]
fn array_of_stops_at_the_dimension_limit() {
    let registry = IdentityRegistry::new(16);
    let element = registry.allocate();
    let deepest = registry.array_id(element, MAX_ARRAY_DIMENSIONS);

    assert_eq!(registry.array_of(deepest), None);
    assert_eq!(
        registry.array_origin(deepest).map(|o| o.dimensions),
        Some(MAX_ARRAY_DIMENSIONS)
    );
}

#[test]
fn release_frees_reserved_array_ids() {
    let registry = IdentityRegistry::new(16);
    let element = registry.allocate();
    let array = registry.array_id(element, 2);
    assert_eq!(registry.len(), 3);

    registry.release(element);
    assert!(registry.is_empty());
    assert_eq!(registry.array_origin(array), None);
    assert!(matches!(registry.state(array), IdState::Unallocated));

    // Fresh reservations start over.
    let element = registry.allocate();
    assert_eq!(element.raw(), 0);
    assert_eq!(
        registry.array_origin(registry.array_id(element, 1)),
        Some(ArrayOrigin {
            element,
            dimensions: 1
        })
    );
}

#[test]
fn zero_dimensions_name_the_element() {
    let registry = IdentityRegistry::new(16);
    let element = registry.allocate();
    assert_eq!(registry.array_id(element, 0), element);
    assert_eq!(registry.len(), 1);

    let matrix = registry.array_id(element, 2);
    assert_eq!(registry.array_id(matrix, 0), matrix);
    assert_eq!(registry.len(), 3);
}

#[test]
#[should_panic(expected = "released apart from its element type")]
fn releasing_an_array_id_is_fatal() {
    let registry = IdentityRegistry::new(16);
    let element = registry.allocate();
    let array = registry.array_id(element, 1);
    registry.release(array);
}

#[test]
#[should_panic(expected = "bound twice")]
fn binding_twice_is_fatal() {
    let fx = Fixture::new();
    fx.hierarchy
        .registry()
        .register(fx.root.id(), Arc::clone(&fx.root));
}

#[test]
#[should_panic(expected = "never allocated")]
fn releasing_an_unallocated_id_is_fatal() {
    IdentityRegistry::new(4).release(TypeId::from_raw(3));
}
