use super::*;
use pretty_assertions::assert_eq;

use hub_ir::BodyHandle;

use crate::testing::Fixture;
use crate::DefineError;

fn verify_error(result: Result<Arc<TypeRecord>, DefineError>) -> VerifyError {
    match result {
        Err(DefineError::Verify(err)) => err,
        other => panic!("expected a verification error, got {other:?}"),
    }
}

#[test]
fn package_prefixes() {
    assert_eq!(package_prefix("core/lang/Object"), "core/lang");
    assert_eq!(package_prefix("app.model.User"), "app.model");
    assert_eq!(package_prefix("Object"), "");
}

#[test]
fn overriding_reuses_the_inherited_slot() {
    let fx = Fixture::new();
    let base = fx.define(fx.method(fx.method(fx.class("Base", &fx.root), "a"), "b"));
    let derived = fx.define(fx.method(fx.method(fx.class("Derived", &base), "c"), "b"));

    let names: Vec<_> = derived
        .all_virtual_methods()
        .iter()
        .map(|m| (m.holder_name(), m.name_str()))
        .collect();
    assert_eq!(
        names,
        [
            ("Object", "hashCode"),
            ("Base", "a"),
            ("Derived", "b"),
            ("Derived", "c"),
        ]
    );
    assert_eq!(
        derived.vtable_slot_of(fx.key("b", "()V")),
        base.vtable_slot_of(fx.key("b", "()V"))
    );
    // Local order is declaration order.
    let local: Vec<_> = derived.virtual_methods().iter().map(|m| m.name_str()).collect();
    assert_eq!(local, ["c", "b"]);
}

#[test]
fn vtable_prefix_matches_the_supertype() {
    let fx = Fixture::new();
    let base = fx.define(fx.method(fx.class("Base", &fx.root), "a"));
    let derived = fx.define(fx.method(fx.method(fx.class("Derived", &base), "b"), "a"));

    for (slot, inherited) in base.all_virtual_methods().iter().enumerate() {
        let entry = &derived.all_virtual_methods()[slot];
        assert_eq!(entry.key(), inherited.key());
    }
}

#[test]
fn overriding_a_final_method_is_rejected() {
    let fx = Fixture::new();
    let key = fx.key("run", "()V");
    let base = fx.define(
        fx.class("Base", &fx.root)
            .with_method(key, Modifiers::PUBLIC | Modifiers::FINAL, fx.body()),
    );
    let err = verify_error(
        fx.hierarchy
            .define(fx.class("Derived", &base).with_method(key, Modifiers::PUBLIC, fx.body())),
    );

    assert_eq!(
        err,
        VerifyError::OverridesFinal {
            ty: "Derived",
            holder: "Base",
            method: "run",
            signature: "()V",
        }
    );
    assert!(fx.hierarchy.find_by_name(fx.name("Derived")).is_none());
}

#[test]
fn final_package_private_method_is_invisible_from_another_package() {
    let fx = Fixture::new();
    let key = fx.key("run", "()V");
    let base = fx.define(
        TypeDescription::class(fx.name("lib/Base"), Some(fx.root.id()))
            .with_method(key, Modifiers::FINAL, fx.body()),
    );
    let derived = fx.define(
        TypeDescription::class(fx.name("app/Derived"), Some(base.id()))
            .with_method(key, Modifiers::PUBLIC, fx.body()),
    );

    // The final method is not visible from `app`, so overriding it is legal.
    let run = derived.find_virtual_method(key).unwrap();
    assert_eq!(run.holder(), derived.id());
}

#[test]
fn private_methods_and_initializers_take_no_slot() {
    let fx = Fixture::new();
    let helper = fx.key("helper", "()V");
    let init = fx.key("<init>", "()V");
    let record = fx.define(
        fx.class("Widget", &fx.root)
            .with_method(helper, Modifiers::PRIVATE, fx.body())
            .with_method(init, Modifiers::PUBLIC | Modifiers::INITIALIZER, fx.body()),
    );

    assert_eq!(record.all_virtual_methods().len(), 1);
    assert_eq!(record.virtual_methods().len(), 2);
    assert_eq!(record.vtable_slot_of(helper), None);
    let found = record.find_virtual_method(helper).unwrap();
    assert_eq!(found.kind(), MethodKind::Virtual { slot: None });
    assert_eq!(record.resolve_method_impl(found), Some(Arc::clone(found)));
}

#[test]
fn private_methods_do_not_override() {
    let fx = Fixture::new();
    let key = fx.key("step", "()V");
    let base = fx.define(fx.class("Base", &fx.root).with_method(key, Modifiers::PUBLIC, fx.body()));
    let derived = fx.define(
        fx.class("Derived", &base)
            .with_method(key, Modifiers::PRIVATE, fx.body()),
    );

    let dispatched = derived.find_virtual_method(key).unwrap();
    assert_eq!(dispatched.holder(), base.id());
}

#[test]
fn class_initializer_is_static() {
    let fx = Fixture::new();
    let clinit = fx.key("<clinit>", "()V");
    let record = fx.define(
        fx.class("Config", &fx.root)
            .with_method(clinit, Modifiers::empty(), Some(BodyHandle(9))),
    );

    let method = record.find_static_method(clinit).unwrap();
    assert!(method.is_static());
    assert_eq!(method.body(), Some(BodyHandle(9)));
}

#[test]
fn unimplemented_interface_methods_get_synthesized_slots() {
    let fx = Fixture::new();
    let movable = fx.define(fx.abstract_method(fx.interface("Movable"), "move"));
    let robot = fx.define(
        fx.class("Robot", &fx.root)
            .with_modifiers(Modifiers::ABSTRACT)
            .implementing([movable.id()]),
    );

    let placeholder = robot.virtual_methods().last().unwrap();
    assert!(placeholder.is_synthetic_default());
    assert!(placeholder.is_abstract());
    assert_eq!(placeholder.holder(), robot.id());
    assert_eq!(placeholder.interface_index(), Some((movable.id(), 1)));

    // A subclass implementing the method overrides the placeholder's slot.
    let walker = fx.define(fx.method(fx.class("Walker", &robot), "move"));
    let slot = placeholder.vtable_slot().unwrap();
    assert_eq!(walker.all_virtual_methods()[slot as usize].holder(), walker.id());
    assert!(walker.virtual_methods().iter().all(|m| !m.is_synthetic_default()));
}

#[test]
fn inherited_implementation_satisfies_an_interface() {
    let fx = Fixture::new();
    let base = fx.define(fx.method(fx.class("Base", &fx.root), "run"));
    let runnable = fx.define(fx.abstract_method(fx.interface("Runnable"), "run"));
    let derived = fx.define(fx.class("Derived", &base).implementing([runnable.id()]));

    assert!(derived.virtual_methods().is_empty());
    let table = derived.dispatch_table().unwrap();
    assert_eq!(
        table.interface_slot(runnable.id(), 1),
        base.vtable_slot_of(fx.key("run", "()V"))
    );
}

#[test]
fn structural_errors() {
    let fx = Fixture::new();
    let iface = fx.define(fx.interface("Marker"));
    let sealed = fx.define(fx.class("Sealed", &fx.root).with_modifiers(Modifiers::FINAL));
    let plain = fx.define(fx.class("Plain", &fx.root));

    assert_eq!(
        verify_error(fx.hierarchy.define(fx.class("A", &iface))),
        VerifyError::InterfaceSupertype {
            ty: "A",
            supertype: "Marker"
        }
    );
    assert_eq!(
        verify_error(fx.hierarchy.define(fx.class("B", &sealed))),
        VerifyError::FinalSupertype {
            ty: "B",
            supertype: "Sealed"
        }
    );
    assert_eq!(
        verify_error(
            fx.hierarchy
                .define(fx.class("C", &fx.root).implementing([plain.id()]))
        ),
        VerifyError::NotAnInterface {
            ty: "C",
            interface: "Plain"
        }
    );
    assert_eq!(
        verify_error(fx.hierarchy.define(fx.method(fx.method(fx.class("D", &fx.root), "x"), "x"))),
        VerifyError::DuplicateMember {
            ty: "D",
            member: "x",
            signature: "()V"
        }
    );
}

#[test]
fn interface_closure_is_deduplicated_in_declaration_order() {
    let fx = Fixture::new();
    let a = fx.define(fx.interface("A"));
    let b = fx.define(fx.interface("B").implementing([a.id()]));
    let c = fx.define(fx.interface("C").implementing([a.id()]));
    let base = fx.define(fx.class("Base", &fx.root).implementing([c.id()]));
    let derived = fx.define(fx.class("Derived", &base).implementing([b.id(), a.id()]));

    let closure: Vec<_> = derived.interface_closure().iter().map(|i| i.name_str()).collect();
    assert_eq!(closure, ["B", "A", "C"]);
    assert_eq!(
        derived.ancestors(),
        [derived.id(), base.id(), fx.root.id(), b.id(), a.id(), c.id()]
    );
}
