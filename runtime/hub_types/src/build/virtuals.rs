//! Vtable content: inheritance, overriding, and synthesized defaults.

use std::sync::Arc;

use hub_ir::{MemberKey, MethodDescription, Modifiers};
use rustc_hash::FxHashMap;

use super::{MemberContext, MemberIndices};
use crate::record::{Method, MethodKind, TypeRecord};
use crate::VerifyError;

/// Accumulates the complete virtual method sequence of one class.
pub(super) struct VirtualTableBuilder {
    all_virtual: Vec<Arc<Method>>,
    local: Vec<Arc<Method>>,
    /// Key -> slot for every overridable entry.
    lookup: FxHashMap<MemberKey, u32>,
}

impl VirtualTableBuilder {
    /// Start from the supertype's complete sequence.
    pub(super) fn inherit(supertype: Option<&TypeRecord>) -> Self {
        let all_virtual = supertype.map_or_else(Vec::new, |s| s.all_virtual_methods().to_vec());
        let lookup = all_virtual
            .iter()
            .filter_map(|m| Some((m.key(), m.vtable_slot()?)))
            .collect();
        Self {
            all_virtual,
            local: Vec::new(),
            lookup,
        }
    }

    fn next_slot(&self) -> u32 {
        match u32::try_from(self.all_virtual.len()) {
            Ok(slot) => slot,
            Err(_) => crate::fatal!("vtable exceeds 32-bit slot indices"),
        }
    }

    /// Enter a locally declared instance method.
    ///
    /// Directly dispatched methods (private, initializers) get no slot and
    /// neither override nor can be overridden. Anything else replaces the
    /// inherited entry with the same key, unless that entry is final and
    /// visible from this type, or takes a new slot at the end.
    pub(super) fn declare(
        &mut self,
        ctx: &MemberContext<'_>,
        indices: &mut MemberIndices,
        desc: MethodDescription,
        directly_dispatched: bool,
    ) -> Result<(), VerifyError> {
        let id = indices.next(ctx.holder);

        if directly_dispatched {
            let method = ctx.method(id, desc.key, desc.modifiers, desc.body, MethodKind::Virtual { slot: None });
            self.local.push(Arc::new(method));
            return Ok(());
        }

        let slot = match self.lookup.get(&desc.key) {
            Some(&slot) => {
                let inherited = &self.all_virtual[slot as usize];
                if inherited.modifiers().is_final() && inherited.is_accessible_from(ctx.package) {
                    return Err(VerifyError::OverridesFinal {
                        ty: ctx.holder_name,
                        holder: inherited.holder_name(),
                        method: inherited.name_str(),
                        signature: ctx.symbols.lookup(desc.key.signature),
                    });
                }
                slot
            }
            None => {
                let slot = self.next_slot();
                self.lookup.insert(desc.key, slot);
                slot
            }
        };

        let method = Arc::new(ctx.method(
            id,
            desc.key,
            desc.modifiers,
            desc.body,
            MethodKind::Virtual { slot: Some(slot) },
        ));
        self.place(slot, &method);
        self.local.push(method);
        Ok(())
    }

    /// Append a placeholder for every interface method in `closure` that no
    /// entry implements, so every interface method resolves to a slot.
    pub(super) fn add_synthetic_defaults(
        &mut self,
        ctx: &MemberContext<'_>,
        indices: &mut MemberIndices,
        closure: &[Arc<TypeRecord>],
    ) {
        for interface in closure {
            for declared in interface.interface_methods() {
                if self.lookup.contains_key(&declared.key()) {
                    continue;
                }
                let Some((_, index)) = declared.interface_index() else {
                    continue;
                };
                let slot = self.next_slot();
                let method = Arc::new(ctx.method(
                    indices.next(ctx.holder),
                    declared.key(),
                    Modifiers::PUBLIC | Modifiers::ABSTRACT | Modifiers::SYNTHETIC,
                    None,
                    MethodKind::SyntheticDefault {
                        slot,
                        interface: interface.id(),
                        index,
                    },
                ));
                tracing::trace!(
                    ty = ctx.holder.raw(),
                    method = method.name_str(),
                    slot,
                    "synthesized default method"
                );
                self.lookup.insert(declared.key(), slot);
                self.place(slot, &method);
                self.local.push(method);
            }
        }
    }

    fn place(&mut self, slot: u32, method: &Arc<Method>) {
        let slot = slot as usize;
        if slot == self.all_virtual.len() {
            self.all_virtual.push(Arc::clone(method));
        } else {
            self.all_virtual[slot] = Arc::clone(method);
        }
    }

    /// `(local virtual methods, complete vtable content)`.
    pub(super) fn finish(self) -> (Vec<Arc<Method>>, Vec<Arc<Method>>) {
        (self.local, self.all_virtual)
    }
}
