//! Dispatch tables: vtable, itable, and mtable.
//!
//! # Layout
//!
//! ```text
//! vtable  [ slot 0 | slot 1 | ... ]                 one per all_virtual entry
//! itable  [ sentinel | M(A) | M(B) | M(I) m1 m2 | M(J) m1 | ... ]
//!                      ^ class ancestors  ^ interface blocks
//! mtable  offsets[id % divisor] -> itable offset of M(id)
//! ```
//!
//! `M(x)` is the marker for type `x`. Each interface block is the interface's
//! marker followed by one slot per method the interface declares, in
//! declaration order; a method's 1-based index within its interface is its
//! offset from the marker. Method slots hold vtable indices.
//!
//! Subtype test: `A <: B` iff `A == B` or `itable[mtable[B]] == M(B)`.
//! Interface dispatch: `vtable[itable[mtable[I] + index]]`.

mod mtable;

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hub_ir::{MemberKey, TypeId};
use rustc_hash::FxHashMap;

use crate::record::{Method, TypeRecord};

pub use mtable::{perfect_divisor, MTable};

/// One itable entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ITableSlot {
    /// Offset 0. Never equal to any marker.
    Sentinel,
    Marker(TypeId),
    /// Vtable index of the implementation.
    Method(u32),
}

/// Address of compiled code for a vtable slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryPoint(NonZeroU64);

impl EntryPoint {
    /// `None` for the null address, which is reserved for unresolved slots.
    pub fn new(address: u64) -> Option<Self> {
        NonZeroU64::new(address).map(Self)
    }

    pub fn address(self) -> u64 {
        self.0.get()
    }
}

/// Current content of a vtable slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VTableEntry {
    /// Not compiled yet; calls go through the resolution trampoline.
    Unresolved,
    Compiled(EntryPoint),
}

/// The dispatch table of one type.
#[derive(Debug)]
pub struct DispatchTable {
    vtable: Box<[AtomicU64]>,
    itable: Box<[ITableSlot]>,
    mtable: MTable,
}

impl DispatchTable {
    pub fn vtable_len(&self) -> usize {
        self.vtable.len()
    }

    pub fn itable(&self) -> &[ITableSlot] {
        &self.itable
    }

    pub fn mtable(&self) -> &MTable {
        &self.mtable
    }

    pub fn vtable_entry(&self, slot: u32) -> Option<VTableEntry> {
        let raw = self.vtable.get(slot as usize)?.load(Ordering::Acquire);
        Some(match EntryPoint::new(raw) {
            Some(entry) => VTableEntry::Compiled(entry),
            None => VTableEntry::Unresolved,
        })
    }

    /// Install compiled code in `slot`. Returns `Some(false)` if the slot
    /// already held `entry`, `None` if the slot does not exist.
    pub fn patch(&self, slot: u32, entry: EntryPoint) -> Option<bool> {
        let cell = self.vtable.get(slot as usize)?;
        let previous = cell.swap(entry.address(), Ordering::AcqRel);
        Some(previous != entry.address())
    }

    /// Itable offset of `target`'s marker, if this type is a subtype of it.
    #[inline]
    pub fn marker_offset(&self, target: TypeId) -> Option<usize> {
        let offset = self.mtable.offset(target) as usize;
        match self.itable.get(offset) {
            Some(ITableSlot::Marker(id)) if *id == target => Some(offset),
            _ => None,
        }
    }

    /// Vtable index implementing method `index` of `interface`.
    pub fn interface_slot(&self, interface: TypeId, index: u32) -> Option<u32> {
        let base = self.marker_offset(interface)?;
        match self.itable.get(base + index as usize) {
            Some(ITableSlot::Method(slot)) => Some(*slot),
            _ => None,
        }
    }
}

/// Inputs for building one type's dispatch table.
pub(crate) struct TableLayout<'a> {
    /// Types that get a bare marker: the type itself, its superclasses, and for
    /// arrays the array ancestors.
    pub markers: &'a [TypeId],
    /// Interface closure; each gets a block.
    pub interfaces: &'a [Arc<TypeRecord>],
    pub all_virtual: &'a [Arc<Method>],
    /// Interface types only record markers; classes also fill method slots.
    pub method_slots: bool,
}

/// Builds vtable, itable, and mtable for a type under construction.
pub(crate) struct DispatchTableBuilder;

impl DispatchTableBuilder {
    pub(crate) fn build(layout: &TableLayout<'_>) -> DispatchTable {
        let by_key: FxHashMap<MemberKey, u32> = if layout.method_slots {
            layout
                .all_virtual
                .iter()
                .filter_map(|method| Some((method.key(), method.vtable_slot()?)))
                .collect()
        } else {
            FxHashMap::default()
        };

        let mut itable = vec![ITableSlot::Sentinel];
        let mut entries: Vec<(TypeId, u32)> = Vec::new();
        let mut marked = rustc_hash::FxHashSet::default();

        let mut mark = |itable: &mut Vec<ITableSlot>, id: TypeId| -> bool {
            if !marked.insert(id) {
                return false;
            }
            entries.push((id, offset_of(itable)));
            itable.push(ITableSlot::Marker(id));
            true
        };

        for &id in layout.markers {
            mark(&mut itable, id);
        }

        for interface in layout.interfaces {
            if !mark(&mut itable, interface.id()) || !layout.method_slots {
                continue;
            }
            for method in interface.interface_methods() {
                let slot = match by_key.get(&method.key()) {
                    Some(slot) => *slot,
                    None => crate::fatal!(
                        "no vtable slot implements {method} in a type implementing {}",
                        interface.name_str()
                    ),
                };
                itable.push(ITableSlot::Method(slot));
            }
        }

        let vtable = layout
            .all_virtual
            .iter()
            .map(|_| AtomicU64::new(0))
            .collect();

        DispatchTable {
            vtable,
            itable: itable.into_boxed_slice(),
            mtable: MTable::build(&entries),
        }
    }
}

fn offset_of(itable: &[ITableSlot]) -> u32 {
    match u32::try_from(itable.len()) {
        Ok(offset) => offset,
        Err(_) => crate::fatal!("itable exceeds 32-bit offsets"),
    }
}
