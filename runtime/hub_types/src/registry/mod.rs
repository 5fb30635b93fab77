//! Identity registry: dense type ids and the id -> record table.
//!
//! # Design
//!
//! - Ids come from a used-id bitset (lowest free first), so released ids are
//!   recycled and the table stays dense.
//! - The table is a fixed prefix plus a growable overflow. Lookups of any id,
//!   including ones never allocated, are O(1) and never fail.
//! - An id is *reserved* between `allocate` and `register`. Array ids are
//!   reserved eagerly (one per dimension, per element type) so array subtyping
//!   can name array types that have not been materialized yet.
//! - The registry has its own lock. It is never held while the hierarchy lock
//!   is acquired, and array id expansion may run outside the hierarchy lock.

mod bitset;

use std::sync::Arc;

use hub_ir::TypeId;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::record::TypeRecord;

pub(crate) use bitset::IdBitSet;

/// Maximum number of array dimensions.
pub const MAX_ARRAY_DIMENSIONS: u8 = 255;

/// Where an array id came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrayOrigin {
    /// Innermost non-array element type.
    pub element: TypeId,
    pub dimensions: u8,
}

/// Registry view of one id.
#[derive(Clone, Debug)]
pub enum IdState {
    /// Never allocated, or released.
    Unallocated,
    /// Allocated but no record bound yet.
    Reserved,
    Bound(Arc<TypeRecord>),
}

#[derive(Clone, Default)]
enum Slot {
    #[default]
    Free,
    Reserved,
    Bound(Arc<TypeRecord>),
}

struct RegistryInner {
    used: IdBitSet,
    prefix: Box<[Slot]>,
    overflow: Vec<Slot>,
    /// Element type -> ids of its 1..=n dimensional arrays.
    array_ids: FxHashMap<TypeId, SmallVec<[TypeId; 2]>>,
    origins: FxHashMap<TypeId, ArrayOrigin>,
}

impl RegistryInner {
    fn slot(&self, id: TypeId) -> Option<&Slot> {
        let index = id.index();
        match index.checked_sub(self.prefix.len()) {
            None => self.prefix.get(index),
            Some(over) => self.overflow.get(over),
        }
    }

    fn slot_mut(&mut self, id: TypeId) -> &mut Slot {
        let index = id.index();
        match index.checked_sub(self.prefix.len()) {
            None => &mut self.prefix[index],
            Some(over) => {
                if over >= self.overflow.len() {
                    self.overflow.resize(over + 1, Slot::Free);
                }
                &mut self.overflow[over]
            }
        }
    }

    fn allocate(&mut self) -> TypeId {
        let id = TypeId::from_raw(self.used.allocate());
        *self.slot_mut(id) = Slot::Reserved;
        id
    }

    fn free(&mut self, id: TypeId) {
        if !self.used.remove(id.raw()) {
            crate::fatal!("released type id {id} that was never allocated");
        }
        *self.slot_mut(id) = Slot::Free;
        self.origins.remove(&id);
    }

    /// `(element, dims)` for the array whose component is `component`.
    fn array_key(&self, component: TypeId) -> (TypeId, usize) {
        match self.origins.get(&component) {
            Some(origin) => (origin.element, usize::from(origin.dimensions) + 1),
            None => (component, 1),
        }
    }

    fn reserve_array(&mut self, element: TypeId, dimensions: u8) -> TypeId {
        let mut reserved = self.array_ids.remove(&element).unwrap_or_default();
        while reserved.len() < usize::from(dimensions) {
            let id = self.allocate();
            #[expect(
                clippy::cast_possible_truncation,
                reason = "bounded by `dimensions`, itself a u8"
            )]
            let dims = (reserved.len() + 1) as u8;
            self.origins.insert(
                id,
                ArrayOrigin {
                    element,
                    dimensions: dims,
                },
            );
            reserved.push(id);
        }
        let id = reserved[usize::from(dimensions) - 1];
        self.array_ids.insert(element, reserved);
        id
    }
}

/// Allocator and lookup table for type ids.
pub struct IdentityRegistry {
    inner: Mutex<RegistryInner>,
}

impl IdentityRegistry {
    pub fn new(prefix: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                used: IdBitSet::new(),
                prefix: vec![Slot::Free; prefix].into_boxed_slice(),
                overflow: Vec::new(),
                array_ids: FxHashMap::default(),
                origins: FxHashMap::default(),
            }),
        }
    }

    /// Reserve the lowest unused id.
    pub fn allocate(&self) -> TypeId {
        let id = self.inner.lock().allocate();
        tracing::trace!(ty = id.raw(), "reserved type id");
        id
    }

    /// Bind a reserved id to its record.
    ///
    /// # Panics
    /// Fatal if `id` is not reserved (never allocated, or already bound), or
    /// if the record carries a different id.
    pub fn register(&self, id: TypeId, record: Arc<TypeRecord>) {
        if record.id() != id {
            crate::fatal!("record {} registered under id {id}", record.id());
        }
        let mut inner = self.inner.lock();
        let slot = inner.slot_mut(id);
        match slot {
            Slot::Reserved => *slot = Slot::Bound(record),
            Slot::Free => crate::fatal!("registered type id {id} that was never allocated"),
            Slot::Bound(_) => crate::fatal!("type id {id} bound twice"),
        }
    }

    /// The record bound to `id`; `None` while reserved or unallocated.
    pub fn lookup(&self, id: TypeId) -> Option<Arc<TypeRecord>> {
        match self.inner.lock().slot(id) {
            Some(Slot::Bound(record)) => Some(Arc::clone(record)),
            _ => None,
        }
    }

    /// Distinguishes reserved-but-unbound ids from never-allocated ones.
    pub fn state(&self, id: TypeId) -> IdState {
        match self.inner.lock().slot(id) {
            None | Some(Slot::Free) => IdState::Unallocated,
            Some(Slot::Reserved) => IdState::Reserved,
            Some(Slot::Bound(record)) => IdState::Bound(Arc::clone(record)),
        }
    }

    /// Unbind and free `id`, along with every array id reserved for it as an
    /// element type.
    ///
    /// # Panics
    /// Fatal if `id` is not allocated, or if it is an array id. Array ids
    /// live as long as their element type and are released with it.
    pub fn release(&self, id: TypeId) {
        let mut inner = self.inner.lock();
        if let Some(origin) = inner.origins.get(&id) {
            crate::fatal!(
                "array id {id} released apart from its element type {}",
                origin.element
            );
        }
        inner.free(id);
        if let Some(arrays) = inner.array_ids.remove(&id) {
            for array in arrays {
                inner.free(array);
            }
        }
        tracing::trace!(ty = id.raw(), "released type id");
    }

    /// Id of the `dimensions`-dimensional array of `element`, reserving ids
    /// for every lower dimension on first use.
    ///
    /// If `element` is itself an array id, dimensions are added to it. Zero
    /// dimensions names `element` itself.
    pub fn array_id(&self, element: TypeId, dimensions: u8) -> TypeId {
        if dimensions == 0 {
            return element;
        }
        let mut inner = self.inner.lock();
        let (base, extra) = match inner.origins.get(&element) {
            Some(origin) => (origin.element, usize::from(origin.dimensions)),
            None => (element, 0),
        };
        let total = extra + usize::from(dimensions);
        match u8::try_from(total) {
            Ok(total) => inner.reserve_array(base, total),
            Err(_) => crate::fatal!("array of {total} dimensions requested for {element}"),
        }
    }

    /// Id of the array whose component type is `component`, or `None` if the
    /// result would exceed [`MAX_ARRAY_DIMENSIONS`].
    pub fn array_of(&self, component: TypeId) -> Option<TypeId> {
        let mut inner = self.inner.lock();
        let (element, dimensions) = inner.array_key(component);
        let dimensions = u8::try_from(dimensions).ok()?;
        Some(inner.reserve_array(element, dimensions))
    }

    /// Element type and dimension count of an array id.
    pub fn array_origin(&self, id: TypeId) -> Option<ArrayOrigin> {
        self.inner.lock().origins.get(&id).copied()
    }

    /// Number of allocated ids, bound or reserved.
    pub fn len(&self) -> usize {
        self.inner.lock().used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("IdentityRegistry")
            .field("allocated", &inner.used.len())
            .field("prefix", &inner.prefix.len())
            .field("overflow", &inner.overflow.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
