//! Stack growth for recursive hierarchy walks.
//!
//! Interface closures, array ancestor expansion, and the unique-concrete-method
//! search all recurse along the type hierarchy. Hierarchies are usually a few
//! dozen levels deep, but generated code (proxies, lambdas, deeply nested array
//! types) can produce chains long enough to exhaust a compiler thread's stack.
//!
//! Wrap each recursive step in [`ensure_sufficient_stack`]:
//!
//! ```text
//! fn collect(&self, ty: &TypeRecord, out: &mut Vec<TypeId>) {
//!     ensure_sufficient_stack(|| {
//!         for parent in ty.declared_interfaces() {
//!             self.collect(parent, out);
//!         }
//!     })
//! }
//! ```
//!
//! - **Red zone**: 64KB. Below this, the stack is grown before running `f`.
//! - **Growth size**: 1MB per extension.

const RED_ZONE: usize = 64 * 1024;

const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, growing the stack first if fewer than [`RED_ZONE`] bytes remain.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM manages its own stack; call directly.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
