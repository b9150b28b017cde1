//! Trap entry state.
//!
//! The trap-entry stub pushes `ds`, `es`, `fs`, `gs` and then `pushal` on top
//! of what the processor and the per-vector stub already pushed, and hands
//! the kernel a pointer to the result. [`TrapFrame`] is that record; the
//! `vector` module names the numbers found in its `trapno` field.

pub mod frame;
pub mod vector;

pub use frame::{selector_from_slot, SavedStack, TrapFrame};
pub use vector::Exception;
