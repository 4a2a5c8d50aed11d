//! Index-keyed containers used by the in-process SAT backend.
mod activity_heap;
mod keyed_vec;

pub(crate) use activity_heap::ActivityHeap;
pub(crate) use keyed_vec::KeyedVec;
pub(crate) use keyed_vec::StorageKey;
