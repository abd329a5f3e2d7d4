//! Internal primitives.

pub(crate) mod priority_queue;
pub(crate) mod rng;
