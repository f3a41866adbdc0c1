//! Core data types shared by intake and workers
//!
//! - BoundedQueue: fixed-capacity FIFO ring
//! - Item: unit of work
//! - SequenceCounter: intake-owned monotonic counter

pub mod item;
pub mod ring_buffer;
pub mod sequence;

pub use item::Item;
pub use ring_buffer::{BoundedQueue, Empty, Full};
pub use sequence::SequenceCounter;
