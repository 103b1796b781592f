//! Intermediate geometry used while building a lattice.
//!
//! A build mirrors the hardware tree with [`LatticeSequence`]s holding
//! [`LatticeNode`]s. Positions are kept in the frame of the parent sequence
//! until the final phase materializes model elements.

mod element;
mod node;
mod sequence;

pub use element::{EPS, LatticeElement, SortKey, compare};
pub use node::LatticeNode;
pub use sequence::LatticeSequence;
