//! Beamline Core Types
//!
//! This crate provides the foundational types shared by the Beamline lattice
//! generator and its tools:
//!
//! - **Identifiers**: Efficient string-interned identifiers ([`identifier::Id`])
//! - **Hardware**: The read-only accelerator description ([`hardware`] module)
//! - **Model**: The generated simulation lattice ([`model`] module)

pub mod hardware;
pub mod identifier;
pub mod model;
