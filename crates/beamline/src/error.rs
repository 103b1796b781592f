//! Error types for lattice generation.
//!
//! Fatal conditions are reported through [`LatticeError`] and abort the whole
//! build. Conditions the generator resolves locally are recorded as
//! [`BuildNotice`]s on the resulting scenario. Both classify themselves with
//! the closed [`ErrorKind`] enumeration.

use std::fmt;

use thiserror::Error;

use beamline_core::{hardware::HardwareError, identifier::Id};

/// Category of a lattice generation condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A hardware type tag had no registered converter; the default was used.
    MappingMiss,
    /// Two thick elements, or an element and a nested sequence, overlap.
    GeometryOverlap,
    /// A converter failed to create the model element for a node.
    ConstructionFailure,
    /// Children fell outside their sequence after axis normalization.
    BoundsCorrection,
    /// Invalid input, configuration or scenario request.
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MappingMiss => "mapping-miss",
            Self::GeometryOverlap => "geometry-overlap",
            Self::ConstructionFailure => "construction-failure",
            Self::BoundsCorrection => "bounds-correction",
            Self::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// Snapshot of a lattice element used in error reports.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDescription {
    pub id: Id,
    pub hardware_id: Id,
    pub start: f64,
    pub end: f64,
    pub thin: bool,
}

impl fmt::Display for ElementDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if self.hardware_id != self.id {
            write!(f, " (hardware {})", self.hardware_id)?;
        }
        write!(f, " [{:.6}, {:.6}]", self.start, self.end)
    }
}

/// Fatal lattice generation errors.
#[derive(Debug, Clone, Error)]
pub enum LatticeError {
    #[error("two covering thick elements: {first} and {second}")]
    Overlap {
        first: ElementDescription,
        second: ElementDescription,
    },

    #[error("collision between nested sequence {sequence} and element {element}")]
    SequenceCollision {
        sequence: ElementDescription,
        element: ElementDescription,
    },

    #[error("cannot create `{type_name}` for node `{node}`: {reason}")]
    Construction {
        node: Id,
        type_name: String,
        reason: String,
    },

    #[error(
        "elements of sequence `{sequence}` span [{min:.6}, {max:.6}], outside [0, {length:.6}]"
    )]
    Bounds {
        sequence: Id,
        min: f64,
        max: f64,
        length: f64,
    },

    #[error("node `{node}` cannot be used as a lattice root: {reason}")]
    InvalidRoot { node: Id, reason: String },

    #[error("invalid hardware description: {0}")]
    Hardware(#[from] HardwareError),

    #[error("no hardware node with id `{0}`")]
    UnknownNode(Id),

    #[error("no model elements are mapped to hardware node `{0}`")]
    UnmappedNode(Id),

    #[error("no model element with id `{0}`")]
    UnknownElement(Id),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LatticeError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Overlap { .. } | Self::SequenceCollision { .. } => ErrorKind::GeometryOverlap,
            Self::Construction { .. } => ErrorKind::ConstructionFailure,
            Self::Bounds { .. } => ErrorKind::BoundsCorrection,
            Self::InvalidRoot { .. }
            | Self::Hardware(_)
            | Self::UnknownNode(_)
            | Self::UnmappedNode(_)
            | Self::UnknownElement(_)
            | Self::Config(_) => ErrorKind::Configuration,
        }
    }
}

/// Non-fatal condition resolved during a build.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildNotice {
    /// The node's type tag was not registered; `fallback` was used instead.
    MappingMiss {
        node: Id,
        type_tag: String,
        fallback: String,
    },
    /// A sequence was shifted by `offset` and resized to fit its children.
    BoundsCorrection {
        sequence: Id,
        offset: f64,
        old_length: f64,
        new_length: f64,
    },
}

impl BuildNotice {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MappingMiss { .. } => ErrorKind::MappingMiss,
            Self::BoundsCorrection { .. } => ErrorKind::BoundsCorrection,
        }
    }
}

impl fmt::Display for BuildNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MappingMiss {
                node,
                type_tag,
                fallback,
            } => write!(
                f,
                "node `{node}` has unmapped type `{type_tag}`, using `{fallback}`"
            ),
            Self::BoundsCorrection {
                sequence,
                offset,
                old_length,
                new_length,
            } => write!(
                f,
                "sequence `{sequence}` shifted by {offset:.6}, length {old_length:.6} -> {new_length:.6}"
            ),
        }
    }
}
