use beamline_core::hardware::HardwareNode;

use super::{
    element::{LatticeElement, SortKey},
    sequence::LatticeSequence,
};
use crate::error::ElementDescription;

/// A child of a [`LatticeSequence`]: an atomic element or a nested sequence.
#[derive(Debug, Clone)]
pub enum LatticeNode<'a> {
    Leaf(LatticeElement<'a>),
    Sequence(LatticeSequence<'a>),
}

impl<'a> LatticeNode<'a> {
    pub fn start(&self) -> f64 {
        match self {
            Self::Leaf(e) => e.start(),
            Self::Sequence(s) => s.start(),
        }
    }

    pub fn center(&self) -> f64 {
        match self {
            Self::Leaf(e) => e.center(),
            Self::Sequence(s) => s.center(),
        }
    }

    pub fn end(&self) -> f64 {
        match self {
            Self::Leaf(e) => e.end(),
            Self::Sequence(s) => s.end(),
        }
    }

    pub fn length(&self) -> f64 {
        self.end() - self.start()
    }

    pub fn is_thin(&self) -> bool {
        match self {
            Self::Leaf(e) => e.is_thin(),
            Self::Sequence(s) => s.is_thin(),
        }
    }

    pub fn sort_key(&self) -> SortKey {
        match self {
            Self::Leaf(e) => e.sort_key(),
            Self::Sequence(s) => s.sort_key(),
        }
    }

    pub fn hardware_node(&self) -> &HardwareNode {
        match self {
            Self::Leaf(e) => e.hardware_node(),
            Self::Sequence(s) => s.hardware_node(),
        }
    }

    pub fn translate(&mut self, offset: f64) {
        match self {
            Self::Leaf(e) => e.translate(offset),
            Self::Sequence(s) => s.translate(offset),
        }
    }

    pub fn description(&self) -> ElementDescription {
        match self {
            Self::Leaf(e) => e.description(),
            Self::Sequence(s) => s.description(),
        }
    }

    /// Whether any coordinate of the node lies before the frame origin.
    pub(crate) fn is_before_origin(&self) -> bool {
        self.start() < 0.0 || self.center() < 0.0 || self.end() < 0.0
    }

    pub fn as_leaf(&self) -> Option<&LatticeElement<'a>> {
        match self {
            Self::Leaf(e) => Some(e),
            Self::Sequence(_) => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&LatticeSequence<'a>> {
        match self {
            Self::Leaf(_) => None,
            Self::Sequence(s) => Some(s),
        }
    }
}
