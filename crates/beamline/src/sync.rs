//! Bindings between model elements and the hardware they represent.
//!
//! The generator hands every atomic model element to a [`SyncSink`] together
//! with its hardware node. [`SyncRegistry`] is the sink a [`Scenario`] keeps;
//! the transport that actually moves live or design values into the model is
//! outside this crate.
//!
//! [`Scenario`]: crate::scenario::Scenario

use std::{fmt, str::FromStr};

use indexmap::IndexMap;

use beamline_core::{hardware::HardwareNode, identifier::Id, model::ModelElement};

use crate::error::LatticeError;

/// Receives each atomic model element as it is created.
pub trait SyncSink {
    fn bind(&mut self, element: &ModelElement, node: &HardwareNode);
}

/// Source of the values used to synchronize the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Live machine readbacks.
    Live,
    /// Design values from the hardware description.
    #[default]
    Design,
    /// Design values for RF, live values for everything else.
    RfDesign,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Live => "LIVE",
            Self::Design => "DESIGN",
            Self::RfDesign => "RF_DESIGN",
        };
        f.write_str(name)
    }
}

impl FromStr for SyncMode {
    type Err = LatticeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LIVE" => Ok(Self::Live),
            "DESIGN" => Ok(Self::Design),
            "RF_DESIGN" => Ok(Self::RfDesign),
            _ => Err(LatticeError::Config(format!(
                "unknown synchronization mode `{s}`"
            ))),
        }
    }
}

/// Registry of hardware node to model element bindings.
#[derive(Debug, Clone, Default)]
pub struct SyncRegistry {
    mode: SyncMode,
    by_node: IndexMap<Id, Vec<Id>>,
    by_element: IndexMap<Id, Id>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SyncMode) {
        self.mode = mode;
    }

    /// Ids of the model elements bound to hardware node `node`, in beam order.
    pub fn elements_mapped_to(&self, node: Id) -> &[Id] {
        self.by_node.get(&node).map(Vec::as_slice).unwrap_or_default()
    }

    /// Hardware node bound to model element `element`.
    pub fn node_for_element(&self, element: Id) -> Option<Id> {
        self.by_element.get(&element).copied()
    }

    /// Bound hardware node ids in binding order.
    pub fn nodes(&self) -> impl Iterator<Item = Id> + '_ {
        self.by_node.keys().copied()
    }

    /// Number of bound hardware nodes.
    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}

impl SyncSink for SyncRegistry {
    fn bind(&mut self, element: &ModelElement, node: &HardwareNode) {
        let elements = self.by_node.entry(node.id()).or_default();
        if !elements.contains(&element.id()) {
            elements.push(element.id());
        }
        self.by_element.insert(element.id(), node.id());
    }
}

#[cfg(test)]
mod tests {
    use beamline_core::hardware::NodeClass;

    use super::*;

    #[test]
    fn test_bind_and_lookup() {
        let quad = HardwareNode::new("Q1", "QH", NodeClass::Magnet);
        let bpm = HardwareNode::new("B1", "BPM", NodeClass::Passive);

        let mut registry = SyncRegistry::new();
        registry.bind(&ModelElement::new(Id::new("Q1"), "IdealMagQuad", false), &quad);
        registry.bind(&ModelElement::new(Id::new("B1"), "Marker", true), &bpm);
        registry.bind(&ModelElement::new(Id::new("Q1"), "IdealMagQuad", false), &quad);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.elements_mapped_to(Id::new("Q1")), &[Id::new("Q1")]);
        assert_eq!(registry.node_for_element(Id::new("B1")), Some(Id::new("B1")));
        assert!(registry.elements_mapped_to(Id::new("Q9")).is_empty());
        let nodes: Vec<Id> = registry.nodes().collect();
        assert_eq!(nodes, vec![Id::new("Q1"), Id::new("B1")]);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(SyncMode::default(), SyncMode::Design);
        assert_eq!("live".parse::<SyncMode>().unwrap(), SyncMode::Live);
        assert_eq!("RF_DESIGN".parse::<SyncMode>().unwrap(), SyncMode::RfDesign);
        assert_eq!(SyncMode::RfDesign.to_string(), "RF_DESIGN");
        assert!("PROBE".parse::<SyncMode>().is_err());
    }
}
