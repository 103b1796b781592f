//! Read-only description of accelerator hardware.
//!
//! A [`HardwareNode`] is either an atomic device (magnet, BPM, RF gap, ...)
//! or a sequence holding an ordered list of child nodes. Positions are
//! expressed in the frame of the immediate parent: an atomic node's
//! [`position`](HardwareNode::position) is its center, a sequence's position
//! is its entrance.
//!
//! The types derive [`serde::Deserialize`] so hardware trees can be loaded
//! from any serde format. The field layout mirrors the builder methods:
//!
//! ```
//! # use beamline_core::hardware::{HardwareNode, NodeClass};
//! let seq = HardwareNode::new("MEBT", "SEQ", NodeClass::Sequence)
//!     .with_length(10.0)
//!     .with_node(
//!         HardwareNode::new("QH01", "QH", NodeClass::Magnet)
//!             .with_position(5.0)
//!             .with_length(2.0),
//!     );
//!
//! assert_eq!(seq.nodes().len(), 1);
//! assert_eq!(seq.entrance_id().unwrap(), "QH01");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identifier::Id;

/// Structural classification of a hardware node.
///
/// The class decides which length the lattice generator sees for a node and
/// whether the node is treated as a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Diagnostics and other devices without a magnetic length.
    #[default]
    Passive,
    /// Magnet with an effective (magnetic) length.
    Magnet,
    /// Bending magnet; its effective length is the design path length.
    Bend,
    /// Electrostatic element using its physical length.
    Electrostatic,
    /// Plain container of nodes.
    Sequence,
    /// Container representing an RF cavity structure.
    RfCavity,
    /// Sequence assembled from independently addressable constituent sequences.
    Combo,
}

impl NodeClass {
    /// Returns `true` for classes that hold child nodes.
    pub fn is_sequence(self) -> bool {
        matches!(self, Self::Sequence | Self::RfCavity | Self::Combo)
    }

    /// Returns `true` for magnet classes.
    pub fn is_magnet(self) -> bool {
        matches!(self, Self::Magnet | Self::Bend)
    }
}

/// RF parameters of a cavity sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RfCavityParams {
    /// Cavity frequency in MHz.
    frequency_mhz: f64,

    /// Structure mode, the phase advance between cells in units of pi.
    #[serde(default)]
    structure_mode: f64,
}

impl RfCavityParams {
    /// Creates cavity parameters from a frequency in MHz and a structure mode.
    pub fn new(frequency_mhz: f64, structure_mode: f64) -> Self {
        Self {
            frequency_mhz,
            structure_mode,
        }
    }

    /// Returns the frequency in MHz.
    pub fn frequency_mhz(&self) -> f64 {
        self.frequency_mhz
    }

    /// Returns the frequency in Hz.
    pub fn frequency_hz(&self) -> f64 {
        self.frequency_mhz * 1e6
    }

    /// Returns the structure mode.
    pub fn structure_mode(&self) -> f64 {
        self.structure_mode
    }
}

/// Problems found while validating a hardware tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HardwareError {
    #[error("node `{id}` has a negative length {length}")]
    NegativeLength { id: Id, length: f64 },

    #[error("node `{id}` has a non-finite position or length")]
    NonFinite { id: Id },

    #[error("atomic node `{id}` declares {count} child node(s)")]
    ChildrenOnDevice { id: Id, count: usize },

    #[error("combo `{id}` contains non-sequence node `{child}`")]
    ComboConstituent { id: Id, child: Id },

    #[error("RF cavity `{id}` declares no `rf` parameters")]
    MissingRfParameters { id: Id },
}

fn enabled_default() -> bool {
    true
}

/// One physical device or grouping of devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareNode {
    id: Id,

    #[serde(rename = "type")]
    type_tag: String,

    #[serde(default)]
    class: NodeClass,

    #[serde(default)]
    position: f64,

    #[serde(default)]
    length: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    effective_length: Option<f64>,

    #[serde(default = "enabled_default")]
    enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    rf: Option<RfCavityParams>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    nodes: Vec<HardwareNode>,
}

impl HardwareNode {
    /// Creates a node at position zero with zero length and no children.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique identifier of the node
    /// * `type_tag` - Device type tag used to look up a model element type
    /// * `class` - Structural class of the node
    pub fn new(id: &str, type_tag: impl Into<String>, class: NodeClass) -> Self {
        Self {
            id: Id::new(id),
            type_tag: type_tag.into(),
            class,
            position: 0.0,
            length: 0.0,
            effective_length: None,
            enabled: true,
            rf: None,
            nodes: Vec::new(),
        }
    }

    /// Creates a combo sequence from constituent sequences laid end to end.
    pub fn combo(id: &str, constituents: Vec<HardwareNode>) -> Self {
        Self::new(id, "COMBO", NodeClass::Combo).with_nodes(constituents)
    }

    pub fn with_position(mut self, position: f64) -> Self {
        self.position = position;
        self
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    pub fn with_effective_length(mut self, length: f64) -> Self {
        self.effective_length = Some(length);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_rf(mut self, rf: RfCavityParams) -> Self {
        self.rf = Some(rf);
        self
    }

    pub fn with_node(mut self, node: HardwareNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<HardwareNode>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn class(&self) -> NodeClass {
        self.class
    }

    /// Position in the parent frame: center for devices, entrance for sequences.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Physical length of the node.
    ///
    /// A combo's length is the sum of its enabled constituents' lengths,
    /// matching the constituents laid end to end in the lattice.
    pub fn length(&self) -> f64 {
        match self.class {
            NodeClass::Combo => self.enabled_nodes().map(HardwareNode::length).sum(),
            _ => self.length,
        }
    }

    /// Length the lattice generator uses for the node.
    ///
    /// Magnets and bends report their effective length when one is declared,
    /// passive devices are point-like unless they declare one.
    pub fn effective_length(&self) -> f64 {
        match self.class {
            NodeClass::Magnet | NodeClass::Bend => self.effective_length.unwrap_or(self.length),
            NodeClass::Passive => self.effective_length.unwrap_or(0.0),
            NodeClass::Electrostatic
            | NodeClass::Sequence
            | NodeClass::RfCavity
            | NodeClass::Combo => self.length(),
        }
    }

    /// Whether the node has good status and takes part in lattice generation.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rf(&self) -> Option<&RfCavityParams> {
        self.rf.as_ref()
    }

    /// All child nodes, including disabled ones.
    pub fn nodes(&self) -> &[HardwareNode] {
        &self.nodes
    }

    /// Child nodes with good status, in declaration order.
    pub fn enabled_nodes(&self) -> impl Iterator<Item = &HardwareNode> {
        self.nodes.iter().filter(|n| n.enabled)
    }

    pub fn is_sequence(&self) -> bool {
        self.class.is_sequence()
    }

    pub fn is_combo(&self) -> bool {
        self.class == NodeClass::Combo
    }

    pub fn is_rf_cavity(&self) -> bool {
        self.class == NodeClass::RfCavity
    }

    pub fn is_magnet(&self) -> bool {
        self.class.is_magnet()
    }

    /// Finds the node with the given id in this subtree, including `self`.
    pub fn node_with_id(&self, id: Id) -> Option<&HardwareNode> {
        if self.id == id {
            return Some(self);
        }
        self.nodes.iter().find_map(|n| n.node_with_id(id))
    }

    /// Returns the id of the first atomic node in this subtree.
    ///
    /// An atomic node is its own entrance.
    pub fn entrance_id(&self) -> Option<Id> {
        if !self.is_sequence() {
            return Some(self.id);
        }
        self.nodes.iter().find_map(HardwareNode::entrance_id)
    }

    /// Checks the subtree for values the lattice generator cannot handle.
    ///
    /// # Errors
    ///
    /// Returns the first [`HardwareError`] found in a depth-first walk.
    pub fn validate(&self) -> Result<(), HardwareError> {
        if !self.position.is_finite()
            || !self.length.is_finite()
            || self.effective_length.is_some_and(|l| !l.is_finite())
        {
            return Err(HardwareError::NonFinite { id: self.id });
        }
        if let Some(length) = [Some(self.length), self.effective_length]
            .into_iter()
            .flatten()
            .find(|l| *l < 0.0)
        {
            return Err(HardwareError::NegativeLength {
                id: self.id,
                length,
            });
        }
        if self.is_rf_cavity() && self.rf.is_none() {
            return Err(HardwareError::MissingRfParameters { id: self.id });
        }
        if !self.is_sequence() && !self.nodes.is_empty() {
            return Err(HardwareError::ChildrenOnDevice {
                id: self.id,
                count: self.nodes.len(),
            });
        }
        if self.is_combo() {
            if let Some(child) = self.nodes.iter().find(|n| !n.is_sequence()) {
                return Err(HardwareError::ComboConstituent {
                    id: self.id,
                    child: child.id,
                });
            }
        }
        self.nodes.iter().try_for_each(HardwareNode::validate)
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use proptest::prelude::*;

    use super::*;

    fn quad(id: &str, position: f64) -> HardwareNode {
        HardwareNode::new(id, "QH", NodeClass::Magnet)
            .with_position(position)
            .with_length(0.4)
    }

    #[test]
    fn test_effective_length_by_class() {
        let magnet = quad("Q1", 1.0).with_effective_length(0.35);
        assert_approx_eq!(f64, magnet.effective_length(), 0.35);

        let plain_magnet = quad("Q2", 1.0);
        assert_approx_eq!(f64, plain_magnet.effective_length(), 0.4);

        let bpm = HardwareNode::new("BPM1", "BPM", NodeClass::Passive).with_length(0.1);
        assert_approx_eq!(f64, bpm.effective_length(), 0.0);

        let ws = HardwareNode::new("WS1", "WS", NodeClass::Passive)
            .with_length(0.1)
            .with_effective_length(0.05);
        assert_approx_eq!(f64, ws.effective_length(), 0.05);

        let esq = HardwareNode::new("EQ1", "EQ", NodeClass::Electrostatic)
            .with_length(0.2)
            .with_effective_length(0.1);
        assert_approx_eq!(f64, esq.effective_length(), 0.2);
    }

    #[test]
    fn test_combo_length_is_sum() {
        let a = HardwareNode::new("A", "SEQ", NodeClass::Sequence).with_length(3.0);
        let b = HardwareNode::new("B", "SEQ", NodeClass::Sequence).with_length(4.5);
        let combo = HardwareNode::combo("AB", vec![a, b]);

        assert!(combo.is_combo());
        assert!(combo.is_sequence());
        assert_approx_eq!(f64, combo.length(), 7.5);
        assert_approx_eq!(f64, combo.effective_length(), 7.5);
    }

    #[test]
    fn test_combo_length_skips_disabled_constituents() {
        let combo = HardwareNode::combo(
            "C",
            vec![
                HardwareNode::new("A", "SEQ", NodeClass::Sequence).with_length(4.0),
                HardwareNode::new("B", "SEQ", NodeClass::Sequence)
                    .with_length(6.0)
                    .with_enabled(false),
                HardwareNode::new("D", "SEQ", NodeClass::Sequence).with_length(2.0),
            ],
        );

        assert_approx_eq!(f64, combo.length(), 6.0);
        assert_eq!(combo.nodes().len(), 3);
    }

    #[test]
    fn test_enabled_nodes_skips_disabled() {
        let seq = HardwareNode::new("S", "SEQ", NodeClass::Sequence)
            .with_node(quad("Q1", 1.0))
            .with_node(quad("Q2", 2.0).with_enabled(false))
            .with_node(quad("Q3", 3.0));

        let ids: Vec<_> = seq.enabled_nodes().map(|n| n.id()).collect();
        assert_eq!(ids, vec![Id::new("Q1"), Id::new("Q3")]);
        assert_eq!(seq.nodes().len(), 3);
    }

    #[test]
    fn test_node_lookup_and_entrance() {
        let inner = HardwareNode::new("INNER", "SEQ", NodeClass::Sequence)
            .with_node(quad("Q2", 0.5));
        let empty = HardwareNode::new("EMPTY", "SEQ", NodeClass::Sequence);
        let root = HardwareNode::new("ROOT", "SEQ", NodeClass::Sequence)
            .with_node(empty)
            .with_node(inner)
            .with_node(quad("Q3", 4.0));

        assert_eq!(root.entrance_id(), Some(Id::new("Q2")));
        assert!(root.node_with_id(Id::new("Q3")).is_some());
        assert!(root.node_with_id(Id::new("ROOT")).is_some());
        assert!(root.node_with_id(Id::new("Q9")).is_none());
        assert_eq!(
            HardwareNode::new("E", "SEQ", NodeClass::Sequence).entrance_id(),
            None
        );
    }

    #[test]
    fn test_rf_frequency_in_hz() {
        let rf = RfCavityParams::new(402.5, 0.5);
        assert_approx_eq!(f64, rf.frequency_hz(), 402.5e6);
        assert_approx_eq!(f64, rf.structure_mode(), 0.5);
    }

    #[test]
    fn test_validate() {
        let ok = HardwareNode::new("S", "SEQ", NodeClass::Sequence).with_node(quad("Q1", 1.0));
        assert!(ok.validate().is_ok());

        let negative = HardwareNode::new("S", "SEQ", NodeClass::Sequence)
            .with_node(quad("Q1", 1.0).with_length(-1.0));
        assert!(matches!(
            negative.validate(),
            Err(HardwareError::NegativeLength { .. })
        ));

        let nested_device = quad("Q1", 1.0).with_node(quad("Q2", 0.0));
        assert!(matches!(
            nested_device.validate(),
            Err(HardwareError::ChildrenOnDevice { count: 1, .. })
        ));

        let combo = HardwareNode::combo("C", vec![quad("Q1", 0.0)]);
        assert!(matches!(
            combo.validate(),
            Err(HardwareError::ComboConstituent { .. })
        ));

        let nan = quad("Q1", f64::NAN);
        assert!(matches!(nan.validate(), Err(HardwareError::NonFinite { .. })));
    }

    #[test]
    fn test_validate_negative_effective_length() {
        let seq = HardwareNode::new("S", "SEQ", NodeClass::Sequence)
            .with_length(10.0)
            .with_node(quad("Q1", 5.0).with_effective_length(-2.0));

        match seq.validate() {
            Err(HardwareError::NegativeLength { id, length }) => {
                assert_eq!(id, "Q1");
                assert_approx_eq!(f64, length, -2.0);
            }
            other => panic!("Expected NegativeLength, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rf_cavity_needs_parameters() {
        let bare = HardwareNode::new("CAV1", "CAV", NodeClass::RfCavity).with_length(1.0);
        assert!(matches!(
            bare.validate(),
            Err(HardwareError::MissingRfParameters { .. })
        ));

        let tuned = bare.with_rf(RfCavityParams::new(402.5, 0.0));
        assert!(tuned.validate().is_ok());
    }

    #[test]
    fn test_deserialize_toml() {
        let source = r#"
            id = "MEBT"
            type = "SEQ"
            class = "sequence"
            length = 10.0

            [[nodes]]
            id = "QH01"
            type = "QH"
            class = "magnet"
            position = 5.0
            length = 2.0

            [[nodes]]
            id = "BPM01"
            type = "BPM"
            position = 7.0
            enabled = false
        "#;
        let node: HardwareNode = toml::from_str(source).unwrap();

        assert_eq!(node.id(), "MEBT");
        assert!(node.is_sequence());
        assert_eq!(node.nodes().len(), 2);
        assert_eq!(node.nodes()[0].class(), NodeClass::Magnet);
        assert_eq!(node.nodes()[1].class(), NodeClass::Passive);
        assert!(!node.nodes()[1].is_enabled());
        assert_eq!(node.enabled_nodes().count(), 1);
    }

    // ===================
    // Property Tests
    // ===================

    fn check_validated_lengths(length: f64, effective: f64) -> Result<(), TestCaseError> {
        let node = quad("Q1", 0.0)
            .with_length(length)
            .with_effective_length(effective);

        match node.validate() {
            Ok(()) => prop_assert!(node.effective_length() >= 0.0 && node.length() >= 0.0),
            Err(HardwareError::NegativeLength { length, .. }) => prop_assert!(length < 0.0),
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
        Ok(())
    }

    fn check_combo_length(lengths: &[(f64, bool)]) -> Result<(), TestCaseError> {
        let constituents = lengths
            .iter()
            .enumerate()
            .map(|(i, &(length, enabled))| {
                HardwareNode::new(format!("S{i}").as_str(), "SEQ", NodeClass::Sequence)
                    .with_length(length)
                    .with_enabled(enabled)
            })
            .collect();
        let combo = HardwareNode::combo("C", constituents);

        let expected: f64 = lengths.iter().filter(|(_, e)| *e).map(|(l, _)| l).sum();
        prop_assert!(float_cmp::approx_eq!(f64, combo.length(), expected, epsilon = 1e-9));
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_validated_lengths(length in -5.0..5.0f64, effective in -5.0..5.0f64) {
            check_validated_lengths(length, effective)?;
        }

        #[test]
        fn prop_combo_length(lengths in prop::collection::vec((0.0..10.0f64, any::<bool>()), 0..6)) {
            check_combo_length(&lengths)?;
        }
    }
}
