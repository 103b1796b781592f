//! Beamline - simulation lattices from accelerator hardware descriptions.
//!
//! A hardware description is a tree of sequences and devices, each placed
//! relative to its parent. This crate turns such a tree into a model
//! [`Lattice`](model::Lattice): devices become model elements chosen through
//! an [`ElementMapping`](mapping::ElementMapping), thick elements are split
//! around the thin elements inside them, and drift spaces fill every gap.

pub mod config;
pub mod error;
pub mod lattice;
pub mod mapping;
pub mod scenario;
pub mod sync;

pub use beamline_core::{hardware, identifier, model};

pub use error::{BuildNotice, ErrorKind, LatticeError};

use log::{info, trace};

use beamline_core::hardware::HardwareNode;

use config::AppConfig;
use lattice::LatticeSequence;
use mapping::ElementMapping;
use scenario::Scenario;
use sync::SyncRegistry;

/// Generator of lattice scenarios from hardware sequences.
///
/// The generator holds only its [`ElementMapping`]; every call to
/// [`generate_scenario`](Self::generate_scenario) is an independent build, so
/// a single generator can be shared between threads.
///
/// # Examples
///
/// ```rust
/// use beamline::{
///     ScenarioGenerator,
///     hardware::{HardwareNode, NodeClass},
/// };
///
/// let mebt = HardwareNode::new("MEBT", "SEQ", NodeClass::Sequence)
///     .with_length(10.0)
///     .with_node(
///         HardwareNode::new("MEBT_Diag:BPM01", "BPM", NodeClass::Passive).with_position(4.0),
///     );
///
/// let generator = ScenarioGenerator::default();
/// let scenario = generator.generate_scenario(&mebt).expect("Failed to generate");
///
/// // DR1, the BPM marker and DR2
/// assert_eq!(scenario.lattice().len(), 3);
/// ```
#[derive(Debug, Default)]
pub struct ScenarioGenerator {
    mapping: ElementMapping,
}

impl ScenarioGenerator {
    /// Create a new generator using the given element mapping.
    ///
    /// # Arguments
    ///
    /// * `mapping` - Element mapping deciding model types, drifts and build policy
    pub fn new(mapping: ElementMapping) -> Self {
        Self { mapping }
    }

    /// Create a generator from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::Config`] if the mapping configuration is
    /// invalid.
    pub fn from_config(config: &AppConfig) -> Result<Self, LatticeError> {
        ElementMapping::from_config(config.mapping()).map(Self::new)
    }

    pub fn mapping(&self) -> &ElementMapping {
        &self.mapping
    }

    /// Build the lattice for a hardware sequence.
    ///
    /// Combo sequences lay their constituent sequences end to end; any other
    /// sequence places its children at their declared positions. The
    /// returned scenario owns a fresh synchronization registry holding a
    /// binding for every atomic model element.
    ///
    /// # Arguments
    ///
    /// * `root` - Hardware sequence to build the lattice for
    ///
    /// # Errors
    ///
    /// Returns `LatticeError` when the hardware description is invalid, when
    /// elements overlap, when a model element cannot be created, or, in
    /// strict bounds mode, when elements do not fit their sequence.
    pub fn generate_scenario<'h>(&self, root: &'h HardwareNode) -> Result<Scenario<'h>, LatticeError> {
        info!(
            root = root.id().to_string(),
            combo = root.is_combo();
            "Generating lattice"
        );

        root.validate()?;

        let sequence = if root.is_combo() {
            LatticeSequence::combo(root, &self.mapping)?
        } else {
            LatticeSequence::new(root, &self.mapping)?
        };

        let mut registry = SyncRegistry::new();
        let mut notices = Vec::new();
        let lattice = sequence.create_model_lattice(&mut registry, &mut notices)?;

        info!(
            root = root.id().to_string(),
            elements = lattice.len(),
            notices = notices.len();
            "Lattice generated"
        );
        trace!(lattice = lattice.to_string(); "Generated lattice");

        Ok(Scenario::new(root, lattice, registry, notices))
    }
}
