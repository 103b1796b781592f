//! A generated lattice bundled with its hardware bindings.

use log::debug;

use beamline_core::{hardware::HardwareNode, identifier::Id, model::Lattice};

use crate::{
    error::{BuildNotice, LatticeError},
    sync::{SyncMode, SyncRegistry},
};

/// Result of one lattice generation.
///
/// A scenario keeps the hardware tree it was generated from, the model
/// [`Lattice`], the [`SyncRegistry`] binding model elements to hardware
/// nodes, and the notices recorded while building. An optional start and stop
/// element bound the region of interest for downstream simulation.
#[derive(Debug, Clone)]
pub struct Scenario<'h> {
    hardware: &'h HardwareNode,
    lattice: Lattice,
    registry: SyncRegistry,
    notices: Vec<BuildNotice>,
    start: Option<Id>,
    stop: Option<Id>,
    include_stop: bool,
}

impl<'h> Scenario<'h> {
    pub(crate) fn new(
        hardware: &'h HardwareNode,
        lattice: Lattice,
        registry: SyncRegistry,
        notices: Vec<BuildNotice>,
    ) -> Self {
        Self {
            hardware,
            lattice,
            registry,
            notices,
            start: None,
            stop: None,
            include_stop: true,
        }
    }

    pub fn hardware(&self) -> &'h HardwareNode {
        self.hardware
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn sync_registry(&self) -> &SyncRegistry {
        &self.registry
    }

    /// Non-fatal conditions resolved while building the lattice.
    pub fn notices(&self) -> &[BuildNotice] {
        &self.notices
    }

    pub fn synchronization_mode(&self) -> SyncMode {
        self.registry.mode()
    }

    pub fn set_synchronization_mode(&mut self, mode: SyncMode) {
        debug!(mode = mode.to_string(); "Synchronization mode changed");
        self.registry.set_mode(mode);
    }

    /// Looks up a node anywhere in the hardware tree, the root included.
    pub fn node_with_id(&self, id: Id) -> Option<&'h HardwareNode> {
        self.hardware.node_with_id(id)
    }

    /// Ids of the model elements created for hardware node `id`.
    pub fn elements_mapped_to(&self, id: Id) -> &[Id] {
        self.registry.elements_mapped_to(id)
    }

    /// Starts the region of interest at the first element mapped to `node`.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::UnknownNode`] if the node is not part of the
    /// hardware tree and [`LatticeError::UnmappedNode`] if no model element
    /// was created for it.
    pub fn set_start_node(&mut self, node: Id) -> Result<(), LatticeError> {
        self.start = Some(self.first_element_of(node)?);
        Ok(())
    }

    /// Stops the region of interest at the first element mapped to `node`.
    ///
    /// # Errors
    ///
    /// Same as [`set_start_node`](Self::set_start_node).
    pub fn set_stop_node(&mut self, node: Id) -> Result<(), LatticeError> {
        self.stop = Some(self.first_element_of(node)?);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`LatticeError::UnknownElement`] if the lattice has no element
    /// `element`.
    pub fn set_start_element(&mut self, element: Id) -> Result<(), LatticeError> {
        self.start = Some(self.existing_element(element)?);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`LatticeError::UnknownElement`] if the lattice has no element
    /// `element`.
    pub fn set_stop_element(&mut self, element: Id) -> Result<(), LatticeError> {
        self.stop = Some(self.existing_element(element)?);
        Ok(())
    }

    pub fn unset_start_node(&mut self) {
        self.start = None;
    }

    pub fn unset_stop_node(&mut self) {
        self.stop = None;
    }

    pub fn start_element(&self) -> Option<Id> {
        self.start
    }

    pub fn stop_element(&self) -> Option<Id> {
        self.stop
    }

    /// Whether the stop element itself belongs to the region of interest.
    pub fn set_include_stop_element(&mut self, include: bool) {
        self.include_stop = include;
    }

    pub fn includes_stop_element(&self) -> bool {
        self.include_stop
    }

    /// Converts a lattice position to one measured from the start element's
    /// entrance. Without a start element positions are returned unchanged.
    pub fn position_relative_to_start(&self, position: f64) -> f64 {
        let origin = self
            .start
            .and_then(|id| self.lattice.absolute_position(id))
            .unwrap_or(0.0);
        position - origin
    }

    fn first_element_of(&self, node: Id) -> Result<Id, LatticeError> {
        if self.hardware.node_with_id(node).is_none() {
            return Err(LatticeError::UnknownNode(node));
        }
        self.registry
            .elements_mapped_to(node)
            .first()
            .copied()
            .ok_or(LatticeError::UnmappedNode(node))
    }

    fn existing_element(&self, element: Id) -> Result<Id, LatticeError> {
        self.lattice
            .find_element(element)
            .map(|e| e.id())
            .ok_or(LatticeError::UnknownElement(element))
    }
}
