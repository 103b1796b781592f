//! Composite lattice element and its build pipeline.
//!
//! A [`LatticeSequence`] proxies one hardware sequence. It is built by a
//! chain of phases, each consuming the sequence and returning the next
//! snapshot:
//!
//! 1. [`populate`](LatticeSequence::populate) - place every enabled child node
//! 2. [`enforce_axis_origin`](LatticeSequence::enforce_axis_origin) - move the
//!    frame origin to the sequence entrance
//! 3. [`place_orphaned_elements`](LatticeSequence::place_orphaned_elements) -
//!    push elements down into the sub-sequences that contain them
//! 4. [`sort_elements`](LatticeSequence::sort_elements) - order by position
//! 5. [`split_sequence_elements`](LatticeSequence::split_sequence_elements) -
//!    split thick elements at thin ones and reject overlaps
//! 6. [`create_model_elements`](LatticeSequence::create_model_elements) -
//!    materialize model elements with drifts in between

use std::sync::Arc;

use log::{debug, trace, warn};

use beamline_core::{
    hardware::{HardwareNode, RfCavityParams},
    identifier::Id,
    model::{Lattice, ModelElement, ModelSequence},
};

use super::{
    element::{self, EPS, LatticeElement, SortKey},
    node::LatticeNode,
};
use crate::{
    config::BoundsMode,
    error::{BuildNotice, ElementDescription, LatticeError},
    mapping::{ElementConverter, ElementMapping},
    sync::SyncSink,
};

/// How a sequence lays out its child sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Children are placed at their declared positions.
    Plain,
    /// Constituent sequences are laid end to end.
    Combo,
}

/// One hardware sequence placed on the beam axis, with its children.
#[derive(Debug, Clone)]
pub struct LatticeSequence<'a> {
    node: &'a HardwareNode,
    mapping: &'a ElementMapping,
    type_name: &'a str,
    layout: Layout,
    start: f64,
    end: f64,
    index: usize,
    origin_centered: bool,
    rf: Option<RfCavityParams>,
    children: Vec<LatticeNode<'a>>,
}

impl<'a> LatticeSequence<'a> {
    /// Creates the root sequence for `node`, spanning `[0, length]`.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::InvalidRoot`] if `node` is not a sequence.
    pub fn new(node: &'a HardwareNode, mapping: &'a ElementMapping) -> Result<Self, LatticeError> {
        if !node.is_sequence() {
            return Err(LatticeError::InvalidRoot {
                node: node.id(),
                reason: format!("`{}` is not a sequence", node.type_tag()),
            });
        }
        let layout = if node.is_combo() {
            Layout::Combo
        } else {
            Layout::Plain
        };
        Ok(Self::placed(node, mapping, layout, 0.0, 0))
    }

    /// Creates the root sequence for a combo of constituent sequences.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::InvalidRoot`] if `node` is not a combo.
    pub fn combo(node: &'a HardwareNode, mapping: &'a ElementMapping) -> Result<Self, LatticeError> {
        if !node.is_combo() {
            return Err(LatticeError::InvalidRoot {
                node: node.id(),
                reason: "not a combo sequence".to_string(),
            });
        }
        Ok(Self::placed(node, mapping, Layout::Combo, 0.0, 0))
    }

    fn placed(
        node: &'a HardwareNode,
        mapping: &'a ElementMapping,
        layout: Layout,
        entrance: f64,
        index: usize,
    ) -> Self {
        // Validated cavities always carry their RF parameters
        let rf = node.rf().copied().filter(|_| node.is_rf_cavity());
        Self {
            node,
            mapping,
            type_name: mapping.model_sequence_type(node),
            layout,
            start: entrance,
            end: entrance + node.length(),
            index,
            origin_centered: false,
            rf,
            children: Vec::new(),
        }
    }

    /// Overrides the axis origin flag.
    ///
    /// A centered origin means child positions were given relative to the
    /// sequence center.
    pub fn with_axis_origin_centered(mut self, centered: bool) -> Self {
        self.origin_centered = centered;
        self
    }

    pub fn hardware_node(&self) -> &'a HardwareNode {
        self.node
    }

    pub fn type_name(&self) -> &str {
        self.type_name
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn center(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_thin(&self) -> bool {
        self.length() == 0.0
    }

    pub fn is_axis_origin_centered(&self) -> bool {
        self.origin_centered
    }

    pub fn is_rf_cavity(&self) -> bool {
        self.node.is_rf_cavity()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Direct children in their current order.
    pub fn children(&self) -> &[LatticeNode<'a>] {
        &self.children
    }

    /// Direct child sequences.
    pub fn sub_sequences(&self) -> impl Iterator<Item = &LatticeSequence<'a>> {
        self.children.iter().filter_map(LatticeNode::as_sequence)
    }

    pub fn sort_key(&self) -> SortKey {
        SortKey {
            position: if self.is_thin() {
                self.center()
            } else {
                self.start
            },
            thin: self.is_thin(),
            index: self.index,
        }
    }

    pub fn translate(&mut self, offset: f64) {
        self.start += offset;
        self.end += offset;
    }

    pub fn description(&self) -> ElementDescription {
        ElementDescription {
            id: self.node.id(),
            hardware_id: self.node.id(),
            start: self.start,
            end: self.end,
            thin: self.is_thin(),
        }
    }

    fn push_child(&mut self, child: LatticeNode<'a>) {
        if child.is_before_origin() {
            self.origin_centered = true;
        }
        self.children.push(child);
    }

    fn converter_for(
        &self,
        node: &HardwareNode,
        notices: &mut Vec<BuildNotice>,
    ) -> Arc<dyn ElementConverter> {
        if let Some(converter) = self.mapping.model_element_type(node) {
            return Arc::clone(converter);
        }
        let fallback = self.mapping.default_converter();
        debug!(
            node = node.id().to_string(),
            type_tag = node.type_tag(),
            fallback = fallback.type_name();
            "Unmapped hardware type, using default converter"
        );
        notices.push(BuildNotice::MappingMiss {
            node: node.id(),
            type_tag: node.type_tag().to_string(),
            fallback: fallback.type_name().to_string(),
        });
        Arc::clone(fallback)
    }

    /// Places every enabled child of the hardware sequence.
    ///
    /// Child sequences are populated recursively and take their axis origin
    /// flag from the mapping policy. Thick magnets get a thin center marker
    /// when the mapping divides magnets. The sequence grows to cover any
    /// atomic child extending past its declared end. A root sequence with
    /// children before its entrance is flagged as centered.
    pub fn populate(mut self, notices: &mut Vec<BuildNotice>) -> Self {
        let node = self.node;
        let mapping = self.mapping;
        let mut length = self.length();

        if self.layout == Layout::Combo {
            let mut entrance = 0.0;
            for (index, constituent) in node.enabled_nodes().enumerate() {
                let child = Self::placed(constituent, mapping, Layout::Plain, entrance, index)
                    .populate(notices)
                    .with_axis_origin_centered(false);
                entrance += child.length();
                self.children.push(LatticeNode::Sequence(child));
            }
            self.end = self.start + length.max(entrance);
            debug!(
                sequence = node.id().to_string(),
                constituents = self.children.len(),
                length = self.length();
                "Combo sequence populated"
            );
            return self;
        }

        let mut index = 0;
        for child in node.enabled_nodes() {
            if child.is_sequence() {
                let sub = Self::placed(child, mapping, Layout::Plain, child.position(), index)
                    .populate(notices)
                    .with_axis_origin_centered(mapping.is_subsection_axis_origin_centered());
                index += 1;
                self.push_child(LatticeNode::Sequence(sub));
                continue;
            }

            let converter = self.converter_for(child, notices);
            let element = LatticeElement::new(child, child.position(), converter, index);
            index += 1;

            if mapping.is_debugging() {
                debug!(
                    sequence = node.id().to_string(),
                    element = element.to_string(),
                    thin = element.is_thin();
                    "Populated element"
                );
            }

            length = length.max(element.end());

            let needs_marker =
                mapping.is_magnet_divided() && child.is_magnet() && !element.is_thin();
            let center = element.center();
            let element_index = element.index();
            self.push_child(LatticeNode::Leaf(element));

            if needs_marker {
                let marker = LatticeElement::center_marker(
                    child,
                    center,
                    Arc::clone(mapping.default_converter()),
                    element_index,
                );
                self.push_child(LatticeNode::Leaf(marker));
            }
        }

        self.end = self.start + length;
        debug!(
            sequence = node.id().to_string(),
            children = self.children.len(),
            length = self.length(),
            centered = self.origin_centered;
            "Sequence populated"
        );
        self
    }

    /// Moves the frame origin of this sequence and its sub-sequences to the
    /// sequence entrance.
    ///
    /// A centered sequence translates its children by `+length/2` and itself
    /// by `-length/2`, then clears the flag. Children left outside
    /// `[0, length]` are handled according to the mapping's [`BoundsMode`].
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::Bounds`] in strict mode when children do not
    /// fit the sequence.
    pub fn enforce_axis_origin(mut self, notices: &mut Vec<BuildNotice>) -> Result<Self, LatticeError> {
        self.children = std::mem::take(&mut self.children)
            .into_iter()
            .map(|child| match child {
                LatticeNode::Sequence(sub) => {
                    sub.enforce_axis_origin(notices).map(LatticeNode::Sequence)
                }
                leaf => Ok(leaf),
            })
            .collect::<Result<_, _>>()?;

        if self.origin_centered {
            let offset = self.length() / 2.0;
            for child in &mut self.children {
                child.translate(offset);
            }
            self.translate(-offset);
            self.origin_centered = false;
            debug!(sequence = self.node.id().to_string(), offset; "Axis origin moved to entrance");
        }

        if self.children.is_empty() {
            return Ok(self);
        }

        let min = self
            .children
            .iter()
            .map(LatticeNode::start)
            .fold(f64::INFINITY, f64::min);
        let max = self
            .children
            .iter()
            .map(LatticeNode::end)
            .fold(f64::NEG_INFINITY, f64::max);
        let length = self.length();

        if min >= -EPS && max <= length + EPS {
            return Ok(self);
        }

        if self.mapping.bounds_mode() == BoundsMode::Strict {
            return Err(LatticeError::Bounds {
                sequence: self.node.id(),
                min,
                max,
                length,
            });
        }

        let shift = min.min(0.0);
        for child in &mut self.children {
            child.translate(-shift);
        }
        self.start += shift;
        let new_length = length.max(max) - shift;
        self.end = self.start + new_length;

        warn!(
            sequence = self.node.id().to_string(),
            min,
            max,
            old_length = length,
            new_length;
            "Elements do not fit their sequence, bounds corrected"
        );
        notices.push(BuildNotice::BoundsCorrection {
            sequence: self.node.id(),
            offset: -shift,
            old_length: length,
            new_length,
        });
        Ok(self)
    }

    /// Moves direct atomic children lying inside a sub-sequence into it.
    ///
    /// Moved elements are translated into the sub-sequence frame. An element
    /// contained in several sub-sequences goes to the first one. The pass
    /// then repeats inside every sub-sequence.
    pub fn place_orphaned_elements(mut self) -> Self {
        let containers: Vec<(usize, f64, f64)> = self
            .children
            .iter()
            .enumerate()
            .filter_map(|(i, child)| child.as_sequence().map(|s| (i, s.start, s.end)))
            .collect();

        if containers.is_empty() {
            return self;
        }

        let children = std::mem::take(&mut self.children);
        let mut kept: Vec<LatticeNode<'a>> = Vec::with_capacity(children.len());
        let mut position_of = vec![0; children.len()];
        let mut orphans = Vec::new();

        for (i, child) in children.into_iter().enumerate() {
            match child {
                LatticeNode::Leaf(leaf) => {
                    let container = containers
                        .iter()
                        .find(|(_, start, end)| leaf.is_contained_in(*start, *end));
                    match container {
                        Some(&(target, _, _)) => orphans.push((target, leaf)),
                        None => kept.push(LatticeNode::Leaf(leaf)),
                    }
                }
                sequence => {
                    position_of[i] = kept.len();
                    kept.push(sequence);
                }
            }
        }

        for (target, mut leaf) in orphans {
            if let LatticeNode::Sequence(sub) = &mut kept[position_of[target]] {
                leaf.translate(-sub.start);
                debug!(
                    element = leaf.element_id().to_string(),
                    from = self.node.id().to_string(),
                    to = sub.node.id().to_string();
                    "Orphaned element moved into sub-sequence"
                );
                sub.children.push(LatticeNode::Leaf(leaf));
            }
        }

        self.children = kept
            .into_iter()
            .map(|child| match child {
                LatticeNode::Sequence(sub) => LatticeNode::Sequence(sub.place_orphaned_elements()),
                leaf => leaf,
            })
            .collect();
        self
    }

    /// Stable sort of the children of this sequence and every sub-sequence.
    pub fn sort_elements(mut self) -> Self {
        self.children
            .sort_by(|a, b| element::compare(a.sort_key(), b.sort_key()));
        self.children = std::mem::take(&mut self.children)
            .into_iter()
            .map(|child| match child {
                LatticeNode::Sequence(sub) => LatticeNode::Sequence(sub.sort_elements()),
                leaf => leaf,
            })
            .collect();
        self
    }

    /// Splits thick children at the thin children they contain.
    ///
    /// A single sweep over the sorted children keeps the last open thick
    /// element. Thin children inside it split it; a thick child or a nested
    /// sequence overlapping it aborts the build. Nested sequences are split
    /// recursively when they are emitted.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::Overlap`] for two covering thick elements and
    /// [`LatticeError::SequenceCollision`] when an element intrudes into a
    /// nested sequence.
    pub fn split_sequence_elements(mut self) -> Result<Self, LatticeError> {
        let children = std::mem::take(&mut self.children);
        let mut split = Vec::with_capacity(children.len());
        let mut last_thick: Option<LatticeNode<'a>> = None;

        for current in children {
            last_thick = match last_thick.take() {
                None => self.open(current, &mut split)?,
                Some(LatticeNode::Sequence(sequence)) => {
                    if current.start() - sequence.end < -EPS {
                        return Err(LatticeError::SequenceCollision {
                            sequence: sequence.description(),
                            element: current.description(),
                        });
                    }
                    self.emit(LatticeNode::Sequence(sequence), &mut split)?;
                    self.open(current, &mut split)?
                }
                Some(LatticeNode::Leaf(mut thick)) => {
                    if thick.end() - current.start() <= EPS {
                        self.emit(LatticeNode::Leaf(thick), &mut split)?;
                        self.open(current, &mut split)?
                    } else if current.is_thin() {
                        let position = current.center();
                        let tail = thick.split_at(position);
                        if self.mapping.is_debugging() {
                            debug!(
                                element = thick.to_string(),
                                at = position;
                                "Split thick element"
                            );
                        }

                        let mut open = None;
                        if thick.end() <= position {
                            self.emit(LatticeNode::Leaf(thick), &mut split)?;
                        } else {
                            open = Some(LatticeNode::Leaf(thick));
                        }
                        self.emit(current, &mut split)?;
                        if let Some(tail) = tail {
                            open = Some(LatticeNode::Leaf(tail));
                        }
                        open
                    } else {
                        return Err(LatticeError::Overlap {
                            first: thick.description(),
                            second: current.description(),
                        });
                    }
                }
            };
        }

        if let Some(last) = last_thick {
            self.emit(last, &mut split)?;
        }

        trace!(
            sequence = self.node.id().to_string(),
            children = split.len();
            "Sequence split"
        );
        self.children = split;
        Ok(self)
    }

    /// Emits a thin child, or returns a thick one as the new open element.
    fn open(
        &self,
        current: LatticeNode<'a>,
        split: &mut Vec<LatticeNode<'a>>,
    ) -> Result<Option<LatticeNode<'a>>, LatticeError> {
        if current.is_thin() {
            self.emit(current, split)?;
            Ok(None)
        } else {
            Ok(Some(current))
        }
    }

    /// Appends a finished child to the split list.
    ///
    /// Sequences are split first. Fragments of negligible length are dropped;
    /// unsplit elements are always kept.
    fn emit(&self, node: LatticeNode<'a>, split: &mut Vec<LatticeNode<'a>>) -> Result<(), LatticeError> {
        match node {
            LatticeNode::Sequence(sequence) => {
                split.push(LatticeNode::Sequence(sequence.split_sequence_elements()?));
            }
            LatticeNode::Leaf(leaf) => {
                if leaf.length() > EPS || leaf.is_whole() {
                    split.push(LatticeNode::Leaf(leaf));
                } else {
                    trace!(element = leaf.to_string(); "Dropped degenerate fragment");
                }
            }
        }
        Ok(())
    }

    /// Creates the model sequence with drifts filling every gap.
    ///
    /// Every atomic model element is bound to its hardware node through
    /// `sink`. Drifts are numbered `DR1`, `DR2`, ... within each sequence and
    /// are RF cavity drifts inside cavities.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::Construction`] when a converter fails.
    pub fn create_model_elements(&self, sink: &mut dyn SyncSink) -> Result<ModelSequence, LatticeError> {
        let mut sequence = ModelSequence::new(self.node.id(), self.type_name);
        sequence.set_hardware_id(self.node.id());
        sequence.set_position(self.center());
        sequence.set_length(self.length());

        let mut last = 0.0;
        let mut drifts = 1;

        for child in &self.children {
            let entrance = if child.is_thin() {
                child.center()
            } else {
                child.start()
            };
            let gap = entrance - last;
            if gap > EPS {
                sequence.push(self.create_drift(drifts, last, gap));
                drifts += 1;
            }

            match child {
                LatticeNode::Sequence(sub) => {
                    sequence.push(sub.create_model_elements(sink)?);
                    last = sub.end;
                }
                LatticeNode::Leaf(leaf) => {
                    let element = leaf.convert()?;
                    sink.bind(&element, leaf.hardware_node());
                    if self.mapping.is_debugging() {
                        debug!(
                            node = leaf.hardware_node().id().to_string(),
                            model = element.type_name(),
                            position = leaf.center();
                            "Mapped element"
                        );
                    }
                    sequence.push(element);
                    last = leaf.end();
                }
            }
        }

        let gap = self.length() - last;
        if gap > EPS {
            sequence.push(self.create_drift(drifts, last, gap));
        }

        Ok(sequence)
    }

    fn create_drift(&self, index: usize, entrance: f64, length: f64) -> ModelElement {
        let id = Id::indexed("DR", index);
        let mut drift = match &self.rf {
            Some(rf) => self.mapping.create_rf_cavity_drift(
                id,
                length,
                rf.frequency_hz(),
                rf.structure_mode(),
            ),
            None => self.mapping.create_default_drift(id, length),
        };
        drift.set_position(entrance + length / 2.0);
        drift
    }

    /// Runs every build phase and wraps the result in a [`Lattice`].
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`LatticeError`]; no partial lattice is
    /// produced.
    pub fn create_model_lattice(
        self,
        sink: &mut dyn SyncSink,
        notices: &mut Vec<BuildNotice>,
    ) -> Result<Lattice, LatticeError> {
        let node = self.node;
        let mut root = self
            .populate(notices)
            .enforce_axis_origin(notices)?
            .place_orphaned_elements()
            .sort_elements()
            .split_sequence_elements()?
            .create_model_elements(sink)?;

        // The root lives in its own frame, spanning [0, length]
        root.set_position(root.length() / 2.0);

        Ok(Lattice::new(root)
            .with_hardware_id(node.entrance_id())
            .with_version(format!("Version soft type: {}", node.type_tag()))
            .with_comment(format!("Sequence ID: {}", node.id()))
            .with_comment(format!(
                "Generated by beamline {}",
                env!("CARGO_PKG_VERSION")
            )))
    }
}
