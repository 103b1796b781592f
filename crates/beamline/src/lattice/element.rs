//! Positioned interval proxy for one hardware node.

use std::{borrow::Cow, cmp::Ordering, fmt, sync::Arc};

use beamline_core::{
    hardware::{HardwareNode, NodeClass},
    identifier::Id,
    model::ModelElement,
};

use crate::{
    error::{ElementDescription, LatticeError},
    mapping::ElementConverter,
};

/// Positions closer than this are considered equal.
pub const EPS: f64 = 1e-10;

/// Inputs of the lattice element ordering.
///
/// `position` is the center of a thin element and the entrance of a thick
/// one; `index` is the order in which the hardware node was declared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortKey {
    pub position: f64,
    pub thin: bool,
    pub index: usize,
}

/// Orders lattice elements along the beam axis.
///
/// Ties at the same position put thin elements before thick ones, and keep
/// declaration order among elements of the same kind.
pub fn compare(a: SortKey, b: SortKey) -> Ordering {
    a.position
        .total_cmp(&b.position)
        .then_with(|| match (a.thin, b.thin) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.index.cmp(&b.index),
        })
}

/// One hardware node placed on the beam axis of its parent sequence.
///
/// The element owns an interval `[start, end]` in the parent frame with
/// `start <= center <= end`; thin elements collapse to a point. Splitting
/// produces fragments that keep the hardware node and converter of the
/// original and record their part index among `parts` fragments.
#[derive(Clone)]
pub struct LatticeElement<'a> {
    node: Cow<'a, HardwareNode>,
    element_id: Id,
    converter: Arc<dyn ElementConverter>,
    nominal_length: f64,
    start: f64,
    center: f64,
    end: f64,
    part: usize,
    parts: usize,
    index: usize,
    artificial: bool,
}

impl<'a> LatticeElement<'a> {
    /// Places `node` with its center at `position`.
    ///
    /// # Arguments
    ///
    /// * `node` - Hardware node proxied by the element
    /// * `position` - Center of the node in the parent frame
    /// * `converter` - Converter creating the model element
    /// * `index` - Declaration order within the parent sequence
    pub fn new(
        node: &'a HardwareNode,
        position: f64,
        converter: Arc<dyn ElementConverter>,
        index: usize,
    ) -> Self {
        Self::placed(Cow::Borrowed(node), position, converter, index)
    }

    /// Creates a thin marker at the center of a thick magnet.
    ///
    /// The marker stands for an artificial hardware node `<magnet>-Center`
    /// and creates a model element named `CENTER:<magnet>`.
    pub fn center_marker(
        magnet: &HardwareNode,
        position: f64,
        converter: Arc<dyn ElementConverter>,
        index: usize,
    ) -> Self {
        let marker_id = magnet.id().with_suffix("-Center");
        let marker = HardwareNode::new(
            &marker_id.to_string(),
            converter.type_name().to_string(),
            NodeClass::Passive,
        )
        .with_position(position);

        let mut element = Self::placed(Cow::Owned(marker), position, converter, index);
        element.element_id = magnet.id().with_prefix("CENTER:");
        element.artificial = true;
        element
    }

    fn placed(
        node: Cow<'a, HardwareNode>,
        position: f64,
        converter: Arc<dyn ElementConverter>,
        index: usize,
    ) -> Self {
        let nominal_length = node.effective_length();
        let mut element = Self {
            element_id: node.id(),
            node,
            converter,
            nominal_length,
            start: position,
            center: position,
            end: position,
            part: 0,
            parts: 1,
            index,
            artificial: false,
        };
        if !element.is_thin() {
            element.start = position - nominal_length / 2.0;
            element.end = element.start + nominal_length;
        }
        element
    }

    pub fn hardware_node(&self) -> &HardwareNode {
        &self.node
    }

    /// Id given to the model element created from this element.
    pub fn element_id(&self) -> Id {
        self.element_id
    }

    pub fn converter(&self) -> &Arc<dyn ElementConverter> {
        &self.converter
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn center(&self) -> f64 {
        self.center
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    /// Current extent, which shrinks as the element is split.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Whether the element is point-like.
    ///
    /// Decided by the hardware length before any split, or by the converter.
    pub fn is_thin(&self) -> bool {
        self.nominal_length == 0.0 || self.converter.is_thin()
    }

    /// Whether the element has no hardware counterpart.
    pub fn is_artificial(&self) -> bool {
        self.artificial
    }

    /// Index of this fragment among [`parts`](Self::parts) fragments.
    pub fn part(&self) -> usize {
        self.part
    }

    pub fn parts(&self) -> usize {
        self.parts
    }

    /// An element that has never been split.
    pub fn is_whole(&self) -> bool {
        self.parts == 1
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn sort_key(&self) -> SortKey {
        SortKey {
            position: if self.is_thin() { self.center } else { self.start },
            thin: self.is_thin(),
            index: self.index,
        }
    }

    /// Whether this element lies within `[start, end]`.
    pub fn is_contained_in(&self, start: f64, end: f64) -> bool {
        self.start >= start && self.end <= end
    }

    /// Moves the element along the axis by `offset`.
    pub fn translate(&mut self, offset: f64) {
        self.start += offset;
        self.center += offset;
        self.end += offset;
    }

    /// Splits the element at `position`.
    ///
    /// This element keeps `[start, position]` and the returned fragment covers
    /// `[position, end]`. Returns `None` without modifying anything when
    /// `position` coincides with either end.
    pub fn split_at(&mut self, position: f64) -> Option<Self> {
        if position == self.start || position == self.end {
            return None;
        }

        let mut tail = self.clone();
        tail.start = position;
        tail.center = (position + tail.end) / 2.0;
        tail.part = 2 * self.part + 1;
        tail.parts = 2 * self.parts;

        self.end = position;
        self.center = (self.start + position) / 2.0;
        self.part *= 2;
        self.parts *= 2;

        Some(tail)
    }

    pub fn description(&self) -> ElementDescription {
        ElementDescription {
            id: self.element_id,
            hardware_id: self.node.id(),
            start: self.start,
            end: self.end,
            thin: self.is_thin(),
        }
    }

    /// Creates the model element for this element.
    ///
    /// The result carries this element's id, hardware id and center
    /// position; thick elements also get their current length.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::Construction`] when the converter fails.
    pub fn convert(&self) -> Result<ModelElement, LatticeError> {
        let mut element =
            self.converter
                .create(&self.node)
                .map_err(|err| LatticeError::Construction {
                    node: self.node.id(),
                    type_name: self.converter.type_name().to_string(),
                    reason: err.to_string(),
                })?;

        element.set_id(self.element_id);
        element.set_hardware_id(self.node.id());
        element.set_position(self.center);
        if !self.is_thin() {
            element.set_length(self.length());
        }
        Ok(element)
    }
}

impl fmt::Debug for LatticeElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatticeElement")
            .field("id", &self.element_id)
            .field("type", &self.converter.type_name())
            .field("start", &self.start)
            .field("end", &self.end)
            .field("thin", &self.is_thin())
            .field("part", &format_args!("{}/{}", self.part, self.parts))
            .finish()
    }
}

impl fmt::Display for LatticeElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: I=[{:.6}, {:.6}], p={:.6}, l={:.6}",
            self.element_id,
            self.start,
            self.end,
            self.center,
            self.length()
        )
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::{approx_eq, assert_approx_eq};
    use proptest::prelude::*;

    use super::*;
    use crate::mapping::{BasicConverter, ConversionError, FnConverter};

    fn thick() -> Arc<dyn ElementConverter> {
        Arc::new(BasicConverter::thick("IdealMagQuad"))
    }

    fn thin() -> Arc<dyn ElementConverter> {
        Arc::new(BasicConverter::thin("Marker"))
    }

    fn magnet(id: &str, length: f64) -> HardwareNode {
        HardwareNode::new(id, "QH", NodeClass::Magnet).with_length(length)
    }

    #[test]
    fn test_thick_interval() {
        let node = magnet("Q1", 2.0);
        let element = LatticeElement::new(&node, 5.0, thick(), 0);

        assert!(!element.is_thin());
        assert_approx_eq!(f64, element.start(), 4.0);
        assert_approx_eq!(f64, element.center(), 5.0);
        assert_approx_eq!(f64, element.end(), 6.0);
        assert!(element.is_whole());
    }

    #[test]
    fn test_thin_by_length_or_converter() {
        let bpm = HardwareNode::new("B1", "BPM", NodeClass::Passive).with_length(0.3);
        let by_length = LatticeElement::new(&bpm, 3.0, thick(), 0);
        assert!(by_length.is_thin());
        assert_approx_eq!(f64, by_length.length(), 0.0);

        let kicker = magnet("DCH1", 0.2);
        let by_converter = LatticeElement::new(&kicker, 3.0, thin(), 0);
        assert!(by_converter.is_thin());
        assert_approx_eq!(f64, by_converter.start(), 3.0);
        assert_approx_eq!(f64, by_converter.end(), 3.0);
    }

    #[test]
    fn test_split_at_interior_point() {
        let node = magnet("Q1", 4.0);
        let mut head = LatticeElement::new(&node, 4.0, thick(), 0);

        let tail = head.split_at(3.0).unwrap();

        assert_approx_eq!(f64, head.start(), 2.0);
        assert_approx_eq!(f64, head.end(), 3.0);
        assert_approx_eq!(f64, tail.start(), 3.0);
        assert_approx_eq!(f64, tail.end(), 6.0);
        assert_approx_eq!(f64, tail.center(), 4.5);
        assert_eq!((head.part(), head.parts()), (0, 2));
        assert_eq!((tail.part(), tail.parts()), (1, 2));
        assert!(!tail.is_thin());
        assert_eq!(tail.element_id(), head.element_id());
    }

    #[test]
    fn test_split_at_boundary_is_noop() {
        let node = magnet("Q1", 4.0);
        let mut element = LatticeElement::new(&node, 4.0, thick(), 0);

        assert!(element.split_at(2.0).is_none());
        assert!(element.split_at(6.0).is_none());
        assert!(element.is_whole());
        assert_approx_eq!(f64, element.length(), 4.0);
    }

    #[test]
    fn test_repeated_split_doubles_parts() {
        let node = magnet("Q1", 4.0);
        let mut head = LatticeElement::new(&node, 2.0, thick(), 0);
        let mut tail = head.split_at(1.0).unwrap();
        let last = tail.split_at(3.0).unwrap();

        assert_eq!((tail.part(), tail.parts()), (2, 4));
        assert_eq!((last.part(), last.parts()), (3, 4));
    }

    #[test]
    fn test_ordering_rules() {
        let at = |position, thin, index| SortKey {
            position,
            thin,
            index,
        };

        assert_eq!(compare(at(1.0, false, 5), at(2.0, true, 0)), Ordering::Less);
        assert_eq!(compare(at(2.0, true, 3), at(2.0, true, 1)), Ordering::Greater);
        assert_eq!(compare(at(2.0, true, 9), at(2.0, false, 0)), Ordering::Less);
        assert_eq!(compare(at(2.0, false, 0), at(2.0, true, 9)), Ordering::Greater);
        assert_eq!(compare(at(2.0, false, 1), at(2.0, false, 2)), Ordering::Less);
    }

    #[test]
    fn test_center_marker() {
        let node = magnet("QH01", 2.0);
        let marker = LatticeElement::center_marker(&node, 5.0, thin(), 3);

        assert!(marker.is_thin());
        assert!(marker.is_artificial());
        assert_eq!(marker.element_id(), "CENTER:QH01");
        assert_eq!(marker.hardware_node().id(), "QH01-Center");
        assert_approx_eq!(f64, marker.start(), 5.0);
        assert_eq!(marker.index(), 3);
    }

    #[test]
    fn test_convert_thick_and_thin() {
        let node = magnet("Q1", 2.0);
        let mut element = LatticeElement::new(&node, 5.0, thick(), 0);
        let _tail = element.split_at(5.5);

        let model = element.convert().unwrap();
        assert_eq!(model.id(), "Q1");
        assert_eq!(model.type_name(), "IdealMagQuad");
        assert_approx_eq!(f64, model.position(), 4.75);
        assert_approx_eq!(f64, model.length(), 1.5);

        let bpm = HardwareNode::new("B1", "BPM", NodeClass::Passive);
        let model = LatticeElement::new(&bpm, 7.0, thin(), 1).convert().unwrap();
        assert!(model.is_thin());
        assert_approx_eq!(f64, model.length(), 0.0);
        assert_approx_eq!(f64, model.position(), 7.0);
    }

    #[test]
    fn test_convert_failure_is_construction_error() {
        let failing: Arc<dyn ElementConverter> = Arc::new(FnConverter::new("Broken", false, |_| {
            Err(ConversionError::new("unsupported"))
        }));
        let node = magnet("Q1", 1.0);
        let err = LatticeElement::new(&node, 1.0, failing, 0)
            .convert()
            .unwrap_err();

        assert!(matches!(err, LatticeError::Construction { .. }));
        assert_eq!(err.to_string(), "cannot create `Broken` for node `Q1`: unsupported");
    }

    // ===================
    // Property Tests
    // ===================

    fn check_interval_invariant(length: f64, position: f64) -> Result<(), TestCaseError> {
        let node = magnet("P", length);
        let element = LatticeElement::new(&node, position, thick(), 0);

        prop_assert!(element.start() <= element.center());
        prop_assert!(element.center() <= element.end());
        if element.is_thin() {
            prop_assert_eq!(element.start(), element.end());
            prop_assert_eq!(element.start(), element.center());
        }
        Ok(())
    }

    fn check_split_conserves_length(length: f64, fraction: f64) -> Result<(), TestCaseError> {
        let node = magnet("P", length);
        let mut head = LatticeElement::new(&node, 10.0, thick(), 0);
        let original = head.length();
        let cut = head.start() + fraction * original;

        let tail = head.split_at(cut).expect("interior cut splits");

        prop_assert!(approx_eq!(f64, head.end(), cut));
        prop_assert!(approx_eq!(f64, tail.start(), cut));
        prop_assert!(approx_eq!(f64, head.length() + tail.length(), original, epsilon = 1e-9));
        prop_assert!(head.start() <= head.center() && head.center() <= head.end());
        prop_assert!(tail.start() <= tail.center() && tail.center() <= tail.end());
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_interval_invariant(length in 0.0..20.0f64, position in -50.0..50.0f64) {
            check_interval_invariant(length, position)?;
        }

        #[test]
        fn prop_split_conserves_length(length in 0.01..20.0f64, fraction in 0.01..0.99f64) {
            check_split_conserves_length(length, fraction)?;
        }
    }
}
