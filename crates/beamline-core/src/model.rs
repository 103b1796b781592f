//! Simulation lattice produced by the generator.
//!
//! The output is a tree: a [`Lattice`] owns a root [`ModelSequence`], whose
//! [`LatticeComponent`]s are either [`ModelElement`]s (including synthesized
//! drifts) or nested sequences. All positions are centers expressed in the
//! frame of the immediate parent sequence, with the parent entrance at zero.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::identifier::Id;

/// One model element of the simulation lattice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelElement {
    id: Id,
    type_name: String,
    hardware_id: Option<Id>,
    position: f64,
    length: f64,
    thin: bool,
    params: IndexMap<String, f64>,
}

impl ModelElement {
    /// Creates an element of the given model type at position zero.
    ///
    /// # Arguments
    ///
    /// * `id` - Element identifier
    /// * `type_name` - Model element type, e.g. `IdealMagQuad`
    /// * `thin` - Whether the element type is point-like
    pub fn new(id: Id, type_name: impl Into<String>, thin: bool) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            hardware_id: None,
            position: 0.0,
            length: 0.0,
            thin,
            params: IndexMap::new(),
        }
    }

    /// Sets a named numeric parameter, returning the element.
    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set_param(name, value);
        self
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: f64) {
        self.params.insert(name.into(), value);
    }

    pub fn set_id(&mut self, id: Id) {
        self.id = id;
    }

    pub fn set_hardware_id(&mut self, id: Id) {
        self.hardware_id = Some(id);
    }

    /// Sets the center position in the parent frame.
    pub fn set_position(&mut self, position: f64) {
        self.position = position;
    }

    pub fn set_length(&mut self, length: f64) {
        self.length = length;
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Id of the hardware node this element models, if any.
    pub fn hardware_id(&self) -> Option<Id> {
        self.hardware_id
    }

    /// Center position in the parent frame.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn is_thin(&self) -> bool {
        self.thin
    }

    pub fn param(&self, name: &str) -> Option<f64> {
        self.params.get(name).copied()
    }

    pub fn params(&self) -> &IndexMap<String, f64> {
        &self.params
    }

    pub fn entrance(&self) -> f64 {
        self.position - self.length / 2.0
    }

    pub fn exit(&self) -> f64 {
        self.position + self.length / 2.0
    }
}

/// A composite of model components mirroring one hardware sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSequence {
    id: Id,
    type_name: String,
    hardware_id: Option<Id>,
    position: f64,
    length: f64,
    components: Vec<LatticeComponent>,
}

impl ModelSequence {
    pub fn new(id: Id, type_name: impl Into<String>) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            hardware_id: None,
            position: 0.0,
            length: 0.0,
            components: Vec::new(),
        }
    }

    pub fn set_hardware_id(&mut self, id: Id) {
        self.hardware_id = Some(id);
    }

    /// Sets the center position in the parent frame.
    pub fn set_position(&mut self, position: f64) {
        self.position = position;
    }

    pub fn set_length(&mut self, length: f64) {
        self.length = length;
    }

    pub fn push(&mut self, component: impl Into<LatticeComponent>) {
        self.components.push(component.into());
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn hardware_id(&self) -> Option<Id> {
        self.hardware_id
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn entrance(&self) -> f64 {
        self.position - self.length / 2.0
    }

    pub fn exit(&self) -> f64 {
        self.position + self.length / 2.0
    }

    /// Direct children in beam order.
    pub fn components(&self) -> &[LatticeComponent] {
        &self.components
    }

    /// Depth-first iterator over every element below this sequence.
    pub fn elements(&self) -> Elements<'_> {
        Elements {
            stack: vec![self.components.iter()],
        }
    }

    /// Entrance of the element `id` measured from this sequence's entrance.
    fn local_entrance_of(&self, id: Id) -> Option<f64> {
        self.components.iter().find_map(|c| match c {
            LatticeComponent::Element(e) if e.id == id => Some(e.entrance()),
            LatticeComponent::Element(_) => None,
            LatticeComponent::Sequence(s) => s.local_entrance_of(id).map(|p| s.entrance() + p),
        })
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}{} {} [{:.6}, {:.6}]",
            "",
            self.id,
            self.type_name,
            self.entrance(),
            self.exit(),
            indent = depth * 2
        )?;
        for component in &self.components {
            match component {
                LatticeComponent::Element(e) => writeln!(
                    f,
                    "{:indent$}{} {} [{:.6}, {:.6}]",
                    "",
                    e.id,
                    e.type_name,
                    e.entrance(),
                    e.exit(),
                    indent = (depth + 1) * 2
                )?,
                LatticeComponent::Sequence(s) => s.write_tree(f, depth + 1)?,
            }
        }
        Ok(())
    }
}

/// A direct child of a [`ModelSequence`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LatticeComponent {
    Element(ModelElement),
    Sequence(ModelSequence),
}

impl LatticeComponent {
    pub fn id(&self) -> Id {
        match self {
            Self::Element(e) => e.id(),
            Self::Sequence(s) => s.id(),
        }
    }

    pub fn length(&self) -> f64 {
        match self {
            Self::Element(e) => e.length(),
            Self::Sequence(s) => s.length(),
        }
    }

    pub fn entrance(&self) -> f64 {
        match self {
            Self::Element(e) => e.entrance(),
            Self::Sequence(s) => s.entrance(),
        }
    }

    pub fn exit(&self) -> f64 {
        match self {
            Self::Element(e) => e.exit(),
            Self::Sequence(s) => s.exit(),
        }
    }

    pub fn as_element(&self) -> Option<&ModelElement> {
        match self {
            Self::Element(e) => Some(e),
            Self::Sequence(_) => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&ModelSequence> {
        match self {
            Self::Element(_) => None,
            Self::Sequence(s) => Some(s),
        }
    }
}

impl From<ModelElement> for LatticeComponent {
    fn from(element: ModelElement) -> Self {
        Self::Element(element)
    }
}

impl From<ModelSequence> for LatticeComponent {
    fn from(sequence: ModelSequence) -> Self {
        Self::Sequence(sequence)
    }
}

/// Depth-first iterator over the elements of a sequence tree.
pub struct Elements<'a> {
    stack: Vec<std::slice::Iter<'a, LatticeComponent>>,
}

impl<'a> Iterator for Elements<'a> {
    type Item = &'a ModelElement;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(LatticeComponent::Element(e)) => return Some(e),
                Some(LatticeComponent::Sequence(s)) => self.stack.push(s.components.iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// The finished simulation lattice with its descriptive metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lattice {
    id: Id,
    hardware_id: Option<Id>,
    version: String,
    comments: Vec<String>,
    root: ModelSequence,
}

impl Lattice {
    /// Wraps a root sequence; the lattice takes the root's id.
    pub fn new(root: ModelSequence) -> Self {
        Self {
            id: root.id(),
            hardware_id: None,
            version: String::new(),
            comments: Vec::new(),
            root,
        }
    }

    /// Sets the id of the hardware node at the lattice entrance.
    pub fn with_hardware_id(mut self, id: Option<Id>) -> Self {
        self.hardware_id = id;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comments.push(comment.into());
        self
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn hardware_id(&self) -> Option<Id> {
        self.hardware_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn root(&self) -> &ModelSequence {
        &self.root
    }

    /// Depth-first iterator over every model element, drifts included.
    pub fn elements(&self) -> Elements<'_> {
        self.root.elements()
    }

    /// Number of model elements in the lattice.
    pub fn len(&self) -> usize {
        self.elements().count()
    }

    pub fn is_empty(&self) -> bool {
        self.elements().next().is_none()
    }

    /// Returns the first element with the given id in beam order.
    pub fn find_element(&self, id: Id) -> Option<&ModelElement> {
        self.elements().find(|e| e.id() == id)
    }

    /// Returns the entrance of element `id` measured from the lattice entrance.
    pub fn absolute_position(&self, id: Id) -> Option<f64> {
        self.root.local_entrance_of(id)
    }
}

impl fmt::Display for Lattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lattice {}", self.id)?;
        if let Some(hw) = self.hardware_id {
            write!(f, " (entrance {hw})")?;
        }
        writeln!(f)?;
        if !self.version.is_empty() {
            writeln!(f, "# {}", self.version)?;
        }
        for comment in &self.comments {
            writeln!(f, "# {comment}")?;
        }
        self.root.write_tree(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;

    fn element(id: &str, center: f64, length: f64) -> ModelElement {
        let mut e = ModelElement::new(Id::new(id), "IdealDrift", length == 0.0);
        e.set_position(center);
        e.set_length(length);
        e
    }

    fn sample_lattice() -> Lattice {
        let mut inner = ModelSequence::new(Id::new("INNER"), "ElementSeq");
        inner.set_position(6.0);
        inner.set_length(4.0);
        inner.push(element("DR1", 1.0, 2.0));
        inner.push(element("M1", 2.0, 0.0));
        inner.push(element("DR2", 3.0, 2.0));

        let mut root = ModelSequence::new(Id::new("ROOT"), "ElementSeq");
        root.set_position(5.0);
        root.set_length(10.0);
        root.push(element("DR1", 2.0, 4.0));
        root.push(inner);
        root.push(element("DR2", 9.0, 2.0));

        Lattice::new(root)
            .with_version("Version soft type: SEQ")
            .with_comment("Sequence ID: ROOT")
    }

    #[test]
    fn test_element_extent() {
        let e = element("Q", 5.0, 2.0);
        assert_approx_eq!(f64, e.entrance(), 4.0);
        assert_approx_eq!(f64, e.exit(), 6.0);
    }

    #[test]
    fn test_depth_first_order() {
        let lattice = sample_lattice();
        let ids: Vec<String> = lattice.elements().map(|e| e.id().to_string()).collect();
        assert_eq!(ids, vec!["DR1", "DR1", "M1", "DR2", "DR2"]);
        assert_eq!(lattice.len(), 5);
        assert!(!lattice.is_empty());
    }

    #[test]
    fn test_absolute_position_walks_nesting() {
        let lattice = sample_lattice();
        assert_approx_eq!(f64, lattice.absolute_position(Id::new("M1")).unwrap(), 6.0);
        assert_approx_eq!(f64, lattice.absolute_position(Id::new("DR1")).unwrap(), 0.0);
        assert!(lattice.absolute_position(Id::new("nope")).is_none());
    }

    #[test]
    fn test_find_element() {
        let lattice = sample_lattice();
        let m1 = lattice.find_element(Id::new("M1")).unwrap();
        assert!(m1.is_thin());
        assert!(lattice.find_element(Id::new("INNER")).is_none());
    }

    #[test]
    fn test_params_keep_insertion_order() {
        let e = ModelElement::new(Id::new("RFD1"), "IdealRfCavityDrift", false)
            .with_param("frequency", 402.5e6)
            .with_param("mode", 0.5);
        let names: Vec<_> = e.params().keys().cloned().collect();
        assert_eq!(names, vec!["frequency", "mode"]);
        assert_approx_eq!(f64, e.param("mode").unwrap(), 0.5);
        assert!(e.param("phase").is_none());
    }

    #[test]
    fn test_display_listing() {
        let listing = sample_lattice().to_string();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], "lattice ROOT");
        assert_eq!(lines[1], "# Version soft type: SEQ");
        assert_eq!(lines[3], "ROOT ElementSeq [0.000000, 10.000000]");
        assert_eq!(lines[4], "  DR1 IdealDrift [0.000000, 4.000000]");
        assert_eq!(lines[5], "  INNER ElementSeq [4.000000, 8.000000]");
        assert_eq!(lines[6], "    DR1 IdealDrift [0.000000, 2.000000]");
    }
}
