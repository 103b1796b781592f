//! Hardware type tag to model element association.
//!
//! An [`ElementMapping`] resolves each hardware node to the
//! [`ElementConverter`] that creates its model element, names the model type
//! of each sequence, and synthesizes drift spaces. Registrations are resolved
//! once when the mapping is built; there is no lookup by type name at build
//! time.

use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use log::debug;
use thiserror::Error;

use beamline_core::{hardware::HardwareNode, identifier::Id, model::ModelElement};

use crate::{
    config::{BoundsMode, MappingConfig},
    error::LatticeError,
};

/// Failure reported by an [`ElementConverter`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConversionError(String);

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Creates the model element for one hardware node.
pub trait ElementConverter: fmt::Debug + Send + Sync {
    /// Name of the model element type this converter creates.
    fn type_name(&self) -> &str;

    /// Whether the created element is point-like regardless of hardware length.
    fn is_thin(&self) -> bool;

    /// Creates the model element for `node`.
    ///
    /// Position and length are assigned by the caller afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] if the node cannot be represented by this
    /// element type.
    fn create(&self, node: &HardwareNode) -> Result<ModelElement, ConversionError>;
}

/// Converter creating a plain element of a named model type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicConverter {
    type_name: String,
    thin: bool,
}

impl BasicConverter {
    pub fn new(type_name: impl Into<String>, thin: bool) -> Self {
        Self {
            type_name: type_name.into(),
            thin,
        }
    }

    pub fn thick(type_name: impl Into<String>) -> Self {
        Self::new(type_name, false)
    }

    pub fn thin(type_name: impl Into<String>) -> Self {
        Self::new(type_name, true)
    }
}

impl ElementConverter for BasicConverter {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn is_thin(&self) -> bool {
        self.thin
    }

    fn create(&self, node: &HardwareNode) -> Result<ModelElement, ConversionError> {
        let mut element = ModelElement::new(node.id(), self.type_name.as_str(), self.thin);
        element.set_hardware_id(node.id());
        Ok(element)
    }
}

type ConvertFn = dyn Fn(&HardwareNode) -> Result<ModelElement, ConversionError> + Send + Sync;

/// Converter backed by a closure, for element types needing node parameters.
///
/// # Examples
///
/// ```
/// # use beamline::mapping::{ConversionError, ElementConverter, FnConverter};
/// # use beamline_core::{hardware::{HardwareNode, NodeClass}, model::ModelElement};
/// let gap = FnConverter::new("IdealRfGap", true, |node| {
///     let rf = node
///         .rf()
///         .ok_or_else(|| ConversionError::new("gap has no RF parameters"))?;
///     Ok(ModelElement::new(node.id(), "IdealRfGap", true).with_param("frequency", rf.frequency_hz()))
/// });
///
/// let node = HardwareNode::new("RG1", "RG", NodeClass::Passive);
/// assert!(gap.create(&node).is_err());
/// ```
pub struct FnConverter {
    type_name: String,
    thin: bool,
    factory: Box<ConvertFn>,
}

impl FnConverter {
    pub fn new<F>(type_name: impl Into<String>, thin: bool, factory: F) -> Self
    where
        F: Fn(&HardwareNode) -> Result<ModelElement, ConversionError> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            thin,
            factory: Box::new(factory),
        }
    }
}

impl fmt::Debug for FnConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConverter")
            .field("type_name", &self.type_name)
            .field("thin", &self.thin)
            .finish_non_exhaustive()
    }
}

impl ElementConverter for FnConverter {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn is_thin(&self) -> bool {
        self.thin
    }

    fn create(&self, node: &HardwareNode) -> Result<ModelElement, ConversionError> {
        (self.factory)(node)
    }
}

/// Creates a plain drift space from an id and a length.
pub type DriftFactory = Arc<dyn Fn(Id, f64) -> ModelElement + Send + Sync>;

/// Creates an RF cavity drift from an id, a length, a frequency in Hz and a mode.
pub type RfDriftFactory = Arc<dyn Fn(Id, f64, f64, f64) -> ModelElement + Send + Sync>;

/// Drift factory creating elements of the named model type.
pub fn named_drift(type_name: impl Into<String>) -> DriftFactory {
    let type_name = type_name.into();
    Arc::new(move |id, length| {
        let mut drift = ModelElement::new(id, type_name.as_str(), false);
        drift.set_length(length);
        drift
    })
}

/// RF drift factory creating elements of the named model type.
///
/// The cavity frequency and structure mode are stored as the `frequency`
/// and `mode` parameters.
pub fn named_rf_drift(type_name: impl Into<String>) -> RfDriftFactory {
    let type_name = type_name.into();
    Arc::new(move |id, length, frequency, mode| {
        let mut drift = ModelElement::new(id, type_name.as_str(), false)
            .with_param("frequency", frequency)
            .with_param("mode", mode);
        drift.set_length(length);
        drift
    })
}

const DEFAULT_ELEMENT: &str = "Marker";
const DEFAULT_SEQUENCE: &str = "ElementSeq";
const DEFAULT_RF_CAVITY: &str = "RfCavity";
const DEFAULT_DRIFT: &str = "IdealDrift";
const DEFAULT_RF_DRIFT: &str = "IdealRfCavityDrift";

/// Standard element table: `(type tag, model type, thin)`.
const STANDARD_ELEMENTS: &[(&str, &str, bool)] = &[
    ("BPM", "Marker", true),
    ("BLM", "Marker", true),
    ("BCM", "Marker", true),
    ("WS", "Marker", true),
    ("Marker", "Marker", true),
    ("QH", "IdealMagQuad", false),
    ("QV", "IdealMagQuad", false),
    ("QTH", "IdealMagQuad", false),
    ("QTV", "IdealMagQuad", false),
    ("PMQH", "IdealMagQuad", false),
    ("PMQV", "IdealMagQuad", false),
    ("DH", "ThickDipole", false),
    ("DCH", "IdealMagSteeringDipole", true),
    ("DCV", "IdealMagSteeringDipole", true),
    ("EKick", "IdealMagSteeringDipole", true),
    ("SH", "IdealMagSextupole", false),
    ("SV", "IdealMagSextupole", false),
    ("SOL", "IdealMagSolenoid", false),
    ("RG", "IdealRfGap", true),
];

/// Registry from hardware type tag to model element converter.
///
/// Immutable once built; a build only ever reads it, so one mapping can be
/// shared by concurrent builds.
///
/// # Examples
///
/// ```
/// # use beamline::mapping::{BasicConverter, ElementMapping};
/// # use beamline_core::hardware::{HardwareNode, NodeClass};
/// let mapping = ElementMapping::builder()
///     .put_map("QH", BasicConverter::thick("IdealMagQuad"))
///     .divide_magnets(false)
///     .build();
///
/// let quad = HardwareNode::new("Q1", "QH", NodeClass::Magnet);
/// let bpm = HardwareNode::new("B1", "BPM", NodeClass::Passive);
///
/// assert_eq!(mapping.model_element_type(&quad).unwrap().type_name(), "IdealMagQuad");
/// assert!(mapping.model_element_type(&bpm).is_none());
/// assert_eq!(mapping.default_converter().type_name(), "Marker");
/// ```
#[derive(Clone)]
pub struct ElementMapping {
    elements: IndexMap<String, Arc<dyn ElementConverter>>,
    sequences: IndexMap<String, String>,
    default_converter: Arc<dyn ElementConverter>,
    default_sequence: String,
    rf_cavity_sequence: String,
    drift: DriftFactory,
    rf_cavity_drift: RfDriftFactory,
    divide_magnets: bool,
    subsection_origin_centered: bool,
    debugging: bool,
    bounds: BoundsMode,
}

impl ElementMapping {
    /// Starts an empty mapping: every tag resolves to the default converter.
    pub fn builder() -> ElementMappingBuilder {
        ElementMappingBuilder {
            mapping: Self {
                elements: IndexMap::new(),
                sequences: IndexMap::new(),
                default_converter: Arc::new(BasicConverter::thin(DEFAULT_ELEMENT)),
                default_sequence: DEFAULT_SEQUENCE.to_string(),
                rf_cavity_sequence: DEFAULT_RF_CAVITY.to_string(),
                drift: named_drift(DEFAULT_DRIFT),
                rf_cavity_drift: named_rf_drift(DEFAULT_RF_DRIFT),
                divide_magnets: true,
                subsection_origin_centered: false,
                debugging: false,
                bounds: BoundsMode::default(),
            },
        }
    }

    /// The standard mapping for common accelerator devices.
    pub fn standard() -> Self {
        STANDARD_ELEMENTS
            .iter()
            .fold(Self::builder(), |builder, (tag, model, thin)| {
                builder.put_map(*tag, BasicConverter::new(*model, *thin))
            })
            .build()
    }

    /// Builds a mapping from a configuration section.
    ///
    /// With `inherit_defaults` the configured entries are applied on top of
    /// [`ElementMapping::standard`]; later entries for a tag replace earlier
    /// ones.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::Config`] for an empty tag or model type name.
    pub fn from_config(config: &MappingConfig) -> Result<Self, LatticeError> {
        let mut builder = if config.inherit_defaults() {
            Self::standard().into_builder()
        } else {
            Self::builder()
        };

        require_name("default_element", config.default_element())?;
        require_name("drift", config.drift())?;
        require_name("rf_cavity_drift", config.rf_cavity_drift())?;

        for entry in config.elements() {
            require_name("element tag", entry.tag())?;
            require_name("element model", entry.model())?;
            builder = builder.put_map(
                entry.tag(),
                BasicConverter::new(entry.model(), entry.is_thin()),
            );
        }
        for entry in config.sequences() {
            require_name("sequence tag", entry.tag())?;
            require_name("sequence model", entry.model())?;
            builder = builder.put_sequence_map(entry.tag(), entry.model());
        }

        let policy = config.policy();
        let mapping = builder
            .default_converter(BasicConverter::thin(config.default_element()))
            .drift_factory(named_drift(config.drift()))
            .rf_cavity_drift_factory(named_rf_drift(config.rf_cavity_drift()))
            .divide_magnets(policy.divide_magnets())
            .subsection_origin_centered(policy.subsection_origin_centered())
            .debugging(policy.debug())
            .bounds_mode(policy.bounds())
            .build();

        debug!(
            elements = mapping.elements.len(),
            sequences = mapping.sequences.len(),
            inherit_defaults = config.inherit_defaults();
            "Element mapping configured"
        );

        Ok(mapping)
    }

    /// Reopens the mapping for further registrations.
    pub fn into_builder(self) -> ElementMappingBuilder {
        ElementMappingBuilder { mapping: self }
    }

    /// Returns the converter registered for the node's type tag.
    ///
    /// `None` is a mapping miss; callers fall back to
    /// [`default_converter`](Self::default_converter).
    pub fn model_element_type(&self, node: &HardwareNode) -> Option<&Arc<dyn ElementConverter>> {
        self.elements.get(node.type_tag())
    }

    /// Returns the model sequence type for a sequence node.
    pub fn model_sequence_type(&self, node: &HardwareNode) -> &str {
        match self.sequences.get(node.type_tag()) {
            Some(name) => name,
            None if node.is_rf_cavity() => &self.rf_cavity_sequence,
            None => &self.default_sequence,
        }
    }

    pub fn default_converter(&self) -> &Arc<dyn ElementConverter> {
        &self.default_converter
    }

    pub fn create_default_drift(&self, id: Id, length: f64) -> ModelElement {
        (self.drift)(id, length)
    }

    pub fn create_rf_cavity_drift(
        &self,
        id: Id,
        length: f64,
        frequency: f64,
        mode: f64,
    ) -> ModelElement {
        (self.rf_cavity_drift)(id, length, frequency, mode)
    }

    pub fn is_magnet_divided(&self) -> bool {
        self.divide_magnets
    }

    pub fn is_subsection_axis_origin_centered(&self) -> bool {
        self.subsection_origin_centered
    }

    pub fn is_debugging(&self) -> bool {
        self.debugging
    }

    pub fn bounds_mode(&self) -> BoundsMode {
        self.bounds
    }
}

impl Default for ElementMapping {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for ElementMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementMapping")
            .field("elements", &self.elements)
            .field("sequences", &self.sequences)
            .field("default_converter", &self.default_converter)
            .field("default_sequence", &self.default_sequence)
            .field("divide_magnets", &self.divide_magnets)
            .field("subsection_origin_centered", &self.subsection_origin_centered)
            .field("debugging", &self.debugging)
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

fn require_name(field: &str, value: &str) -> Result<(), LatticeError> {
    if value.trim().is_empty() {
        return Err(LatticeError::Config(format!("`{field}` must not be empty")));
    }
    Ok(())
}

/// Builder for [`ElementMapping`].
pub struct ElementMappingBuilder {
    mapping: ElementMapping,
}

impl ElementMappingBuilder {
    /// Registers `converter` for hardware nodes with type tag `tag`.
    pub fn put_map(
        mut self,
        tag: impl Into<String>,
        converter: impl ElementConverter + 'static,
    ) -> Self {
        self.mapping.elements.insert(tag.into(), Arc::new(converter));
        self
    }

    /// Registers the model sequence type for sequences with type tag `tag`.
    pub fn put_sequence_map(mut self, tag: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.mapping.sequences.insert(tag.into(), type_name.into());
        self
    }

    pub fn default_converter(mut self, converter: impl ElementConverter + 'static) -> Self {
        self.mapping.default_converter = Arc::new(converter);
        self
    }

    pub fn default_sequence_type(mut self, type_name: impl Into<String>) -> Self {
        self.mapping.default_sequence = type_name.into();
        self
    }

    pub fn drift_factory(mut self, factory: DriftFactory) -> Self {
        self.mapping.drift = factory;
        self
    }

    pub fn rf_cavity_drift_factory(mut self, factory: RfDriftFactory) -> Self {
        self.mapping.rf_cavity_drift = factory;
        self
    }

    pub fn divide_magnets(mut self, divide: bool) -> Self {
        self.mapping.divide_magnets = divide;
        self
    }

    pub fn subsection_origin_centered(mut self, centered: bool) -> Self {
        self.mapping.subsection_origin_centered = centered;
        self
    }

    pub fn debugging(mut self, debugging: bool) -> Self {
        self.mapping.debugging = debugging;
        self
    }

    pub fn bounds_mode(mut self, bounds: BoundsMode) -> Self {
        self.mapping.bounds = bounds;
        self
    }

    pub fn build(self) -> ElementMapping {
        self.mapping
    }
}
