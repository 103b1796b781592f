//! Configuration types for lattice generation.
//!
//! All types implement [`serde::Deserialize`] so a mapping can be loaded from
//! an external file. A missing section falls back to the standard mapping.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration root.
//! - [`MappingConfig`] - Type tag to model element associations and drift types.
//! - [`PolicyConfig`] - Generator policy flags.
//!
//! # Example
//!
//! ```
//! # use beamline::config::{AppConfig, BoundsMode};
//! let config = AppConfig::default();
//! assert!(config.mapping().inherit_defaults());
//! assert_eq!(config.mapping().policy().bounds(), BoundsMode::Lenient);
//! ```

use serde::Deserialize;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Element mapping section.
    #[serde(default)]
    mapping: MappingConfig,
}

impl AppConfig {
    pub fn new(mapping: MappingConfig) -> Self {
        Self { mapping }
    }

    /// Returns the mapping configuration.
    pub fn mapping(&self) -> &MappingConfig {
        &self.mapping
    }
}

/// How the generator treats children lying outside their sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundsMode {
    /// Shift and grow the sequence to fit, recording a notice.
    #[default]
    Lenient,
    /// Abort the build with a bounds error.
    Strict,
}

/// One `tag -> model element type` association.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementEntry {
    tag: String,
    model: String,
    #[serde(default)]
    thin: bool,
}

impl ElementEntry {
    pub fn new(tag: impl Into<String>, model: impl Into<String>, thin: bool) -> Self {
        Self {
            tag: tag.into(),
            model: model.into(),
            thin,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_thin(&self) -> bool {
        self.thin
    }
}

/// One `tag -> model sequence type` association.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceEntry {
    tag: String,
    model: String,
}

impl SequenceEntry {
    pub fn new(tag: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            model: model.into(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Generator policy flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Insert a thin center marker into every thick magnet.
    divide_magnets: bool,

    /// Treat sub-sequence positions as relative to the sequence center.
    subsection_origin_centered: bool,

    /// Trace every element through the build at debug level.
    debug: bool,

    /// Out-of-bounds handling after axis normalization.
    bounds: BoundsMode,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            divide_magnets: true,
            subsection_origin_centered: false,
            debug: false,
            bounds: BoundsMode::default(),
        }
    }
}

impl PolicyConfig {
    pub fn divide_magnets(&self) -> bool {
        self.divide_magnets
    }

    pub fn subsection_origin_centered(&self) -> bool {
        self.subsection_origin_centered
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn bounds(&self) -> BoundsMode {
        self.bounds
    }
}

/// Element mapping configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Start from the standard mapping and apply `elements`/`sequences` on top.
    inherit_defaults: bool,

    /// Model type used for unmapped type tags; always thin.
    default_element: String,

    elements: Vec<ElementEntry>,

    sequences: Vec<SequenceEntry>,

    /// Model type of plain drift spaces.
    drift: String,

    /// Model type of drift spaces inside RF cavities.
    rf_cavity_drift: String,

    policy: PolicyConfig,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            inherit_defaults: true,
            default_element: "Marker".to_string(),
            elements: Vec::new(),
            sequences: Vec::new(),
            drift: "IdealDrift".to_string(),
            rf_cavity_drift: "IdealRfCavityDrift".to_string(),
            policy: PolicyConfig::default(),
        }
    }
}

impl MappingConfig {
    pub fn inherit_defaults(&self) -> bool {
        self.inherit_defaults
    }

    pub fn default_element(&self) -> &str {
        &self.default_element
    }

    pub fn elements(&self) -> &[ElementEntry] {
        &self.elements
    }

    pub fn sequences(&self) -> &[SequenceEntry] {
        &self.sequences
    }

    pub fn drift(&self) -> &str {
        &self.drift
    }

    pub fn rf_cavity_drift(&self) -> &str {
        &self.rf_cavity_drift
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config: AppConfig = toml::from_str("").unwrap();
        let mapping = config.mapping();
        assert!(mapping.inherit_defaults());
        assert_eq!(mapping.default_element(), "Marker");
        assert_eq!(mapping.drift(), "IdealDrift");
        assert_eq!(mapping.rf_cavity_drift(), "IdealRfCavityDrift");
        assert!(mapping.policy().divide_magnets());
        assert!(!mapping.policy().subsection_origin_centered());
        assert!(!mapping.policy().debug());
        assert_eq!(mapping.policy().bounds(), BoundsMode::Lenient);
    }

    #[test]
    fn test_full_document() {
        let source = r#"
            [mapping]
            inherit_defaults = false
            default_element = "IdealMarker"
            drift = "TunedDrift"

            [mapping.policy]
            divide_magnets = false
            bounds = "strict"

            [[mapping.elements]]
            tag = "QH"
            model = "IdealMagQuad"

            [[mapping.elements]]
            tag = "BPM"
            model = "Marker"
            thin = true

            [[mapping.sequences]]
            tag = "DTL"
            model = "DriftTubeLinac"
        "#;
        let config: AppConfig = toml::from_str(source).unwrap();
        let mapping = config.mapping();

        assert!(!mapping.inherit_defaults());
        assert_eq!(mapping.default_element(), "IdealMarker");
        assert_eq!(mapping.drift(), "TunedDrift");
        assert_eq!(mapping.rf_cavity_drift(), "IdealRfCavityDrift");
        assert!(!mapping.policy().divide_magnets());
        assert_eq!(mapping.policy().bounds(), BoundsMode::Strict);

        assert_eq!(mapping.elements().len(), 2);
        assert_eq!(mapping.elements()[0].tag(), "QH");
        assert!(!mapping.elements()[0].is_thin());
        assert!(mapping.elements()[1].is_thin());
        assert_eq!(mapping.sequences()[0].model(), "DriftTubeLinac");
    }

    #[test]
    fn test_unknown_bounds_mode_rejected() {
        let source = "[mapping.policy]\nbounds = \"sloppy\"\n";
        assert!(toml::from_str::<AppConfig>(source).is_err());
    }
}
