//! Error adapter for converting CLI errors to miette diagnostics.
//!
//! Hardware description errors carry their TOML source and are rendered with
//! a labeled snippet. Every other error is rendered as a plain diagnostic with
//! a code naming its category.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, SourceSpan};

use beamline::{ErrorKind, LatticeError};

use crate::{CliError, ConfigError};

/// Adapter for a malformed hardware description.
pub struct SourceAdapter<'a> {
    message: &'a str,
    src: &'a str,
    span: Option<SourceSpan>,
}

impl fmt::Debug for SourceAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceAdapter")
            .field("message", &self.message)
            .field("span", &self.span)
            .finish()
    }
}

impl fmt::Display for SourceAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid hardware description: {}", self.message)
    }
}

impl std::error::Error for SourceAdapter<'_> {}

impl MietteDiagnostic for SourceAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new("beamline::hardware"))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        Some(Box::new(std::iter::once(LabeledSpan::new_primary_with_span(
            Some(self.message.to_string()),
            span,
        ))))
    }
}

/// Adapter for errors without source information.
pub struct ErrorAdapter<'a>(pub &'a CliError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(self.0)
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self.0 {
            CliError::Io(_) => "beamline::io",
            CliError::Config(_) => "beamline::config",
            CliError::Hardware { .. } => "beamline::hardware",
            CliError::Lattice(err) => lattice_code(err),
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self.0 {
            CliError::Config(ConfigError::MissingFile(_)) => {
                "check the path passed with --config"
            }
            CliError::Lattice(err) => match err.kind() {
                ErrorKind::GeometryOverlap => {
                    "check the positions and lengths of the named nodes"
                }
                ErrorKind::BoundsCorrection => {
                    "fix the node positions or set `bounds = \"lenient\"` in [mapping.policy]"
                }
                ErrorKind::ConstructionFailure => {
                    "map the node's type tag to another model element type"
                }
                _ => return None,
            },
            _ => return None,
        };
        Some(Box::new(help))
    }
}

fn lattice_code(err: &LatticeError) -> &'static str {
    match err {
        LatticeError::Hardware(_) | LatticeError::InvalidRoot { .. } => "beamline::hardware",
        _ => match err.kind() {
            ErrorKind::GeometryOverlap => "beamline::geometry",
            ErrorKind::ConstructionFailure => "beamline::construction",
            ErrorKind::BoundsCorrection => "beamline::bounds",
            ErrorKind::MappingMiss | ErrorKind::Configuration => "beamline::config",
        },
    }
}

/// A reportable error that can be rendered by miette.
#[derive(Debug)]
pub enum Reportable<'a> {
    /// A hardware description error with its source snippet.
    Source(SourceAdapter<'a>),
    /// Any other error.
    Error(ErrorAdapter<'a>),
}

impl fmt::Display for Reportable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reportable::Source(s) => fmt::Display::fmt(s, f),
            Reportable::Error(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Reportable<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reportable::Source(_) => None,
            Reportable::Error(e) => e.source(),
        }
    }
}

impl MietteDiagnostic for Reportable<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Source(s) => s.code(),
            Reportable::Error(e) => e.code(),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Source(s) => s.help(),
            Reportable::Error(e) => e.help(),
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Reportable::Source(s) => s.source_code(),
            Reportable::Error(e) => e.source_code(),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Reportable::Source(s) => s.labels(),
            Reportable::Error(e) => e.labels(),
        }
    }
}

/// Convert a [`CliError`] into the list of reportable errors to render.
pub fn to_reportables(err: &CliError) -> Vec<Reportable<'_>> {
    match err {
        CliError::Hardware { message, src, span } => vec![Reportable::Source(SourceAdapter {
            message,
            src,
            span: span.clone().map(SourceSpan::from),
        })],
        _ => vec![Reportable::Error(ErrorAdapter(err))],
    }
}

#[cfg(test)]
mod tests {
    use beamline::identifier::Id;

    use super::*;
    use crate::parse_hardware;

    fn code_of(reportable: &Reportable<'_>) -> Option<String> {
        reportable.code().map(|c| c.to_string())
    }

    #[test]
    fn test_hardware_error_has_label() {
        let err = parse_hardware("id = \"S\"\ntype = \"SEQ\"\nlength = \"long\"\n").unwrap_err();

        let reportables = to_reportables(&err);
        assert_eq!(reportables.len(), 1);
        assert_eq!(code_of(&reportables[0]).as_deref(), Some("beamline::hardware"));
        assert!(reportables[0].source_code().is_some());
        match &reportables[0] {
            Reportable::Source(s) => assert!(s.span.is_some()),
            Reportable::Error(_) => panic!("Expected Source"),
        }
    }

    #[test]
    fn test_lattice_error_codes() {
        let unknown = CliError::Lattice(LatticeError::UnknownNode(Id::new("Q1")));
        assert_eq!(
            code_of(&to_reportables(&unknown)[0]).as_deref(),
            Some("beamline::config")
        );

        let bounds = CliError::Lattice(LatticeError::Bounds {
            sequence: Id::new("S"),
            min: -1.0,
            max: 2.0,
            length: 2.0,
        });
        let reportables = to_reportables(&bounds);
        assert_eq!(code_of(&reportables[0]).as_deref(), Some("beamline::bounds"));
        assert!(reportables[0].help().is_some());

        let construction = CliError::Lattice(LatticeError::Construction {
            node: Id::new("Q1"),
            type_name: "Quad".to_string(),
            reason: "unsupported".to_string(),
        });
        assert_eq!(
            code_of(&to_reportables(&construction)[0]).as_deref(),
            Some("beamline::construction")
        );
    }

    #[test]
    fn test_io_error() {
        let err = CliError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let reportables = to_reportables(&err);
        assert_eq!(reportables[0].to_string(), "I/O error: gone");
        assert_eq!(code_of(&reportables[0]).as_deref(), Some("beamline::io"));
        assert!(reportables[0].help().is_none());
    }
}
