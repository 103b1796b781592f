//! Identifier management using string interning.
//!
//! Hardware nodes and model elements are looked up by id many times during a
//! build. [`Id`] keeps those ids as interned symbols so they are `Copy` and
//! compare in constant time.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, OnceLock},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner shared by every [`Id`].
///
/// # Thread Safety
///
/// Access goes through a `Mutex`, so ids may be created from concurrent
/// scenario builds.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn interner() -> MutexGuard<'static, DefaultStringInterner> {
    INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        .expect("Failed to acquire interner lock")
}

/// Interned identifier of a hardware node or model element.
///
/// # Examples
///
/// ```
/// use beamline_core::identifier::Id;
///
/// let quad = Id::new("MEBT_Mag:QH01");
/// assert_eq!(quad, "MEBT_Mag:QH01");
///
/// let marker = quad.with_suffix("-Center");
/// assert_eq!(marker, "MEBT_Mag:QH01-Center");
///
/// let drift = Id::indexed("DR", 3);
/// assert_eq!(drift.to_string(), "DR3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(DefaultSymbol);

impl Id {
    /// Creates an `Id` from a string slice.
    ///
    /// # Arguments
    ///
    /// * `name` - The string representation of the identifier
    pub fn new(name: &str) -> Self {
        Self(interner().get_or_intern(name))
    }

    /// Creates an id made of a prefix followed by a counter, such as `DR1`.
    pub fn indexed(prefix: &str, idx: usize) -> Self {
        Self::new(&format!("{prefix}{idx}"))
    }

    /// Creates a new id by appending `suffix` to this id.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        let name = format!("{self}{suffix}");
        Self::new(&name)
    }

    /// Creates a new id by prepending `prefix` to this id.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        let name = format!("{prefix}{self}");
        Self::new(&name)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interner = interner();
        let str_value = interner
            .resolve(self.0)
            .expect("Symbol should exist in interner");
        f.write_str(str_value)
    }
}

impl std::str::FromStr for Id {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        interner().get(other) == Some(self.0)
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::new(&name))
    }
}
