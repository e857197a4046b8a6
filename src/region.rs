//! Region descriptors and namespaced region identifiers.
//!
//! Subscribers declare regions with their own local identifiers. The broker
//! only ever hands the provider a namespaced form,
//! `<subscriber_identifier>+<region_identifier>`, so that any region the
//! provider reports back can be attributed to exactly one subscriber.
//!
//! Both halves must follow C identifier rules: an ASCII letter or underscore
//! followed by letters, digits or underscores. Neither half can contain the
//! `+` separator, which keeps parsing unambiguous.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::position::Coordinate;

/// Separator between the subscriber and region halves of a namespaced id.
pub const NAMESPACE_SEPARATOR: char = '+';

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"))
}

/// Returns true if `value` satisfies the identifier grammar.
#[must_use]
pub fn is_valid_identifier(value: &str) -> bool {
    identifier_pattern().is_match(value)
}

/// Validates one identifier half, naming `field` in the error.
pub fn validate_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyIdentifier { field });
    }
    if !is_valid_identifier(value) {
        return Err(ValidationError::InvalidIdentifier {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Geometry of a monitored region. Opaque to the broker.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegionGeometry {
    /// Circular geofence.
    Circle {
        center: Coordinate,
        radius_meters: f64,
    },

    /// Proximity beacon region.
    Beacon {
        proximity_uuid: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        major: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minor: Option<u16>,
    },
}

/// A region a subscriber wants monitored.
///
/// The identifier names the region. A region redeclared under the same
/// identifier with different geometry or notify flags replaces the old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Local identifier (subscriber side) or namespaced identifier (provider side).
    pub identifier: String,
    /// Geofence definition.
    pub geometry: RegionGeometry,
    /// Deliver enter transitions.
    pub notify_on_entry: bool,
    /// Deliver exit transitions.
    pub notify_on_exit: bool,
}

impl Region {
    /// Creates a region that notifies on both entry and exit.
    #[must_use]
    pub fn new(identifier: impl Into<String>, geometry: RegionGeometry) -> Self {
        Self {
            identifier: identifier.into(),
            geometry,
            notify_on_entry: true,
            notify_on_exit: true,
        }
    }

    /// Circular geofence convenience constructor.
    #[must_use]
    pub fn circle(identifier: impl Into<String>, center: Coordinate, radius_meters: f64) -> Self {
        Self::new(
            identifier,
            RegionGeometry::Circle {
                center,
                radius_meters,
            },
        )
    }

    /// Returns a copy of this region carrying another identifier.
    #[must_use]
    pub fn with_identifier(&self, identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..self.clone()
        }
    }

    /// Builds the provider-facing copy of this region for `subscriber_identifier`.
    pub fn namespaced(&self, subscriber_identifier: &str) -> Result<(NamespacedId, Self), ValidationError> {
        let id = NamespacedId::new(subscriber_identifier, &self.identifier)?;
        let region = self.with_identifier(id.to_string());
        Ok((id, region))
    }
}

/// A parsed `<subscriber>+<region>` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespacedId {
    subscriber: String,
    region: String,
}

impl NamespacedId {
    /// Composes a namespaced identifier, validating both halves.
    pub fn new(subscriber: impl Into<String>, region: impl Into<String>) -> Result<Self, ValidationError> {
        let subscriber = subscriber.into();
        let region = region.into();
        validate_identifier("subscriber_identifier", &subscriber)?;
        validate_identifier("region_identifier", &region)?;
        Ok(Self { subscriber, region })
    }

    /// Parses the provider-facing string form.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let Some((subscriber, region)) = value.split_once(NAMESPACE_SEPARATOR) else {
            return Err(ValidationError::MalformedNamespacedId {
                value: value.to_string(),
                reason: "missing '+' separator",
            });
        };

        if !is_valid_identifier(subscriber) {
            return Err(ValidationError::MalformedNamespacedId {
                value: value.to_string(),
                reason: "invalid subscriber identifier",
            });
        }
        if !is_valid_identifier(region) {
            return Err(ValidationError::MalformedNamespacedId {
                value: value.to_string(),
                reason: "invalid region identifier",
            });
        }

        Ok(Self {
            subscriber: subscriber.to_string(),
            region: region.to_string(),
        })
    }

    /// The owning subscriber's identifier.
    #[must_use]
    pub fn subscriber(&self) -> &str {
        &self.subscriber
    }

    /// The subscriber-local region identifier.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }
}

impl fmt::Display for NamespacedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.subscriber, NAMESPACE_SEPARATOR, self.region)
    }
}

impl TryFrom<String> for NamespacedId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NamespacedId> for String {
    fn from(id: NamespacedId) -> Self {
        id.to_string()
    }
}
