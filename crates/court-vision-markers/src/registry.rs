//! Surveyed marker table and payload matching.

use std::collections::HashSet;
use std::fmt;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Page the printed markers link to. Exact-match payloads are built from it.
pub const DEFAULT_EXPERIENCE_URL: &str =
    "https://helgihreinnh.github.io/copenhagen-court-vision/ar-experience.html";

/// Query keys that may name a marker inside a payload (`marker=left`, `start=entrance`).
pub const PAYLOAD_KEYS: [&str; 2] = ["marker", "start"];

/// The three surveyed calibration markers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerId {
    Entrance,
    LeftHoop,
    RightHoop,
}

impl MarkerId {
    /// All ids in calibration order.
    pub const ALL: [MarkerId; 3] = [MarkerId::Entrance, MarkerId::LeftHoop, MarkerId::RightHoop];

    /// Canonical name (`entrance`, `left-hoop`, `right-hoop`).
    pub fn as_str(self) -> &'static str {
        match self {
            MarkerId::Entrance => "entrance",
            MarkerId::LeftHoop => "left-hoop",
            MarkerId::RightHoop => "right-hoop",
        }
    }

    /// Short key printed into the QR payloads.
    pub fn default_key(self) -> &'static str {
        match self {
            MarkerId::Entrance => "entrance",
            MarkerId::LeftHoop => "left",
            MarkerId::RightHoop => "right",
        }
    }

    /// Parse a canonical name or short key.
    pub fn from_name(name: &str) -> Option<Self> {
        MarkerId::ALL
            .into_iter()
            .find(|id| id.as_str() == name || id.default_key() == name)
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a payload resolved to a marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadMatch {
    /// Payload equals one of the spec's exact patterns.
    Exact,
    /// Payload carries a `marker=<id>` / `start=<id>` fragment.
    Fragment,
    /// Payload is the bare id or key.
    BareId,
}

/// Immutable description of one physical marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub id: MarkerId,
    /// Key used in `marker=`/`start=` fragments and bare-id payloads.
    pub key: String,
    /// Display name, e.g. "Point B - Left Hoop".
    pub name: String,
    /// Payload strings accepted verbatim.
    #[serde(default)]
    pub match_patterns: Vec<String>,
    /// Surveyed position in the court frame, meters.
    pub world_position: Point3<f64>,
    /// Printed side length of the code, meters.
    pub physical_size: f64,
    /// Mount height above ground, meters. Informational.
    pub mount_height: f64,
}

impl MarkerSpec {
    /// Match `payload` against this spec. Case-sensitive.
    pub fn matches(&self, payload: &str) -> Option<PayloadMatch> {
        if self.match_patterns.iter().any(|p| p == payload) {
            return Some(PayloadMatch::Exact);
        }
        if payload_fragments(payload)
            .any(|(k, v)| PAYLOAD_KEYS.contains(&k) && self.names_this_marker(v))
        {
            return Some(PayloadMatch::Fragment);
        }
        if self.names_this_marker(payload) {
            return Some(PayloadMatch::BareId);
        }
        None
    }

    fn names_this_marker(&self, value: &str) -> bool {
        value == self.key || value == self.id.as_str()
    }
}

/// `key=value` pairs found anywhere in the payload, split on URL separators.
///
/// A `marker=left` segment inside a path (`https://host/ar/marker=left`) is
/// not a fragment: the text before `=` is `https://host/ar/marker`, which is
/// not a payload key.
fn payload_fragments(payload: &str) -> impl Iterator<Item = (&str, &str)> {
    payload
        .split(['?', '&', '#', ';'])
        .filter_map(|part| part.split_once('='))
}

/// Registry validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("registry has no spec for marker {0}")]
    MissingMarker(MarkerId),
    #[error("marker {0} is defined more than once")]
    DuplicateId(MarkerId),
    #[error("payload key {key:?} is used by more than one marker")]
    DuplicateKey { key: String },
    #[error("marker {0} has an empty payload key")]
    EmptyKey(MarkerId),
    #[error("marker {0}: physical_size must be finite and > 0")]
    InvalidPhysicalSize(MarkerId),
    #[error("marker {0}: mount_height must be finite and >= 0")]
    InvalidMountHeight(MarkerId),
    #[error("marker {0}: world_position must be finite")]
    NonFinitePosition(MarkerId),
}

/// Static lookup table of expected markers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerRegistry {
    specs: Vec<MarkerSpec>,
}

impl MarkerRegistry {
    /// Validate and create a registry. Lookup order is the order of `specs`.
    pub fn new(specs: Vec<MarkerSpec>) -> Result<Self, RegistryError> {
        let mut ids = HashSet::new();
        let mut keys = HashSet::new();
        for spec in &specs {
            if !ids.insert(spec.id) {
                return Err(RegistryError::DuplicateId(spec.id));
            }
            if spec.key.is_empty() {
                return Err(RegistryError::EmptyKey(spec.id));
            }
            if !keys.insert(spec.key.as_str()) {
                return Err(RegistryError::DuplicateKey {
                    key: spec.key.clone(),
                });
            }
            if !spec.physical_size.is_finite() || spec.physical_size <= 0.0 {
                return Err(RegistryError::InvalidPhysicalSize(spec.id));
            }
            if !spec.mount_height.is_finite() || spec.mount_height < 0.0 {
                return Err(RegistryError::InvalidMountHeight(spec.id));
            }
            if !spec.world_position.coords.iter().all(|v| v.is_finite()) {
                return Err(RegistryError::NonFinitePosition(spec.id));
            }
        }
        if let Some(missing) = MarkerId::ALL.into_iter().find(|id| !ids.contains(id)) {
            return Err(RegistryError::MissingMarker(missing));
        }
        Ok(Self { specs })
    }

    /// The surveyed court markers with exact URLs under [`DEFAULT_EXPERIENCE_URL`].
    pub fn court_default() -> Self {
        Self::with_base_url(DEFAULT_EXPERIENCE_URL)
    }

    /// The surveyed court markers with exact URLs under `base_url`.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            specs: court_specs(base_url),
        }
    }

    /// Resolve a payload to a marker spec (first match wins).
    pub fn lookup(&self, payload: &str) -> Option<&MarkerSpec> {
        self.lookup_with_match(payload).map(|(spec, _)| spec)
    }

    /// Like [`MarkerRegistry::lookup`], also reporting how the payload matched.
    pub fn lookup_with_match(&self, payload: &str) -> Option<(&MarkerSpec, PayloadMatch)> {
        self.specs
            .iter()
            .find_map(|spec| spec.matches(payload).map(|m| (spec, m)))
    }

    pub fn get(&self, id: MarkerId) -> Option<&MarkerSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    #[inline]
    pub fn specs(&self) -> &[MarkerSpec] {
        &self.specs
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for MarkerRegistry {
    fn default() -> Self {
        Self::court_default()
    }
}

fn court_specs(base_url: &str) -> Vec<MarkerSpec> {
    let spec = |id: MarkerId, name: &str, query: &str, pos: [f64; 3], size: f64, height: f64| {
        MarkerSpec {
            id,
            key: id.default_key().to_string(),
            name: name.to_string(),
            match_patterns: vec![format!("{base_url}?{query}={}", id.default_key())],
            world_position: Point3::new(pos[0], pos[1], pos[2]),
            physical_size: size,
            mount_height: height,
        }
    };
    vec![
        // Origin of the court frame.
        spec(
            MarkerId::Entrance,
            "Point A - Entrance",
            "start",
            [0.0, 0.0, 0.0],
            0.15,
            1.5,
        ),
        spec(
            MarkerId::LeftHoop,
            "Point B - Left Hoop",
            "marker",
            [-14.0, 1.6, 28.0],
            0.04,
            1.6,
        ),
        spec(
            MarkerId::RightHoop,
            "Point C - Right Hoop",
            "marker",
            [14.0, 1.6, 28.0],
            0.04,
            1.6,
        ),
    ]
}
