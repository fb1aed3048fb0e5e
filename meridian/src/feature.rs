//! Features are the data items drawn by vector tile layers.

use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

use meridian_types::Geom;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::style::StyleFunction;

/// Identifier of a feature given by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    /// Numeric id.
    Int(i64),
    /// String id.
    String(String),
}

impl Display for FeatureId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureId::Int(id) => write!(f, "{id}"),
            FeatureId::String(id) => write!(f, "{id}"),
        }
    }
}

impl From<i64> for FeatureId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Identity of a feature used to deduplicate features that are split between several tiles.
///
/// Features with an id are identified by it, others by their unique process-wide number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeatureKey {
    /// The feature has an id.
    Id(FeatureId),
    /// The feature has no id.
    Uid(u64),
}

/// A geometry with a set of properties.
#[derive(Clone)]
pub struct Feature {
    uid: u64,
    id: Option<FeatureId>,
    geometry: Geom,
    properties: HashMap<String, Value>,
    style: Option<StyleFunction>,
}

impl Debug for Feature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feature")
            .field("uid", &self.uid)
            .field("id", &self.id)
            .field("geometry", &self.geometry)
            .field("properties", &self.properties)
            .field("has_style", &self.style.is_some())
            .finish()
    }
}

impl Feature {
    /// Creates a new feature without an id and properties.
    pub fn new(geometry: impl Into<Geom>) -> Self {
        static UID: AtomicU64 = AtomicU64::new(1);

        Self {
            uid: UID.fetch_add(1, Ordering::Relaxed),
            id: None,
            geometry: geometry.into(),
            properties: HashMap::new(),
            style: None,
        }
    }

    /// Sets the feature id.
    pub fn with_id(mut self, id: impl Into<FeatureId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets one property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Sets a style function that takes precedence over the style of the layer.
    pub fn with_style(mut self, style: StyleFunction) -> Self {
        self.style = Some(style);
        self
    }

    /// Process-wide unique number of the feature.
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Feature id.
    pub fn id(&self) -> Option<&FeatureId> {
        self.id.as_ref()
    }

    /// Identity of the feature.
    pub fn key(&self) -> FeatureKey {
        match &self.id {
            Some(id) => FeatureKey::Id(id.clone()),
            None => FeatureKey::Uid(self.uid),
        }
    }

    /// Geometry of the feature.
    pub fn geometry(&self) -> &Geom {
        &self.geometry
    }

    /// All properties.
    pub fn properties(&self) -> &HashMap<String, Value> {
        &self.properties
    }

    /// Value of the property.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Style function of the feature.
    pub fn style_function(&self) -> Option<&StyleFunction> {
        self.style.as_ref()
    }
}
