//! Marker identifiers and the resolved attributes of an async enablement.

use std::borrow::Cow;
use std::fmt;

use serde::Deserialize;

use crate::config::AsyncConfig;
use crate::error::ConfigurationError;
use crate::pipeline::Order;

/// Declarative signal requesting async dispatch for a method or a whole component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub struct Marker(Cow<'static, str>);

impl Marker {
    /// The system default marker.
    pub const ASYNC: Marker = Marker(Cow::Borrowed("async"));

    /// A marker known at compile time.
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Marker {
    fn default() -> Self {
        Self::ASYNC
    }
}

impl From<String> for Marker {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl From<&'static str> for Marker {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a wrapped component presents itself to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProxyStyle {
    /// Decorator exposing only the [`Component`](crate::component::Component) surface.
    #[default]
    Interface,
    /// Decorator that also exposes the wrapped concrete type.
    ///
    /// Rejected for sealed components.
    TargetClass,
}

/// Resolved, immutable description of how async behaviour was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerAttributes {
    marker: Marker,
    custom_marker: Option<Marker>,
    proxy_style: ProxyStyle,
    order: Order,
}

impl Default for MarkerAttributes {
    fn default() -> Self {
        Self {
            marker: Marker::ASYNC,
            custom_marker: None,
            proxy_style: ProxyStyle::Interface,
            order: Order::Unspecified,
        }
    }
}

impl MarkerAttributes {
    /// Resolve attributes from enabling metadata.
    ///
    /// A marker equal to the default is treated the same as an omitted one;
    /// only a differing marker is recorded as custom.
    pub fn resolve(metadata: Option<&AsyncConfig>) -> Result<Self, ConfigurationError> {
        let Some(metadata) = metadata else {
            return Err(ConfigurationError::MissingMetadata);
        };

        let custom_marker = match &metadata.marker {
            Some(marker) if marker.as_str().trim().is_empty() => {
                return Err(ConfigurationError::InvalidMarker);
            }
            Some(marker) if *marker != Marker::ASYNC => Some(marker.clone()),
            _ => None,
        };

        let proxy_style = if metadata.proxy_target_class {
            ProxyStyle::TargetClass
        } else {
            ProxyStyle::Interface
        };

        Ok(Self {
            marker: Marker::ASYNC,
            custom_marker,
            proxy_style,
            order: metadata.order.map_or(Order::Unspecified, Order::At),
        })
    }

    /// Default marker established by the enabling mechanism.
    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    /// Custom marker, when one differing from the default was configured.
    pub fn custom_marker(&self) -> Option<&Marker> {
        self.custom_marker.as_ref()
    }

    pub fn proxy_style(&self) -> ProxyStyle {
        self.proxy_style
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Whether `marker` requests async dispatch under these attributes.
    pub fn matches(&self, marker: &Marker) -> bool {
        *marker == self.marker || self.custom_marker.as_ref() == Some(marker)
    }
}
