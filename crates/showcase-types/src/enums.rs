//! Enumeration types for the presentation: visual layers and the
//! completion signals panels report back to the sequencer.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// One visual panel that a stage can show or hide.
///
/// Sphere, Cube, `DataFusion` and Matching are primary layers: at most one
/// of them is in the foreground at a time. Report is an overlay and may be
/// shown on top of a primary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LayerId {
    /// The rotating consumer database sphere.
    Sphere,
    /// The document cube knowledge base.
    Cube,
    /// The client first-party data fusion panel.
    DataFusion,
    /// The product-to-audience matching panel.
    Matching,
    /// The final analysis report overlay.
    Report,
}

impl LayerId {
    /// Every layer in presentation order.
    pub const ALL: [Self; 5] = [
        Self::Sphere,
        Self::Cube,
        Self::DataFusion,
        Self::Matching,
        Self::Report,
    ];

    /// Whether this layer may overlay a primary layer.
    pub const fn is_overlay(self) -> bool {
        matches!(self, Self::Report)
    }

    /// The completion signal reported by this layer's panel.
    pub const fn signal(self) -> SignalId {
        match self {
            Self::Sphere => SignalId::SphereComplete,
            Self::Cube => SignalId::CubeComplete,
            Self::DataFusion => SignalId::DataFusionComplete,
            Self::Matching => SignalId::MatchingComplete,
            Self::Report => SignalId::ReportComplete,
        }
    }
}

// ---------------------------------------------------------------------------
// Completion signals
// ---------------------------------------------------------------------------

/// A completion signal set by a panel once its local animation finishes.
///
/// Wire names are camelCase (`sphereComplete`, `cubeComplete`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum SignalId {
    /// The database counter reached its target.
    SphereComplete,
    /// Every knowledge-base document has been revealed.
    CubeComplete,
    /// The client data finished merging.
    DataFusionComplete,
    /// The matched audience has been highlighted.
    MatchingComplete,
    /// Every report section has been revealed.
    ReportComplete,
}

impl SignalId {
    /// Every signal, in presentation order.
    pub const ALL: [Self; 5] = [
        Self::SphereComplete,
        Self::CubeComplete,
        Self::DataFusionComplete,
        Self::MatchingComplete,
        Self::ReportComplete,
    ];

    /// The wire name of this signal.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SphereComplete => "sphereComplete",
            Self::CubeComplete => "cubeComplete",
            Self::DataFusionComplete => "dataFusionComplete",
            Self::MatchingComplete => "matchingComplete",
            Self::ReportComplete => "reportComplete",
        }
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known [`SignalId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown completion signal: {0}")]
pub struct UnknownSignal(pub String);

impl FromStr for SignalId {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|signal| signal.as_str() == s)
            .ok_or_else(|| UnknownSignal(s.to_owned()))
    }
}
