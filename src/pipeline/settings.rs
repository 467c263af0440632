//! Operator view settings, published as immutable snapshots
//!
//! The presentation side replaces the whole snapshot; acquisition workers
//! load one snapshot per frame and never see a half-applied update.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use super::palette::PaletteMode;
use crate::error::PipelineError;

/// Digital zoom for the visible camera, 1.0 (no crop) to 4.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct ZoomFactor(f32);

impl ZoomFactor {
    pub const NONE: ZoomFactor = ZoomFactor(1.0);
    pub const MAX: f32 = 4.0;

    pub fn new(factor: f32) -> Result<Self, PipelineError> {
        if !(1.0..=Self::MAX).contains(&factor) {
            return Err(PipelineError::InvalidZoom(factor));
        }
        Ok(Self(factor))
    }

    pub fn get(self) -> f32 {
        self.0
    }

    pub fn crops(self) -> bool {
        self.0 > 1.0
    }
}

impl Default for ZoomFactor {
    fn default() -> Self {
        Self::NONE
    }
}

impl TryFrom<f32> for ZoomFactor {
    type Error = PipelineError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ZoomFactor> for f32 {
    fn from(z: ZoomFactor) -> f32 {
        z.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub visible_zoom: ZoomFactor,
    pub palette: PaletteMode,
    pub crosshair: bool,
}

/// Shared handle to the current [`ViewSettings`] snapshot
#[derive(Clone)]
pub struct SettingsStore {
    current: Arc<ArcSwap<ViewSettings>>,
}

impl SettingsStore {
    pub fn new(initial: ViewSettings) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn snapshot(&self) -> Arc<ViewSettings> {
        self.current.load_full()
    }

    pub fn publish(&self, settings: ViewSettings) {
        self.current.store(Arc::new(settings));
    }

    /// Derive and publish a new snapshot from the current one.
    pub fn update(&self, f: impl Fn(&ViewSettings) -> ViewSettings) -> ViewSettings {
        let prev = self.current.rcu(|cur| Arc::new(f(cur)));
        f(&prev)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(ViewSettings::default())
    }
}
