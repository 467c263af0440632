//! Routes each sensor feed to a display target for the active presentation mode
//!
//! The router publishes an immutable [`RoutingTable`] that acquisition
//! workers read once per frame. Every table carries an epoch; a frame
//! produced under one epoch is stale once a newer table is published.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::pipeline::FrameSize;
use crate::session::SessionRole;

/// Which feeds occupy which targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PresentationMode {
    #[default]
    SingleVisible,
    SingleThermal,
    VisibleWithThermalOverlay,
    ThermalWithVisibleOverlay,
}

impl PresentationMode {
    pub const ALL: [PresentationMode; 4] = [
        PresentationMode::SingleVisible,
        PresentationMode::SingleThermal,
        PresentationMode::VisibleWithThermalOverlay,
        PresentationMode::ThermalWithVisibleOverlay,
    ];

    /// Sessions that must run in this mode
    pub fn required_roles(self) -> &'static [SessionRole] {
        match self {
            PresentationMode::SingleVisible => &[SessionRole::Visible],
            PresentationMode::SingleThermal => &[SessionRole::Thermal],
            PresentationMode::VisibleWithThermalOverlay => {
                &[SessionRole::Visible, SessionRole::Thermal]
            }
            PresentationMode::ThermalWithVisibleOverlay => &[
                SessionRole::Thermal,
                SessionRole::Visible,
                SessionRole::Rangefinder,
            ],
        }
    }
}

/// Logical display destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetId {
    MainPane,
    OverlayPane,
    RangeLabel,
}

/// Where and at what size a feed is shown; origin is relative to the main pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub target: TargetId,
    pub size: FrameSize,
    pub origin: (u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayLayout {
    pub pane: FrameSize,
    pub overlay: FrameSize,
    /// Distance of the overlay pane from the main pane's top-right corner
    pub overlay_margin: u32,
    /// Vertical gap between the overlay pane and the range label
    pub label_gap: u32,
    pub label_height: u32,
}

impl Default for DisplayLayout {
    fn default() -> Self {
        Self {
            pane: FrameSize::new(1280, 720),
            overlay: FrameSize::new(320, 240),
            overlay_margin: 20,
            label_gap: 8,
            label_height: 24,
        }
    }
}

impl DisplayLayout {
    fn main_pane(&self) -> Route {
        Route {
            target: TargetId::MainPane,
            size: self.pane,
            origin: (0, 0),
        }
    }

    /// Small pane anchored to the top-right corner of the main pane
    fn overlay_pane(&self) -> Route {
        let x = self
            .pane
            .width
            .saturating_sub(self.overlay.width + self.overlay_margin);
        Route {
            target: TargetId::OverlayPane,
            size: self.overlay,
            origin: (x, self.overlay_margin),
        }
    }

    fn label(&self, below: Option<Route>) -> Route {
        let (x, y) = match below {
            Some(pane) => (pane.origin.0, pane.origin.1 + pane.size.height + self.label_gap),
            None => (
                self.pane
                    .width
                    .saturating_sub(self.overlay.width + self.overlay_margin),
                self.overlay_margin,
            ),
        };
        Route {
            target: TargetId::RangeLabel,
            size: FrameSize::new(self.overlay.width, self.label_height),
            origin: (x, y),
        }
    }
}

/// Immutable snapshot of the current routing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    pub epoch: u64,
    /// `None` while targets are released (between modes)
    pub mode: Option<PresentationMode>,
    pub visible: Option<Route>,
    pub thermal: Option<Route>,
    pub range_label: Option<Route>,
}

impl RoutingTable {
    pub fn released(epoch: u64) -> Self {
        Self {
            epoch,
            mode: None,
            visible: None,
            thermal: None,
            range_label: None,
        }
    }

    /// Derive every target for `mode` from `layout`.
    pub fn plan(mode: PresentationMode, layout: &DisplayLayout, epoch: u64) -> Self {
        let main = layout.main_pane();
        let overlay = layout.overlay_pane();
        let (visible, thermal, range_label) = match mode {
            PresentationMode::SingleVisible => (Some(main), None, None),
            PresentationMode::SingleThermal => (None, Some(main), Some(layout.label(None))),
            PresentationMode::VisibleWithThermalOverlay => (Some(main), Some(overlay), None),
            PresentationMode::ThermalWithVisibleOverlay => {
                (Some(overlay), Some(main), Some(layout.label(Some(overlay))))
            }
        };
        Self {
            epoch,
            mode: Some(mode),
            visible,
            thermal,
            range_label,
        }
    }

    pub fn route(&self, role: SessionRole) -> Option<Route> {
        match role {
            SessionRole::Visible => self.visible,
            SessionRole::Thermal => self.thermal,
            SessionRole::Rangefinder => self.range_label,
            SessionRole::ThermalLink => None,
        }
    }
}

/// Read side of the router, shared with workers and the presentation consumer
#[derive(Clone)]
pub struct RoutingHandle {
    table: Arc<ArcSwap<RoutingTable>>,
}

impl RoutingHandle {
    pub fn load(&self) -> Arc<RoutingTable> {
        self.table.load_full()
    }

    pub fn epoch(&self) -> u64 {
        self.table.load().epoch
    }
}

/// Owns the routing table; only the controller mutates it
pub struct DisplayRouter {
    layout: DisplayLayout,
    mode: Option<PresentationMode>,
    epoch: u64,
    table: Arc<ArcSwap<RoutingTable>>,
}

impl DisplayRouter {
    pub fn new(layout: DisplayLayout) -> Self {
        Self {
            layout,
            mode: None,
            epoch: 0,
            table: Arc::new(ArcSwap::from_pointee(RoutingTable::released(0))),
        }
    }

    pub fn handle(&self) -> RoutingHandle {
        RoutingHandle {
            table: self.table.clone(),
        }
    }

    pub fn mode(&self) -> Option<PresentationMode> {
        self.mode
    }

    pub fn layout(&self) -> &DisplayLayout {
        &self.layout
    }

    pub fn table(&self) -> Arc<RoutingTable> {
        self.table.load_full()
    }

    /// Drop every target. Anything produced before this is stale.
    pub fn release(&mut self) -> u64 {
        self.epoch += 1;
        self.mode = None;
        self.table.store(Arc::new(RoutingTable::released(self.epoch)));
        self.epoch
    }

    /// Publish targets for `mode`. Callers release and stop sessions first.
    pub fn apply(&mut self, mode: PresentationMode) -> Arc<RoutingTable> {
        self.epoch += 1;
        self.mode = Some(mode);
        let table = Arc::new(RoutingTable::plan(mode, &self.layout, self.epoch));
        info!("Routing {:?} (epoch {})", mode, self.epoch);
        self.table.store(table.clone());
        table
    }

    /// New main-pane size; the active mode is re-planned under a new epoch.
    pub fn resize_pane(&mut self, pane: FrameSize) {
        self.layout.pane = pane;
        if let Some(mode) = self.mode {
            self.apply(mode);
        }
    }
}
