//! Handoff from acquisition workers to the presentation consumer
//!
//! Frames travel over a bounded queue and are dropped (never reordered)
//! when the consumer falls behind. Status lines and thermal replies share a
//! second bounded queue so they are never lost behind video. Range samples
//! get a short queue of their own that keeps only the latest readings.
//! Frames and range samples routed under an older epoch are discarded on the
//! consumer side.

use std::time::Duration;

use flume::{Receiver, Sender, TryRecvError, TrySendError};
use tracing::{debug, trace};

use super::router::{Route, RoutingHandle, TargetId};
use crate::error::ProtocolError;
use crate::pipeline::DisplayFrame;
use crate::protocol::{RangeSample, ThermalResponse};
use crate::session::{SessionRole, SessionState};

/// Status lines and thermal replies in flight
pub const EVENT_QUEUE_DEPTH: usize = 256;
/// Range samples in flight; older ones are replaced by newer ones
pub const RANGE_QUEUE_DEPTH: usize = 4;

/// One transformed frame addressed to a display target
#[derive(Debug, Clone)]
pub struct FrameDelivery {
    pub role: SessionRole,
    pub target: TargetId,
    /// Routing epoch the frame was sized under
    pub epoch: u64,
    pub frame: DisplayFrame,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    /// Latest rangefinder reading; `None` means no valid target
    Range {
        sample: Option<RangeSample>,
        label: Option<Route>,
        epoch: u64,
    },
    Status {
        role: SessionRole,
        state: SessionState,
        message: String,
    },
    ThermalReply {
        label: String,
        outcome: Result<ThermalResponse, ProtocolError>,
    },
}

/// Producer side, cloned into every worker
#[derive(Clone)]
pub struct DeliverySink {
    frames: Sender<FrameDelivery>,
    events: Sender<PresentationEvent>,
    ranges: Sender<PresentationEvent>,
    /// Lets the producer evict the oldest sample when the range queue is full
    range_backlog: Receiver<PresentationEvent>,
}

impl DeliverySink {
    /// Non-blocking. Returns false when the frame was dropped.
    pub fn deliver_frame(
        &self,
        role: SessionRole,
        target: TargetId,
        epoch: u64,
        frame: DisplayFrame,
    ) -> bool {
        let delivery = FrameDelivery {
            role,
            target,
            epoch,
            frame,
        };
        match self.frames.try_send(delivery) {
            Ok(()) => {
                metrics::counter!("eoir_frames_delivered", "role" => role.as_str()).increment(1);
                true
            }
            Err(TrySendError::Full(d)) => {
                trace!("{} frame {} dropped, consumer behind", role, d.frame.sequence);
                metrics::counter!("eoir_frames_dropped", "role" => role.as_str()).increment(1);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Non-blocking. A full queue loses its oldest sample, never the newest.
    pub fn deliver_range_sample(&self, sample: Option<RangeSample>, label: Option<Route>, epoch: u64) {
        let mut event = PresentationEvent::Range {
            sample,
            label,
            epoch,
        };
        loop {
            match self.ranges.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(e)) => {
                    let _ = self.range_backlog.try_recv();
                    metrics::counter!("eoir_range_samples_replaced").increment(1);
                    event = e;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    pub fn report_status(&self, role: SessionRole, state: SessionState, message: impl Into<String>) {
        self.push_event(PresentationEvent::Status {
            role,
            state,
            message: message.into(),
        });
    }

    pub fn thermal_reply(
        &self,
        label: impl Into<String>,
        outcome: Result<ThermalResponse, ProtocolError>,
    ) {
        self.push_event(PresentationEvent::ThermalReply {
            label: label.into(),
            outcome,
        });
    }

    fn push_event(&self, event: PresentationEvent) {
        if let Err(TrySendError::Full(e)) = self.events.try_send(event) {
            debug!("Event dropped, consumer behind: {:?}", e);
            metrics::counter!("eoir_events_dropped").increment(1);
        }
    }
}

/// Either kind of item the consumer can receive
#[derive(Debug, Clone)]
pub enum Presented {
    Frame(FrameDelivery),
    Event(PresentationEvent),
}

/// Consumer side. Frames and range samples routed under an older epoch are
/// discarded here.
pub struct Presentation {
    frames: Receiver<FrameDelivery>,
    events: Receiver<PresentationEvent>,
    ranges: Receiver<PresentationEvent>,
    routing: RoutingHandle,
}

impl Presentation {
    /// Create a sink/consumer pair with room for `depth` frames in flight.
    pub fn channel(depth: usize, routing: RoutingHandle) -> (DeliverySink, Presentation) {
        let (ftx, frx) = flume::bounded(depth.max(1));
        let (etx, erx) = flume::bounded(EVENT_QUEUE_DEPTH);
        let (rtx, rrx) = flume::bounded(RANGE_QUEUE_DEPTH);
        (
            DeliverySink {
                frames: ftx,
                events: etx,
                ranges: rtx,
                range_backlog: rrx.clone(),
            },
            Presentation {
                frames: frx,
                events: erx,
                ranges: rrx,
                routing,
            },
        )
    }

    fn is_current(&self, delivery: &FrameDelivery) -> bool {
        let current = self.routing.epoch();
        if delivery.epoch == current {
            return true;
        }
        trace!(
            "Discarding {} frame from epoch {} (current {})",
            delivery.role,
            delivery.epoch,
            current
        );
        metrics::counter!("eoir_frames_stale", "role" => delivery.role.as_str()).increment(1);
        false
    }

    fn is_current_range(&self, event: &PresentationEvent) -> bool {
        match event {
            PresentationEvent::Range { epoch, .. } if *epoch != self.routing.epoch() => {
                trace!("Discarding range sample from epoch {}", epoch);
                metrics::counter!("eoir_range_samples_stale").increment(1);
                false
            }
            _ => true,
        }
    }

    /// Next frame for the current routing, if one is queued.
    pub fn try_frame(&self) -> Option<FrameDelivery> {
        loop {
            match self.frames.try_recv() {
                Ok(d) if self.is_current(&d) => return Some(d),
                Ok(_) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Wait up to `timeout` for a current frame.
    pub fn recv_frame_timeout(&self, timeout: Duration) -> Option<FrameDelivery> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let d = self.frames.recv_deadline(deadline).ok()?;
            if self.is_current(&d) {
                return Some(d);
            }
        }
    }

    /// Queued status lines and replies, then current range samples.
    pub fn drain_events(&self) -> Vec<PresentationEvent> {
        let mut out: Vec<PresentationEvent> = self.events.try_iter().collect();
        out.extend(self.ranges.try_iter().filter(|e| self.is_current_range(e)));
        out
    }

    /// Await the next frame or event. Returns `None` once every sink is gone.
    pub async fn next(&self) -> Option<Presented> {
        loop {
            tokio::select! {
                Ok(d) = self.frames.recv_async() => {
                    if self.is_current(&d) {
                        return Some(Presented::Frame(d));
                    }
                }
                Ok(e) = self.events.recv_async() => return Some(Presented::Event(e)),
                Ok(e) = self.ranges.recv_async() => {
                    if self.is_current_range(&e) {
                        return Some(Presented::Event(e));
                    }
                }
                else => return None,
            }
        }
    }
}
