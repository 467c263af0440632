pub mod presenter;
pub mod router;

pub use presenter::{DeliverySink, FrameDelivery, Presentation, PresentationEvent, Presented};
pub use router::{
    DisplayLayout, DisplayRouter, PresentationMode, Route, RoutingHandle, RoutingTable, TargetId,
};
