pub mod overlay;
pub mod palette;
pub mod settings;
pub mod transform;

pub use palette::PaletteMode;
pub use settings::{SettingsStore, ViewSettings, ZoomFactor};
pub use transform::{
    crop_rect, transform, CropRect, DisplayFrame, FrameSize, SourceKind, TransformParams,
};
