//! Thermal pseudo-colour palettes

use serde::{Deserialize, Serialize};

use crate::protocol::CameraPalette;

/// Mapping from thermal intensity to display colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaletteMode {
    /// White-hot, bone tint
    #[default]
    Natural,
    /// Black-hot
    Inverted,
    Rainbow,
    Green,
    /// Black-red-yellow-white ("metal")
    HighContrast,
}

/// Linear interpolation through `(position, value)` stops, positions ascending in [0, 1]
fn through(stops: &[(f32, f32)], t: f32) -> f32 {
    let mut prev = stops[0];
    for &stop in &stops[1..] {
        if t <= stop.0 {
            let span = stop.0 - prev.0;
            let k = if span > 0.0 { (t - prev.0) / span } else { 0.0 };
            return prev.1 + k * (stop.1 - prev.1);
        }
        prev = stop;
    }
    prev.1
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl PaletteMode {
    pub const ALL: [PaletteMode; 5] = [
        PaletteMode::Natural,
        PaletteMode::Inverted,
        PaletteMode::Rainbow,
        PaletteMode::Green,
        PaletteMode::HighContrast,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Natural => "white",
            Self::Inverted => "black",
            Self::Rainbow => "rainbow",
            Self::Green => "green",
            Self::HighContrast => "metal",
        }
    }

    /// Matching palette on the camera core itself
    pub fn camera_palette(&self) -> CameraPalette {
        match self {
            Self::Natural => CameraPalette::White,
            Self::Inverted => CameraPalette::Black,
            Self::Rainbow => CameraPalette::Rainbow,
            Self::Green => CameraPalette::Green,
            Self::HighContrast => CameraPalette::Metal,
        }
    }

    /// Colour for a normalized intensity (0.0–1.0)
    pub fn apply(&self, value: f32) -> [u8; 3] {
        let t = value.clamp(0.0, 1.0);
        match self {
            Self::Natural => [
                to_byte(through(&[(0.0, 0.0), (0.746, 0.653), (1.0, 1.0)], t)),
                to_byte(through(&[(0.0, 0.0), (0.365, 0.319), (0.746, 0.778), (1.0, 1.0)], t)),
                to_byte(through(&[(0.0, 0.0), (0.365, 0.444), (1.0, 1.0)], t)),
            ],
            Self::Inverted => {
                let g = to_byte(1.0 - t);
                [g, g, g]
            }
            Self::Rainbow => [
                to_byte(1.5 - (4.0 * t - 3.0).abs()),
                to_byte(1.5 - (4.0 * t - 2.0).abs()),
                to_byte(1.5 - (4.0 * t - 1.0).abs()),
            ],
            Self::Green => [to_byte(t), to_byte(0.5 + 0.5 * t), to_byte(0.4)],
            Self::HighContrast => [
                to_byte(3.0 * t),
                to_byte(3.0 * t - 1.0),
                to_byte(3.0 * t - 2.0),
            ],
        }
    }

    /// 256-entry lookup table indexed by 8-bit intensity
    pub fn lut(&self) -> [[u8; 3]; 256] {
        let mut lut = [[0u8; 3]; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = self.apply(i as f32 / 255.0);
        }
        lut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        assert_eq!(PaletteMode::Natural.apply(0.0), [0, 0, 0]);
        assert_eq!(PaletteMode::Natural.apply(1.0), [255, 255, 255]);
        assert_eq!(PaletteMode::Inverted.apply(0.0), [255, 255, 255]);
        assert_eq!(PaletteMode::HighContrast.apply(1.0), [255, 255, 255]);
        assert_eq!(PaletteMode::HighContrast.apply(0.0), [0, 0, 0]);
        assert_eq!(PaletteMode::Rainbow.apply(0.0), [0, 0, 128]);
        assert_eq!(PaletteMode::Rainbow.apply(1.0), [128, 0, 0]);
    }

    #[test]
    fn test_bone_has_blue_tint_in_shadows() {
        let [r, _, b] = PaletteMode::Natural.apply(0.3);
        assert!(b > r);
    }

    #[test]
    fn test_lut_matches_apply() {
        for mode in PaletteMode::ALL {
            let lut = mode.lut();
            assert_eq!(lut[0], mode.apply(0.0));
            assert_eq!(lut[255], mode.apply(1.0));
        }
    }

    #[test]
    fn test_camera_palette_mapping_is_distinct() {
        let mut seen = std::collections::HashSet::new();
        for mode in PaletteMode::ALL {
            assert!(seen.insert(mode.camera_palette()));
        }
    }
}
