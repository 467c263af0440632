use image::{Rgb, RgbImage};

pub const CROSSHAIR_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const STROKE: u32 = 2;

/// Arm length of the crosshair on each side of centre
pub fn crosshair_arm(width: u32, height: u32) -> u32 {
    (width.min(height) / 20).max(10)
}

/// Draw a centred "+" with a 2-pixel stroke, clipped to the image.
pub fn draw_crosshair(img: &mut RgbImage) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let (cx, cy) = (w as i64 / 2, h as i64 / 2);
    let arm = crosshair_arm(w, h) as i64;
    let half = (STROKE / 2) as i64;

    for offset in -half..(STROKE as i64 - half) {
        for d in -arm..=arm {
            put(img, cx + d, cy + offset);
            put(img, cx + offset, cy + d);
        }
    }
}

fn put(img: &mut RgbImage, x: i64, y: i64) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, CROSSHAIR_COLOR);
    }
}
