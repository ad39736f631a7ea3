//! Raster primitives on an RGBA image.
//!
//! Shapes are filled by sampling pixel centers, without antialiasing. Everything is clipped to
//! the image bounds.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use glam::Vec2;
use image::{Rgba, RgbaImage};

/// Width and height of one unscaled glyph.
pub const GLYPH_SIZE: u32 = 8;

pub fn rgba([r, g, b]: [u8; 3]) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

/// Fill the pixels in `[x, x + w) × [y, y + h)`.
pub fn fill_rect(image: &mut RgbaImage, x: i64, y: i64, w: u32, h: u32, color: Rgba<u8>) {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let (x0, x1) = (x.max(0), (x + w as i64).min(width));
    let (y0, y1) = (y.max(0), (y + h as i64).min(height));
    for py in y0..y1 {
        for px in x0..x1 {
            image.put_pixel(px as u32, py as u32, color);
        }
    }
}

pub fn fill_disc(image: &mut RgbaImage, center: Vec2, radius: f32, color: Rgba<u8>) {
    if radius <= 0.0 {
        return;
    }
    let (width, height) = (image.width() as f32, image.height() as f32);
    let x0 = (center.x - radius).floor().max(0.0) as u32;
    let y0 = (center.y - radius).floor().max(0.0) as u32;
    let x1 = (center.x + radius).ceil().min(width).max(0.0) as u32;
    let y1 = (center.y + radius).ceil().min(height).max(0.0) as u32;
    for py in y0..y1 {
        for px in x0..x1 {
            let sample = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
            if sample.distance_squared(center) <= radius * radius {
                image.put_pixel(px, py, color);
            }
        }
    }
}

/// Fill a simple polygon with the even-odd rule.
pub fn fill_polygon(image: &mut RgbaImage, points: &[Vec2], color: Rgba<u8>) {
    if points.len() < 3 {
        return;
    }
    let (width, height) = (image.width() as f32, image.height() as f32);
    let ymin = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let ymax = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
    let y0 = ymin.floor().max(0.0) as u32;
    let y1 = ymax.ceil().min(height).max(0.0) as u32;

    let mut crossings = Vec::new();
    for py in y0..y1 {
        let y = py as f32 + 0.5;
        crossings.clear();
        for (i, &a) in points.iter().enumerate() {
            let b = points[(i + 1) % points.len()];
            if (a.y <= y) != (b.y <= y) {
                crossings.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        crossings.sort_by(f32::total_cmp);
        for span in crossings.chunks_exact(2) {
            let x0 = (span[0] - 0.5).ceil().max(0.0) as u32;
            let x1 = (span[1] - 0.5).ceil().min(width).max(0.0) as u32;
            for px in x0..x1 {
                image.put_pixel(px, py, color);
            }
        }
    }
}

/// Draw a line segment of the given width as a filled quad.
pub fn draw_line(image: &mut RgbaImage, a: Vec2, b: Vec2, width: f32, color: Rgba<u8>) {
    let Some(dir) = (b - a).try_normalize() else {
        return;
    };
    let normal = dir.perp() * 0.5 * width.max(1.0);
    fill_polygon(image, &[a + normal, b + normal, b - normal, a - normal], color);
}

/// Width in pixels of `text` drawn at `scale`.
pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH_SIZE * scale
}

/// Draw `text` with its top-left corner at `(x, y)`, with each glyph pixel blown up to a
/// `scale` by `scale` square.
pub fn draw_text(image: &mut RgbaImage, x: i64, y: i64, text: &str, scale: u32, color: Rgba<u8>) {
    let step = (GLYPH_SIZE * scale) as i64;
    for (i, ch) in text.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            continue;
        };
        let gx = x + i as i64 * step;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits & (1 << col) != 0 {
                    let px = gx + (col * scale) as i64;
                    let py = y + row as i64 * scale as i64;
                    fill_rect(image, px, py, scale, scale, color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn count(image: &RgbaImage, color: Rgba<u8>) -> usize {
        image.pixels().filter(|&&p| p == color).count()
    }

    #[test]
    fn rect_is_clipped() {
        let mut image = RgbaImage::from_pixel(10, 10, WHITE);
        fill_rect(&mut image, -5, 8, 10, 10, BLACK);
        assert_eq!(count(&image, BLACK), 5 * 2);
    }

    #[test]
    fn axis_aligned_line() {
        let mut image = RgbaImage::from_pixel(20, 20, WHITE);
        draw_line(&mut image, Vec2::new(2.0, 10.0), Vec2::new(12.0, 10.0), 2.0, BLACK);
        assert_eq!(count(&image, BLACK), 10 * 2);
        assert_eq!(*image.get_pixel(2, 9), BLACK);
        assert_eq!(*image.get_pixel(2, 11), WHITE);
    }

    #[test]
    fn disc_area() {
        let mut image = RgbaImage::from_pixel(100, 100, WHITE);
        fill_disc(&mut image, Vec2::new(50.0, 50.0), 20.0, BLACK);
        let area = count(&image, BLACK) as f32;
        let expected = std::f32::consts::PI * 400.0;
        assert!((area - expected).abs() / expected < 0.03);
    }

    #[test]
    fn degenerate_shapes_draw_nothing() {
        let mut image = RgbaImage::from_pixel(10, 10, WHITE);
        draw_line(&mut image, Vec2::splat(5.0), Vec2::splat(5.0), 3.0, BLACK);
        fill_polygon(&mut image, &[Vec2::ZERO, Vec2::ONE], BLACK);
        fill_disc(&mut image, Vec2::splat(5.0), 0.0, BLACK);
        assert_eq!(count(&image, BLACK), 0);
    }

    #[test]
    fn text() {
        let mut image = RgbaImage::from_pixel(40, 20, WHITE);
        draw_text(&mut image, 0, 0, "N", 2, BLACK);
        assert!(count(&image, BLACK) > 0);
        // Nothing beyond the first glyph.
        assert!((16..40).all(|x| (0..20).all(|y| *image.get_pixel(x, y) == WHITE)));
        assert_eq!(text_width("OH", 2), 32);
    }
}
