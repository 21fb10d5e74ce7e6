// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Painting primitives for the built-in renderer: affine matrices, polygon
// fill and image drawing on an RGBA canvas.

use image::{Rgba, RgbaImage};

/// PDF-style affine matrix `[a b c d e f]`, mapping `(x, y)` to
/// `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// `self` applied first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn invert(&self) -> Option<Matrix> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f32::EPSILON {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Matrix {
            a,
            b,
            c,
            d,
            e: -(self.e * a + self.f * c),
            f: -(self.e * b + self.f * d),
        })
    }
}

/// Winding rule for polygon fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FillRule {
    NonZero,
    EvenOdd,
}

/// Closed polygons in device space.
pub(crate) type Polygons = Vec<Vec<(f32, f32)>>;

/// An RGBA page buffer, initialised to opaque white.
pub(crate) struct Canvas {
    pixels: RgbaImage,
}

impl Canvas {
    pub fn white(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])),
        }
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Scanline fill, sampling each pixel at its centre.
    pub fn fill_polygons(&mut self, polygons: &Polygons, rule: FillRule, colour: [u8; 3]) {
        let (width, height) = self.pixels.dimensions();
        let edges: Vec<((f32, f32), (f32, f32))> = polygons
            .iter()
            .filter(|polygon| polygon.len() >= 2)
            .flat_map(|polygon| {
                polygon
                    .iter()
                    .zip(polygon.iter().cycle().skip(1))
                    .map(|(&from, &to)| (from, to))
            })
            .filter(|(from, to)| from.1 != to.1)
            .collect();
        if edges.is_empty() {
            return;
        }

        let min_y = edges.iter().map(|(p, q)| p.1.min(q.1)).fold(f32::MAX, f32::min);
        let max_y = edges.iter().map(|(p, q)| p.1.max(q.1)).fold(f32::MIN, f32::max);
        let first_row = (min_y - 0.5).ceil().max(0.0) as u32;
        let last_row = ((max_y - 0.5).floor().min(height as f32 - 1.0)).max(-1.0);
        if last_row < 0.0 {
            return;
        }

        let mut crossings: Vec<(f32, i32)> = Vec::new();
        for row in first_row..=last_row as u32 {
            let sample_y = row as f32 + 0.5;
            crossings.clear();
            for &((x0, y0), (x1, y1)) in &edges {
                let (upward, lo, hi) = if y0 < y1 { (1, y0, y1) } else { (-1, y1, y0) };
                if sample_y < lo || sample_y >= hi {
                    continue;
                }
                let t = (sample_y - y0) / (y1 - y0);
                crossings.push((x0 + t * (x1 - x0), upward));
            }
            crossings.sort_by(|l, r| l.0.total_cmp(&r.0));

            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                let inside = match rule {
                    FillRule::NonZero => winding != 0,
                    FillRule::EvenOdd => winding % 2 != 0,
                };
                if inside {
                    self.fill_span(row, pair[0].0, pair[1].0, width, colour);
                }
            }
        }
    }

    fn fill_span(&mut self, row: u32, from_x: f32, to_x: f32, width: u32, colour: [u8; 3]) {
        let start = (from_x - 0.5).ceil().max(0.0);
        let end = (to_x - 0.5).floor().min(width as f32 - 1.0);
        if end < start {
            return;
        }
        let pixel = Rgba([colour[0], colour[1], colour[2], 255]);
        for x in start as u32..=end as u32 {
            self.pixels.put_pixel(x, row, pixel);
        }
    }

    /// Draw `image` into the unit square mapped to the device by `to_device`.
    /// Image row 0 is the top of the square. Nearest-neighbour sampling,
    /// source-over blending.
    pub fn draw_image(&mut self, image: &RgbaImage, to_device: &Matrix) {
        let Some(to_unit) = to_device.invert() else {
            return;
        };
        let (width, height) = self.pixels.dimensions();
        let (image_w, image_h) = image.dimensions();
        if image_w == 0 || image_h == 0 {
            return;
        }

        let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)].map(|(u, v)| to_device.apply(u, v));
        let min_x = corners.iter().map(|p| p.0).fold(f32::MAX, f32::min).floor().max(0.0);
        let max_x = corners.iter().map(|p| p.0).fold(f32::MIN, f32::max).ceil().min(width as f32);
        let min_y = corners.iter().map(|p| p.1).fold(f32::MAX, f32::min).floor().max(0.0);
        let max_y = corners.iter().map(|p| p.1).fold(f32::MIN, f32::max).ceil().min(height as f32);
        if min_x >= max_x || min_y >= max_y {
            return;
        }

        for y in min_y as u32..max_y as u32 {
            for x in min_x as u32..max_x as u32 {
                let (u, v) = to_unit.apply(x as f32 + 0.5, y as f32 + 0.5);
                if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                    continue;
                }
                let ix = ((u * image_w as f32) as u32).min(image_w - 1);
                let iy = (((1.0 - v) * image_h as f32) as u32).min(image_h - 1);
                let src = image.get_pixel(ix, iy);
                blend(self.pixels.get_pixel_mut(x, y), src);
            }
        }
    }
}

fn blend(dst: &mut Rgba<u8>, src: &Rgba<u8>) {
    let alpha = src.0[3] as u32;
    if alpha == 255 {
        *dst = *src;
        return;
    }
    for channel in 0..3 {
        let mixed = (src.0[channel] as u32 * alpha + dst.0[channel] as u32 * (255 - alpha)) / 255;
        dst.0[channel] = mixed as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_composition_and_inverse() {
        let scale = Matrix::new(2.0, 0.0, 0.0, 3.0, 0.0, 0.0);
        let shift = Matrix::new(1.0, 0.0, 0.0, 1.0, 10.0, 20.0);
        let both = scale.then(&shift);
        assert_eq!(both.apply(1.0, 1.0), (12.0, 23.0));

        let back = both.invert().unwrap();
        let (x, y) = back.apply(12.0, 23.0);
        assert!((x - 1.0).abs() < 1e-4 && (y - 1.0).abs() < 1e-4);
        assert!(Matrix::new(0.0, 0.0, 0.0, 0.0, 1.0, 1.0).invert().is_none());
    }

    #[test]
    fn rectangle_fill_covers_exact_pixels() {
        let mut canvas = Canvas::white(10, 10);
        let square = vec![vec![(2.0, 2.0), (6.0, 2.0), (6.0, 6.0), (2.0, 6.0)]];
        canvas.fill_polygons(&square, FillRule::NonZero, [255, 0, 0]);
        let image = canvas.into_image();
        assert_eq!(image.get_pixel(2, 2).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(5, 5).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(6, 6).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(1, 3).0, [255, 255, 255, 255]);
    }

    #[test]
    fn even_odd_leaves_a_hole() {
        let mut canvas = Canvas::white(10, 10);
        let outer = vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let inner = vec![(3.0, 3.0), (7.0, 3.0), (7.0, 7.0), (3.0, 7.0)];
        canvas.fill_polygons(&vec![outer, inner], FillRule::EvenOdd, [0, 0, 0]);
        let image = canvas.into_image();
        assert_eq!(image.get_pixel(1, 1).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(5, 5).0, [255, 255, 255, 255]);
    }

    #[test]
    fn image_is_drawn_upright() {
        // 1x2 image: red on top, blue below.
        let mut source = RgbaImage::new(1, 2);
        source.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        source.put_pixel(0, 1, Rgba([0, 0, 255, 255]));

        let mut canvas = Canvas::white(4, 4);
        // unit square -> full canvas, y flipped like a page device transform
        canvas.draw_image(&source, &Matrix::new(4.0, 0.0, 0.0, -4.0, 0.0, 4.0));
        let image = canvas.into_image();
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(3, 3).0, [0, 0, 255, 255]);
    }

    #[test]
    fn translucent_pixels_blend_with_the_page() {
        let source = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128]));
        let mut canvas = Canvas::white(2, 2);
        canvas.draw_image(&source, &Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0));
        let pixel = canvas.into_image().get_pixel(1, 1).0;
        assert!(pixel[0] > 100 && pixel[0] < 150);
    }
}
