// Copyright (c) 2026 rezky_nightky

use crate::palette::{Rgb, Rgba};

/// Glow applied to subsequent text draws.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow {
    pub color: Rgba,
    pub blur: f32,
}

/// Pixel-space 2D drawing surface an engine is bound to.
pub trait Surface {
    fn width(&self) -> f32;
    fn height(&self) -> f32;
    fn resize(&mut self, width: f32, height: f32);

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: Rgba);
    fn clear(&mut self);

    fn set_font(&mut self, px: f32);
    fn measure_text(&self, text: &str) -> f32;
    fn fill_text(&mut self, text: &str, x: f32, y: f32, paint: Rgba);
    fn set_shadow(&mut self, shadow: Option<Shadow>);

    fn stroke_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, paint: Rgba);

    fn fill_all(&mut self, paint: Rgba) {
        let (w, h) = (self.width(), self.height());
        self.fill_rect(0.0, 0.0, w, h, paint);
    }
}

/// Pixel size of one terminal cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellMetrics {
    pub cell_w: f32,
    pub cell_h: f32,
}

impl Default for CellMetrics {
    fn default() -> Self {
        Self {
            cell_w: 8.0,
            cell_h: 16.0,
        }
    }
}

const COVERAGE_FLOOR: f32 = 0.02;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Texel {
    pub ch: char,
    pub rgb: Rgb,
    pub coverage: f32,
    pub glow: bool,
    pub tint: Rgb,
    pub tint_a: f32,
    /// Set by a fully opaque fill; hides lower layers until `clear`.
    pub opaque: bool,
}

impl Texel {
    const BLANK: Texel = Texel {
        ch: ' ',
        rgb: Rgb::BLACK,
        coverage: 0.0,
        glow: false,
        tint: Rgb::BLACK,
        tint_a: 0.0,
        opaque: false,
    };

    pub fn has_glyph(&self) -> bool {
        self.ch != ' ' && self.coverage >= COVERAGE_FLOOR
    }

    pub fn has_tint(&self) -> bool {
        self.tint_a >= COVERAGE_FLOOR
    }
}

/// A surface rasterized onto a grid of terminal cells.
///
/// Text lands in the cell containing its anchor point; anything left of or
/// above the grid is clipped. Partial fills fade what is already there, which
/// is how trails persist across frames.
#[derive(Clone, Debug)]
pub struct Canvas {
    cols: u16,
    rows: u16,
    metrics: CellMetrics,
    texels: Vec<Texel>,
    font_px: f32,
    shadow: Option<Shadow>,
}

impl Canvas {
    pub fn new(cols: u16, rows: u16, metrics: CellMetrics) -> Self {
        Self {
            cols,
            rows,
            metrics,
            texels: vec![Texel::BLANK; cols as usize * rows as usize],
            font_px: metrics.cell_h,
            shadow: None,
        }
    }

    #[cfg(test)]
    pub fn cols(&self) -> u16 {
        self.cols
    }

    #[cfg(test)]
    pub fn rows(&self) -> u16 {
        self.rows
    }

    #[allow(dead_code)]
    pub fn metrics(&self) -> CellMetrics {
        self.metrics
    }

    #[allow(dead_code)]
    pub fn font_px(&self) -> f32 {
        self.font_px
    }

    pub fn texel(&self, col: u16, row: u16) -> Option<&Texel> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.texels
            .get(row as usize * self.cols as usize + col as usize)
    }

    #[cfg(test)]
    pub fn glyph_count(&self) -> usize {
        self.texels.iter().filter(|t| t.has_glyph()).count()
    }

    fn cell_of(&self, x: f32, y: f32) -> Option<(i64, i64)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        Some((
            (x / self.metrics.cell_w).floor() as i64,
            (y / self.metrics.cell_h).floor() as i64,
        ))
    }

    fn texel_mut(&mut self, col: i64, row: i64) -> Option<&mut Texel> {
        if col < 0 || row < 0 || col >= self.cols as i64 || row >= self.rows as i64 {
            return None;
        }
        let idx = row as usize * self.cols as usize + col as usize;
        self.texels.get_mut(idx)
    }

    fn plot(&mut self, col: i64, row: i64, ch: char, paint: Rgba, glow: bool) {
        if let Some(t) = self.texel_mut(col, row) {
            if !t.has_glyph() || paint.a >= t.coverage {
                t.ch = ch;
                t.rgb = paint.rgb;
                t.coverage = paint.a;
                t.glow = glow;
            }
        }
    }
}

fn line_glyph(dx: f32, dy: f32) -> char {
    let deg = dy.atan2(dx).to_degrees().rem_euclid(180.0);
    match deg {
        d if !(22.5..157.5).contains(&d) => '-',
        d if d < 67.5 => '\\',
        d if d < 112.5 => '|',
        _ => '/',
    }
}

impl Surface for Canvas {
    fn width(&self) -> f32 {
        self.cols as f32 * self.metrics.cell_w
    }

    fn height(&self) -> f32 {
        self.rows as f32 * self.metrics.cell_h
    }

    fn resize(&mut self, width: f32, height: f32) {
        let to_cells = |v: f32, cell: f32| -> u16 {
            if !v.is_finite() || v <= 0.0 || cell <= 0.0 {
                0
            } else {
                (v / cell).floor().min(u16::MAX as f32) as u16
            }
        };
        self.cols = to_cells(width, self.metrics.cell_w);
        self.rows = to_cells(height, self.metrics.cell_h);
        self.texels.clear();
        self.texels
            .resize(self.cols as usize * self.rows as usize, Texel::BLANK);
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: Rgba) {
        if paint.a <= 0.0 || w <= 0.0 || h <= 0.0 {
            return;
        }
        let Some((c0, r0)) = self.cell_of(x, y) else {
            return;
        };
        let c1 = ((x + w) / self.metrics.cell_w).ceil() as i64;
        let r1 = ((y + h) / self.metrics.cell_h).ceil() as i64;
        let a = paint.a;

        for row in r0.max(0)..r1.min(self.rows as i64) {
            for col in c0.max(0)..c1.min(self.cols as i64) {
                let Some(t) = self.texel_mut(col, row) else {
                    continue;
                };
                if a >= 1.0 {
                    *t = Texel {
                        tint: paint.rgb,
                        tint_a: 1.0,
                        opaque: true,
                        ..Texel::BLANK
                    };
                    continue;
                }
                t.coverage *= 1.0 - a;
                if t.coverage < COVERAGE_FLOOR {
                    t.ch = ' ';
                    t.coverage = 0.0;
                    t.glow = false;
                }

                let out_a = a + t.tint_a * (1.0 - a);
                if out_a < COVERAGE_FLOOR {
                    t.tint_a = 0.0;
                    continue;
                }
                t.tint = t.tint.mix(paint.rgb, a / out_a);
                t.tint_a = out_a;
            }
        }
    }

    fn clear(&mut self) {
        self.texels.fill(Texel::BLANK);
    }

    fn set_font(&mut self, px: f32) {
        if px.is_finite() && px > 0.0 {
            self.font_px = px;
        }
    }

    fn measure_text(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.metrics.cell_w
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, paint: Rgba) {
        if paint.a <= 0.0 {
            return;
        }
        let Some((col, row)) = self.cell_of(x, y) else {
            return;
        };
        let glow = self.shadow.is_some_and(|s| s.blur > 0.0 && s.color.a > 0.0);
        for (i, ch) in text.chars().enumerate() {
            if ch.is_control() {
                continue;
            }
            self.plot(col + i as i64, row, ch, paint, glow);
        }
    }

    fn set_shadow(&mut self, shadow: Option<Shadow>) {
        self.shadow = shadow;
    }

    fn stroke_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, paint: Rgba) {
        if paint.a <= 0.0 {
            return;
        }
        let (Some((mut cx, mut cy)), Some((ex, ey))) = (self.cell_of(x0, y0), self.cell_of(x1, y1))
        else {
            return;
        };
        let ch = line_glyph(x1 - x0, y1 - y0);

        let dx = (ex - cx).abs();
        let dy = -(ey - cy).abs();
        let sx = if cx < ex { 1 } else { -1 };
        let sy = if cy < ey { 1 } else { -1 };
        let mut err = dx + dy;

        // Bresenham; the step cap keeps wildly off-screen endpoints cheap.
        let max_steps = (self.cols as i64 + self.rows as i64) * 4 + 4;
        for _ in 0..max_steps {
            self.plot(cx, cy, ch, paint, false);
            if cx == ex && cy == ey {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                cx += sx;
            }
            if e2 <= dx {
                err += dx;
                cy += sy;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn green(a: f32) -> Rgba {
        Rgba::new(Rgb::new(0, 255, 65), a)
    }

    #[test]
    fn text_lands_in_the_containing_cell_and_clips() {
        let mut c = Canvas::new(10, 5, CellMetrics::default());
        c.fill_text("ab", 17.0, 33.0, green(1.0));
        assert_eq!(c.texel(2, 2).unwrap().ch, 'a');
        assert_eq!(c.texel(3, 2).unwrap().ch, 'b');

        c.fill_text("x", 5.0, -20.0, green(1.0));
        c.fill_text("y", 500.0, 10.0, green(1.0));
        assert_eq!(c.glyph_count(), 2);
    }

    #[test]
    fn low_alpha_fill_fades_until_erased() {
        let mut c = Canvas::new(4, 4, CellMetrics::default());
        c.fill_text("z", 0.0, 0.0, green(1.0));
        c.fill_all(Rgba::new(Rgb::BLACK, 0.05));
        let t = *c.texel(0, 0).unwrap();
        assert_eq!(t.ch, 'z');
        assert!((t.coverage - 0.95).abs() < 1e-5);

        for _ in 0..200 {
            c.fill_all(Rgba::new(Rgb::BLACK, 0.05));
        }
        assert_eq!(c.glyph_count(), 0);
    }

    #[test]
    fn opaque_fill_erases_and_marks_the_texel() {
        let mut c = Canvas::new(4, 4, CellMetrics::default());
        c.fill_text("w", 0.0, 0.0, green(1.0));
        c.fill_rect(0.0, 0.0, 8.0, 16.0, Rgba::opaque(Rgb::WHITE));
        let t = *c.texel(0, 0).unwrap();
        assert!(t.opaque && !t.has_glyph());
        assert_eq!(t.tint, Rgb::WHITE);
        assert!(!c.texel(1, 0).unwrap().opaque);
        c.clear();
        assert!(!c.texel(0, 0).unwrap().opaque);
    }

    #[test]
    fn faint_text_does_not_cover_bright_text() {
        let mut c = Canvas::new(4, 4, CellMetrics::default());
        c.fill_text("A", 0.0, 0.0, green(0.9));
        c.fill_text("b", 0.0, 0.0, green(0.2));
        assert_eq!(c.texel(0, 0).unwrap().ch, 'A');
        c.fill_text("C", 0.0, 0.0, green(1.0));
        assert_eq!(c.texel(0, 0).unwrap().ch, 'C');
    }

    #[test]
    fn resize_to_zero_is_a_valid_empty_canvas() {
        let mut c = Canvas::new(4, 4, CellMetrics::default());
        c.resize(0.0, 0.0);
        assert_eq!((c.cols(), c.rows()), (0, 0));
        c.fill_text("q", 0.0, 0.0, green(1.0));
        c.stroke_line(0.0, 0.0, 100.0, 100.0, green(1.0));
        assert_eq!(c.glyph_count(), 0);
    }

    #[test]
    fn lines_pick_a_glyph_by_direction() {
        let mut c = Canvas::new(10, 10, CellMetrics::default());
        c.stroke_line(0.0, 8.0, 79.0, 8.0, green(0.4));
        assert_eq!(c.texel(0, 0).unwrap().ch, '-');
        assert_eq!(c.texel(9, 0).unwrap().ch, '-');

        let mut v = Canvas::new(10, 10, CellMetrics::default());
        v.stroke_line(4.0, 0.0, 4.0, 150.0, green(0.4));
        assert_eq!(v.texel(0, 5).unwrap().ch, '|');
    }

    #[test]
    fn shadow_marks_text_as_glowing() {
        let mut c = Canvas::new(4, 4, CellMetrics::default());
        c.set_shadow(Some(Shadow {
            color: green(0.5),
            blur: 8.0,
        }));
        c.fill_text("g", 0.0, 0.0, green(1.0));
        c.set_shadow(None);
        c.fill_text("h", 8.0, 0.0, green(1.0));
        assert!(c.texel(0, 0).unwrap().glow);
        assert!(!c.texel(1, 0).unwrap().glow);
    }
}
