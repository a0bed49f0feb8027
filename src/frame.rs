// Copyright (c) 2026 rezky_nightky

use crossterm::style::Color;

use crate::palette::{quantize, ColorMode, Rgb};
use crate::surface::Canvas;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
}

impl Cell {
    pub fn blank_with_bg(bg: Option<Color>) -> Self {
        Self {
            ch: ' ',
            fg: None,
            bg,
            bold: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u16,
    pub height: u16,
    pub cells: Vec<Cell>,
    gen: u32,
    cell_gen: Vec<u32>,
    blank: Cell,
    dirty_all: bool,
    dirty_map: Vec<bool>,
    dirty: Vec<usize>,
}

impl Frame {
    pub fn new(width: u16, height: u16, bg: Option<Color>) -> Self {
        let len = width as usize * height as usize;
        let blank = Cell::blank_with_bg(bg);
        let gen = 1u32;
        Self {
            width,
            height,
            cells: vec![blank; len],
            gen,
            cell_gen: vec![gen; len],
            blank,
            dirty_all: true,
            dirty_map: vec![false; len],
            dirty: Vec::new(),
        }
    }

    pub fn clear_with_bg(&mut self, bg: Option<Color>) {
        self.blank = Cell::blank_with_bg(bg);
        self.gen = self.gen.wrapping_add(1);
        if self.gen == 0 {
            self.cell_gen.fill(0);
            self.gen = 1;
        }
        self.dirty_all = true;
        self.dirty.clear();
    }

    pub fn is_dirty_all(&self) -> bool {
        self.dirty_all
    }

    pub fn dirty_indices(&self) -> &[usize] {
        &self.dirty
    }

    pub fn clear_dirty(&mut self) {
        if self.dirty_all {
            self.dirty_all = false;
            self.dirty_map.fill(false);
            self.dirty.clear();
            return;
        }

        for &i in &self.dirty {
            if let Some(v) = self.dirty_map.get_mut(i) {
                *v = false;
            }
        }
        self.dirty.clear();
    }

    pub fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    #[allow(dead_code)]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        self.index(x, y).map(|i| {
            if self.cell_gen.get(i).copied() == Some(self.gen) {
                &self.cells[i]
            } else {
                &self.blank
            }
        })
    }

    pub fn cell_at_index(&self, i: usize) -> Cell {
        if self.cell_gen.get(i).copied() == Some(self.gen) {
            self.cells[i]
        } else {
            self.blank
        }
    }

    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(i) = self.index(x, y) {
            let cur = if self.cell_gen.get(i).copied() == Some(self.gen) {
                self.cells[i]
            } else {
                self.blank
            };
            if cur == cell {
                return;
            }

            self.cells[i] = cell;
            if let Some(v) = self.cell_gen.get_mut(i) {
                *v = self.gen;
            }
            if !self.dirty_all && self.dirty_map.get(i).copied() == Some(false) {
                self.dirty_map[i] = true;
                self.dirty.push(i);
            }
        }
    }

    /// Flattens `layers` (bottom first) over `background` into terminal cells.
    ///
    /// An opaque texel hides everything under it. A translucent tint only shifts
    /// the cell background; glyphs below it stay visible until a higher glyph lands.
    pub fn compose(&mut self, layers: &[&Canvas], background: Rgb, mode: ColorMode) {
        for y in 0..self.height {
            for x in 0..self.width {
                let mut bg = background;
                let mut glyph: Option<(char, Rgb, bool)> = None;

                for layer in layers {
                    let Some(t) = layer.texel(x, y) else {
                        continue;
                    };
                    if t.opaque {
                        bg = t.tint;
                        glyph = None;
                    } else if t.has_tint() {
                        bg = bg.mix(t.tint, t.tint_a);
                    }
                    if t.has_glyph() {
                        glyph = Some((t.ch, bg.mix(t.rgb, t.coverage), t.glow));
                    }
                }

                let bg_color = quantize(bg, mode);
                let cell = match glyph {
                    Some((ch, fg, bold)) => Cell {
                        ch,
                        fg: quantize(fg, mode),
                        bg: bg_color,
                        bold: bold || mode == ColorMode::Mono,
                    },
                    None => Cell::blank_with_bg(bg_color),
                };
                self.set(x, y, cell);
            }
        }
    }
}
