// Copyright (c) 2026 rezky_nightky

use crate::palette::Rgba;
use crate::surface::Surface;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxCell {
    pub col: u16,
    pub row: u16,
    pub ch: char,
}

/// Centered text box, optionally bordered with `+ - |`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageBox {
    pub border: bool,
    pub pad_x: u16,
    pub pad_y: u16,
}

impl Default for MessageBox {
    fn default() -> Self {
        Self {
            border: true,
            pad_x: 2,
            pad_y: 1,
        }
    }
}

impl MessageBox {
    /// Lays `text` out centered on a `cols` x `rows` grid. Long lines wrap; lines past
    /// the available height are dropped. Returns nothing if even an empty box won't fit.
    pub fn layout(&self, text: &str, cols: u16, rows: u16) -> Vec<BoxCell> {
        let border: u16 = if self.border { 1 } else { 0 };
        let frame_w = (2 * border).saturating_add(2u16.saturating_mul(self.pad_x));
        let frame_h = (2 * border).saturating_add(2u16.saturating_mul(self.pad_y));

        if cols <= frame_w || rows <= frame_h {
            return Vec::new();
        }

        let max_w = cols - frame_w;
        let max_h = rows - frame_h;

        let mut lines: Vec<Vec<char>> = Vec::new();
        for raw in text.split('\n') {
            if lines.len() as u16 >= max_h {
                break;
            }
            let chars: Vec<char> = raw.chars().collect();
            if chars.is_empty() {
                lines.push(Vec::new());
                continue;
            }
            for chunk in chars.chunks(max_w as usize) {
                if lines.len() as u16 >= max_h {
                    break;
                }
                lines.push(chunk.to_vec());
            }
        }
        if lines.is_empty() {
            lines.push(Vec::new());
        }

        let content_w = lines
            .iter()
            .map(|l| l.len() as u16)
            .max()
            .unwrap_or(0)
            .clamp(1, max_w);
        let content_h = lines.len() as u16;

        let box_w = content_w + frame_w;
        let box_h = content_h + frame_h;
        let start_col = cols / 2 - box_w / 2;
        let start_row = rows / 2 - box_h / 2;

        let inner_x = border + self.pad_x;
        let inner_y = border + self.pad_y;

        let mut out = Vec::with_capacity(box_w as usize * box_h as usize);
        for y in 0..box_h {
            for x in 0..box_w {
                let mut ch = ' ';
                if border == 1 {
                    let edge_y = y == 0 || y + 1 == box_h;
                    let edge_x = x == 0 || x + 1 == box_w;
                    ch = match (edge_y, edge_x) {
                        (true, true) => '+',
                        (true, false) => '-',
                        (false, true) => '|',
                        _ => ' ',
                    };
                }

                let in_content = y >= inner_y
                    && y < inner_y + content_h
                    && x >= inner_x
                    && x < inner_x + content_w;
                if in_content {
                    if let Some(line) = lines.get((y - inner_y) as usize) {
                        let left_pad = (content_w as usize).saturating_sub(line.len()) / 2;
                        let ix = (x - inner_x) as usize;
                        if ix >= left_pad && ix < left_pad + line.len() {
                            ch = line[ix - left_pad];
                        }
                    }
                }

                out.push(BoxCell {
                    col: start_col + x,
                    row: start_row + y,
                    ch,
                });
            }
        }
        out
    }

    /// Paints the box: an opaque `fill` behind every cell, then the glyphs in `paint`.
    pub fn draw<S: Surface>(&self, surface: &mut S, text: &str, line_h: f32, paint: Rgba, fill: Rgba) {
        let char_w = surface.measure_text("0");
        if char_w <= 0.0 || line_h <= 0.0 {
            return;
        }
        let cols = (surface.width() / char_w).floor().min(u16::MAX as f32) as u16;
        let rows = (surface.height() / line_h).floor().min(u16::MAX as f32) as u16;

        let mut buf = [0u8; 4];
        for cell in self.layout(text, cols, rows) {
            let x = cell.col as f32 * char_w;
            let y = cell.row as f32 * line_h;
            surface.fill_rect(x, y, char_w, line_h, fill);
            if cell.ch != ' ' {
                surface.fill_text(cell.ch.encode_utf8(&mut buf), x, y, paint);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(cells: &[BoxCell], col: u16, row: u16) -> Option<char> {
        cells
            .iter()
            .find(|c| c.col == col && c.row == row)
            .map(|c| c.ch)
    }

    fn row_text(cells: &[BoxCell], row: u16) -> String {
        cells.iter().filter(|c| c.row == row).map(|c| c.ch).collect()
    }

    #[test]
    fn bordered_box_is_centered() {
        let cells = MessageBox::default().layout("HI", 20, 9);
        // 2 wide content + 2 border + 4 padding, 1 tall + 2 border + 2 padding
        assert_eq!(cells.len(), 8 * 5);
        assert_eq!(at(&cells, 6, 2), Some('+'));
        assert_eq!(at(&cells, 13, 6), Some('+'));
        assert_eq!(at(&cells, 7, 2), Some('-'));
        assert_eq!(at(&cells, 6, 3), Some('|'));
        assert_eq!(row_text(&cells, 4), "|  HI  |");
    }

    #[test]
    fn shorter_lines_are_centered_within_the_widest() {
        let cells = MessageBox {
            border: false,
            pad_x: 0,
            pad_y: 0,
        }
        .layout("ABCD\nX", 4, 2);
        assert_eq!(row_text(&cells, 0), "ABCD");
        assert_eq!(row_text(&cells, 1), " X  ");
    }

    #[test]
    fn long_lines_wrap_and_extra_lines_drop() {
        let mb = MessageBox {
            border: false,
            pad_x: 0,
            pad_y: 0,
        };
        let cells = mb.layout("abcdef", 4, 3);
        assert_eq!(row_text(&cells, 0), "abcd");
        assert_eq!(row_text(&cells, 1), " ef ");

        let cells = mb.layout("1\n2\n3\n4", 3, 2);
        assert!(cells.iter().all(|c| c.ch != '3' && c.ch != '4'));
    }

    #[test]
    fn too_small_grid_yields_nothing() {
        assert!(MessageBox::default().layout("x", 6, 9).is_empty());
        assert!(MessageBox::default().layout("x", 40, 4).is_empty());
    }

    #[test]
    fn draw_paints_fill_and_glyphs() {
        use crate::palette::Rgb;
        use crate::surface::recorder::Recorder;

        let mut rec = Recorder::new(160.0, 160.0);
        let paint = Rgba::opaque(Rgb::new(0, 255, 65));
        let fill = Rgba::opaque(Rgb::BLACK);
        MessageBox::default().draw(&mut rec, "OK", 16.0, paint, fill);
        let texts = rec.texts();
        assert!(texts.contains(&"O") && texts.contains(&"K"));
        assert!(texts.contains(&"+"));
    }
}
