// Copyright (c) 2026 rezky_nightky

use std::io::{stdout, Result, Stdout, Write};
use std::time::Duration;

use crossterm::{
    cursor, event,
    style::{
        Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
    },
    terminal, ExecutableCommand, QueueableCommand,
};

use crate::frame::{Cell, Frame};

struct LastFrame {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl LastFrame {
    fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::blank_with_bg(None); width as usize * height as usize],
        }
    }

    fn fits(&self, frame: &Frame) -> bool {
        self.width == frame.width && self.height == frame.height
    }
}

/// Attributes currently set on the terminal, so runs only emit what changed.
#[derive(Default)]
struct Pen {
    fg: Option<Color>,
    bg: Option<Color>,
    bold: bool,
}

impl Pen {
    fn apply(&mut self, out: &mut Stdout, cell: &Cell) -> Result<()> {
        if cell.fg != self.fg {
            out.queue(SetForegroundColor(cell.fg.unwrap_or(Color::Reset)))?;
            self.fg = cell.fg;
        }
        if cell.bg != self.bg {
            out.queue(SetBackgroundColor(cell.bg.unwrap_or(Color::Reset)))?;
            self.bg = cell.bg;
        }
        if cell.bold != self.bold {
            out.queue(SetAttribute(if cell.bold {
                Attribute::Bold
            } else {
                Attribute::NormalIntensity
            }))?;
            self.bold = cell.bold;
        }
        Ok(())
    }
}

pub struct Terminal {
    stdout: Stdout,
    last: Option<LastFrame>,
    run_buf: String,
    row_dirty: Vec<Vec<usize>>,
    touched_rows: Vec<u16>,
}

impl Terminal {
    /// Raw mode, alternate screen, hidden cursor and mouse reporting.
    pub fn new() -> Result<Self> {
        let mut out = stdout();
        terminal::enable_raw_mode()?;
        let init_res: Result<()> = (|| {
            out.execute(terminal::EnterAlternateScreen)?;
            out.execute(cursor::Hide)?;
            let _ = out.execute(terminal::DisableLineWrap);
            out.execute(event::EnableMouseCapture)?;
            let _ = out.execute(event::EnableFocusChange);
            out.execute(SetAttribute(Attribute::Reset))?;
            out.execute(ResetColor)?;
            out.execute(terminal::Clear(terminal::ClearType::All))?;
            out.flush()?;
            Ok(())
        })();
        if let Err(e) = init_res {
            restore(&mut out);
            return Err(e);
        }
        tracing::debug!("terminal ready");
        Ok(Self {
            stdout: out,
            last: None,
            run_buf: String::with_capacity(64),
            row_dirty: Vec::new(),
            touched_rows: Vec::new(),
        })
    }

    pub fn size(&self) -> Result<(u16, u16)> {
        terminal::size()
    }

    pub fn poll_event(timeout: Duration) -> Result<bool> {
        event::poll(timeout)
    }

    pub fn read_event() -> Result<event::Event> {
        event::read()
    }

    /// Writes the frame, redrawing everything only on a size change or a large diff.
    pub fn draw(&mut self, frame: &mut Frame) -> Result<()> {
        let reusable = self.last.as_ref().is_some_and(|l| l.fits(frame));
        if !reusable {
            self.stdout
                .queue(terminal::Clear(terminal::ClearType::All))?;
        }

        let total_cells = frame.width as usize * frame.height as usize;
        let dirty_is_large = total_cells > 0 && frame.dirty_indices().len() >= total_cells / 3;

        if !reusable || frame.is_dirty_all() || dirty_is_large {
            self.redraw_all(frame)?;
        } else {
            self.redraw_dirty(frame)?;
        }

        self.stdout.queue(SetAttribute(Attribute::Reset))?;
        self.stdout.queue(ResetColor)?;
        self.stdout.flush()?;
        frame.clear_dirty();
        Ok(())
    }

    fn redraw_all(&mut self, frame: &Frame) -> Result<()> {
        if !self.last.as_ref().is_some_and(|l| l.fits(frame)) {
            self.last = Some(LastFrame::new(frame.width, frame.height));
        }
        let Some(last) = self.last.as_mut() else {
            return Ok(());
        };
        let mut pen = Pen::default();

        for y in 0..frame.height {
            self.stdout.queue(cursor::MoveTo(0, y))?;
            for x in 0..frame.width {
                let idx = y as usize * frame.width as usize + x as usize;
                let cell = frame.cell_at_index(idx);
                pen.apply(&mut self.stdout, &cell)?;
                self.stdout.queue(Print(cell.ch))?;
                last.cells[idx] = cell;
            }
        }
        Ok(())
    }

    /// Emits only changed cells, batching horizontal runs that share a style.
    fn redraw_dirty(&mut self, frame: &Frame) -> Result<()> {
        let Some(last) = self.last.as_mut() else {
            return Ok(());
        };
        let width = frame.width as usize;
        let mut pen = Pen::default();
        let mut cur_pos: Option<(u16, u16)> = None;

        if self.row_dirty.len() != frame.height as usize {
            self.row_dirty = vec![Vec::new(); frame.height as usize];
        }
        for r in &mut self.row_dirty {
            r.clear();
        }
        self.touched_rows.clear();

        for &idx in frame.dirty_indices() {
            let y = (idx / width) as u16;
            if y >= frame.height {
                continue;
            }
            let row = &mut self.row_dirty[y as usize];
            if row.is_empty() {
                self.touched_rows.push(y);
            }
            row.push(idx);
        }
        self.touched_rows.sort_unstable();

        for &y0 in &self.touched_rows {
            let row = &mut self.row_dirty[y0 as usize];
            row.sort_unstable();
            let mut i = 0usize;
            while i < row.len() {
                let idx0 = row[i];
                let cell0 = frame.cell_at_index(idx0);
                if last.cells.get(idx0) == Some(&cell0) {
                    i += 1;
                    continue;
                }
                last.cells[idx0] = cell0;

                self.run_buf.clear();
                self.run_buf.push(cell0.ch);
                let mut run_len: u16 = 1;
                let mut prev = idx0;
                let mut j = i + 1;
                while j < row.len() {
                    let idx1 = row[j];
                    if idx1 != prev + 1 {
                        break;
                    }
                    let cell1 = frame.cell_at_index(idx1);
                    if last.cells.get(idx1) == Some(&cell1)
                        || (cell1.fg, cell1.bg, cell1.bold) != (cell0.fg, cell0.bg, cell0.bold)
                    {
                        break;
                    }
                    self.run_buf.push(cell1.ch);
                    last.cells[idx1] = cell1;
                    run_len = run_len.saturating_add(1);
                    prev = idx1;
                    j += 1;
                }

                let x0 = (idx0 % width) as u16;
                if cur_pos != Some((x0, y0)) {
                    self.stdout.queue(cursor::MoveTo(x0, y0))?;
                }
                pen.apply(&mut self.stdout, &cell0)?;
                self.stdout.queue(Print(self.run_buf.as_str()))?;
                let next_x = x0.saturating_add(run_len);
                cur_pos = (next_x < frame.width).then_some((next_x, y0));

                i = j;
            }
            row.clear();
        }
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        restore(&mut self.stdout);
        tracing::debug!("terminal restored");
    }
}

fn restore(out: &mut Stdout) {
    let _ = out.execute(SetAttribute(Attribute::Reset));
    let _ = out.execute(ResetColor);
    let _ = out.execute(event::DisableFocusChange);
    let _ = out.execute(event::DisableMouseCapture);
    let _ = out.execute(cursor::Show);
    let _ = out.execute(terminal::EnableLineWrap);
    let _ = out.execute(terminal::LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
    let _ = out.flush();
}

/// Used from the panic hook and signal handlers, where no `Terminal` is reachable.
pub fn restore_terminal_best_effort() {
    restore(&mut stdout());
}
