use std::io::{self, Stdout, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use tiny_skia::Pixmap;

/// Shows a raster surface in the terminal, two pixel rows per cell, with a
/// one-line status bar underneath.
///
/// Raw mode and the alternate screen are restored when the presenter drops.
pub struct TerminalPresenter {
    out: Stdout,
}

impl TerminalPresenter {
    pub fn enter() -> io::Result<Self> {
        let mut out = io::stdout();
        enable_raw_mode()?;
        execute!(out, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        Ok(Self { out })
    }

    /// Pixel size of the surface that fills the terminal above the status
    /// line.
    pub fn surface_size() -> io::Result<(u32, u32)> {
        let (cols, rows) = terminal::size()?;
        let cols = u32::from(cols.max(1));
        let rows = u32::from(rows.saturating_sub(1).max(1));
        Ok((cols, rows * 2))
    }

    pub fn present(&mut self, surface: &Pixmap, status: &str) -> io::Result<()> {
        let rows = surface.height() / 2;
        let mut last: Option<(Color, Color)> = None;

        for row in 0..rows {
            queue!(self.out, MoveTo(0, row as u16))?;
            for col in 0..surface.width() {
                let top = pixel_color(surface, col, row * 2);
                let bottom = pixel_color(surface, col, row * 2 + 1);
                if last != Some((top, bottom)) {
                    queue!(self.out, SetForegroundColor(top), SetBackgroundColor(bottom))?;
                    last = Some((top, bottom));
                }
                queue!(self.out, Print('▀'))?;
            }
        }

        let status: String = status.chars().take(surface.width() as usize).collect();
        queue!(
            self.out,
            ResetColor,
            MoveTo(0, rows as u16),
            Clear(ClearType::CurrentLine),
            Print(status)
        )?;
        self.out.flush()
    }
}

impl Drop for TerminalPresenter {
    fn drop(&mut self) {
        let _ = execute!(self.out, ResetColor, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

fn pixel_color(surface: &Pixmap, x: u32, y: u32) -> Color {
    match surface.pixel(x, y) {
        Some(px) => {
            let px = px.demultiply();
            Color::Rgb {
                r: px.red(),
                g: px.green(),
                b: px.blue(),
            }
        }
        None => Color::Black,
    }
}
