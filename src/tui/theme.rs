use ratatui::style::Color;

use crate::model::UiConfig;
use crate::ops::countdown::Countdown;

/// Parsed color theme for the TUI
#[derive(Debug, Clone)]
pub struct Theme {
    pub background: Color,
    pub text: Color,
    pub text_bright: Color,
    pub highlight: Color,
    pub dim: Color,
    pub selection_bg: Color,
    pub selection_border: Color,
    /// Countdown past the end time
    pub late: Color,
    /// Completed tasks
    pub done: Color,
    /// Countdown inside the start/end window
    pub running: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            background: Color::Rgb(0x0C, 0x00, 0x1B),
            text: Color::Rgb(0xB0, 0xAA, 0xFF),
            text_bright: Color::Rgb(0xFF, 0xFF, 0xFF),
            highlight: Color::Rgb(0xFB, 0x41, 0x96),
            dim: Color::Rgb(0x7D, 0x78, 0xBF),
            selection_bg: Color::Rgb(0x3D, 0x14, 0x38),
            selection_border: Color::Rgb(0xFB, 0x41, 0x96),
            late: Color::Rgb(0xFF, 0x44, 0x44),
            done: Color::Rgb(0x44, 0xFF, 0x88),
            running: Color::Rgb(0xFF, 0xD7, 0x00),
        }
    }
}

/// Parse a hex color string like "#FF4444" into an RGB Color
fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

impl Theme {
    /// Apply `[ui.colors]` overrides on top of the defaults. Unknown keys and
    /// malformed values are ignored.
    pub fn from_config(ui: &UiConfig) -> Self {
        let mut theme = Theme::default();

        for (key, value) in &ui.colors {
            let Some(color) = parse_hex_color(value) else {
                log::warn!("ignoring ui color key={} value={}", key, value);
                continue;
            };
            match key.as_str() {
                "background" => theme.background = color,
                "text" => theme.text = color,
                "text_bright" => theme.text_bright = color,
                "highlight" => theme.highlight = color,
                "dim" => theme.dim = color,
                "selection_bg" => theme.selection_bg = color,
                "selection_border" => theme.selection_border = color,
                "late" => theme.late = color,
                "done" => theme.done = color,
                "running" => theme.running = color,
                _ => log::warn!("unknown ui color key={}", key),
            }
        }

        theme
    }

    /// Color for a countdown label
    pub fn countdown_color(&self, countdown: &Countdown) -> Color {
        match countdown {
            Countdown::Completed => self.done,
            Countdown::StartsIn(_) => self.dim,
            Countdown::Remaining(_) => self.running,
            Countdown::Late(_) => self.late,
        }
    }
}
