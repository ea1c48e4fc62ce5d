use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Widget};

use crate::ui::theme::Theme;

/// Bordered one-line gauge. The caption defaults to the percentage.
pub struct ProgressBar<'a> {
    label: String,
    ratio: f64,
    caption: Option<String>,
    fill: Option<Color>,
    theme: &'a Theme,
}

impl<'a> ProgressBar<'a> {
    pub fn new(label: &str, ratio: f64, theme: &'a Theme) -> Self {
        Self {
            label: label.to_string(),
            ratio: if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 },
            caption: None,
            fill: None,
            theme,
        }
    }

    pub fn from_pct(label: &str, pct: u32, theme: &'a Theme) -> Self {
        Self::new(label, pct as f64 / 100.0, theme)
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn fill(mut self, color: Color) -> Self {
        self.fill = Some(color);
        self
    }
}

impl Widget for ProgressBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;

        let block = Block::bordered()
            .title(format!(" {} ", self.label))
            .border_style(Style::default().fg(colors.border()));
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let fill = self.fill.unwrap_or_else(|| colors.bar_filled());
        let filled_width = (self.ratio * inner.width as f64).round() as u16;
        for x in inner.x..inner.x + inner.width {
            let style = if x < inner.x + filled_width {
                Style::default().fg(colors.header_fg()).bg(fill)
            } else {
                Style::default().fg(colors.fg()).bg(colors.bar_empty())
            };
            buf[(x, inner.y)].set_style(style);
        }

        let caption = self
            .caption
            .unwrap_or_else(|| format!("{:.0}%", self.ratio * 100.0));
        let width = caption.chars().count() as u16;
        let caption_x = inner.x + inner.width.saturating_sub(width) / 2;
        buf.set_stringn(
            caption_x,
            inner.y,
            &caption,
            inner.width as usize,
            Style::default().fg(colors.header_fg()),
        );
    }
}
