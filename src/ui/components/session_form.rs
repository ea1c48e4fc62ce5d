use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph, Widget};

use crate::app::{FormField, SessionForm};
use crate::ui::theme::Theme;

/// Popup for the quick-add form.
pub struct SessionFormPopup<'a> {
    form: &'a SessionForm,
    theme: &'a Theme,
}

impl<'a> SessionFormPopup<'a> {
    pub fn new(form: &'a SessionForm, theme: &'a Theme) -> Self {
        Self { form, theme }
    }
}

impl Widget for SessionFormPopup<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let form = self.form;

        Clear.render(area, buf);
        let block = Block::bordered()
            .title(" New session ")
            .border_style(Style::default().fg(colors.accent()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let priority = match form.priority.level() {
            1 => "high",
            2 => "normal",
            _ => "low",
        };
        let fields: [(FormField, &str, String); 6] = [
            (FormField::Title, "Unit", format!("{}▏", form.title)),
            (FormField::Subject, "Subject", form.subject.label().to_string()),
            (FormField::Mode, "Mode", form.mode.as_str().to_string()),
            (FormField::Duration, "Minutes", form.planned.minutes().to_string()),
            (FormField::Priority, "Priority", priority.to_string()),
            (FormField::StartAt, "Start", format!("{}▏", form.start_at)),
        ];

        let mut lines = vec![Line::default()];
        for (field, label, value) in fields {
            let focused = field == form.focus;
            let label_style = if focused {
                Style::default().fg(colors.accent()).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.muted())
            };
            let value = if field.is_text() && !focused {
                value.trim_end_matches('▏').to_string()
            } else {
                value
            };
            let hint = if focused && !field.is_text() { "  ‹space›" } else { "" };
            lines.push(Line::from(vec![
                Span::styled(format!("  {label:<9}"), label_style),
                Span::styled(value, Style::default().fg(colors.fg())),
                Span::styled(hint, Style::default().fg(colors.muted())),
            ]));
        }
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "  [Tab] Next field  [Enter] Save  [Esc] Cancel",
            Style::default().fg(colors.muted()),
        )));

        Paragraph::new(lines).render(inner, buf);
    }
}
