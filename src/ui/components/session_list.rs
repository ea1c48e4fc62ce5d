use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget};

use crate::plan::session::{Session, SessionMode, SessionStatus};
use crate::plan::timer::Phase;
use crate::ui::theme::Theme;

/// One line of the day list. `phase` is set only for the session on the clock.
pub struct SessionRow<'a> {
    pub session: &'a Session,
    pub remaining_secs: u64,
    pub phase: Option<Phase>,
    pub paused: bool,
    pub segment_secs: u64,
}

pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn mode_label(mode: &SessionMode) -> String {
    match mode {
        SessionMode::Tutor => "Tutor".to_string(),
        SessionMode::Assess { score: Some(score) } => format!("Assess {score:.1}"),
        SessionMode::Assess { score: None } => "Assess".to_string(),
        SessionMode::Handbook => "Handbook".to_string(),
    }
}

fn status_label(row: &SessionRow<'_>) -> String {
    match (row.session.status, row.phase) {
        (SessionStatus::Done, _) => "Done".to_string(),
        (SessionStatus::Running, Some(Phase::Break)) => {
            format!("Break {}", format_clock(row.segment_secs))
        }
        (SessionStatus::Running, _) if row.paused => "Paused".to_string(),
        (SessionStatus::Running, _) => "Studying".to_string(),
        (SessionStatus::Idle, _) if row.session.progress.elapsed_minutes > 0 => "Started".to_string(),
        (SessionStatus::Idle, _) => "Not started".to_string(),
    }
}

pub struct SessionList<'a> {
    rows: &'a [SessionRow<'a>],
    selected: usize,
    show_notes: bool,
    title: String,
    theme: &'a Theme,
}

impl<'a> SessionList<'a> {
    pub fn new(rows: &'a [SessionRow<'a>], selected: usize, title: String, theme: &'a Theme) -> Self {
        Self {
            rows,
            selected,
            show_notes: true,
            title,
            theme,
        }
    }

    pub fn show_notes(mut self, show: bool) -> Self {
        self.show_notes = show;
        self
    }
}

impl Widget for SessionList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;

        let block = Block::bordered()
            .title(format!(" {} ", self.title))
            .border_style(Style::default().fg(colors.border_focused()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        if self.rows.is_empty() {
            let empty = Paragraph::new(Line::from(Span::styled(
                "  No sessions planned. Press [a] to add one or [r] to plan weak units.",
                Style::default().fg(colors.muted()),
            )));
            empty.render(inner, buf);
            return;
        }

        let lines_per_row = if self.show_notes { 2 } else { 1 };
        let visible = (inner.height as usize / lines_per_row).max(1);
        let offset = self.selected.saturating_sub(visible - 1);

        let mut lines: Vec<Line> = Vec::new();
        for (i, row) in self.rows.iter().enumerate().skip(offset).take(visible) {
            let s = row.session;
            let is_selected = i == self.selected;
            let status_color = colors.status(s.status, row.paused);
            let base = if is_selected {
                Style::default().bg(colors.selection_bg())
            } else {
                Style::default()
            };

            let start = s
                .start_at
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "--:--".to_string());
            let marker = if is_selected { "▸ " } else { "  " };
            let priority = "!".repeat(4 - s.priority.level().clamp(1, 3) as usize);

            let title_style = if s.status == SessionStatus::Done {
                base.fg(colors.muted()).add_modifier(Modifier::CROSSED_OUT)
            } else {
                base.fg(colors.fg()).add_modifier(Modifier::BOLD)
            };

            lines.push(Line::from(vec![
                Span::styled(marker, base.fg(colors.accent())),
                Span::styled(format!("{start} "), base.fg(colors.muted())),
                Span::styled(format!("{:<3} ", priority), base.fg(colors.warning())),
                Span::styled(format!("{:<10}", s.subject.label()), base.fg(colors.accent())),
                Span::styled(format!("{:<11}", mode_label(&s.mode)), base.fg(colors.fg())),
                Span::styled(s.unit.title.clone(), title_style),
                Span::styled(
                    format!("  {} / {}'", format_clock(row.remaining_secs), s.planned.minutes()),
                    base.fg(colors.fg()),
                ),
                Span::styled(format!("  {}", status_label(row)), base.fg(status_color)),
                Span::styled(
                    format!("  hints {}", s.progress.used_hints),
                    base.fg(colors.muted()),
                ),
            ]));

            if self.show_notes {
                let note = if s.note.is_empty() {
                    String::new()
                } else {
                    format!("      ✎ {}", s.note)
                };
                lines.push(Line::from(Span::styled(note, base.fg(colors.muted()))));
            }
        }

        Paragraph::new(lines).render(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(25 * 60), "25:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(3600), "60:00");
    }

    #[test]
    fn test_mode_label_shows_score() {
        assert_eq!(mode_label(&SessionMode::Assess { score: Some(8.0) }), "Assess 8.0");
        assert_eq!(mode_label(&SessionMode::Handbook), "Handbook");
    }
}
