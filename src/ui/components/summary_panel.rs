use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget};

use crate::plan::risk::RiskThresholds;
use crate::plan::session::UnitRef;
use crate::plan::summary::{SubjectSummary, Summary};
use crate::ui::components::progress_bar::ProgressBar;
use crate::ui::theme::Theme;

fn format_minutes(minutes: u32) -> String {
    if minutes >= 60 {
        format!("{}h{:02}", minutes / 60, minutes % 60)
    } else {
        format!("{minutes}'")
    }
}

fn format_score(avg: f64) -> String {
    if avg > 0.0 {
        format!("{avg:.1}/10")
    } else {
        "-".to_string()
    }
}

/// Weekly cards on top, one tile per subject below, ranked units at the bottom.
pub struct SummaryPanel<'a> {
    summary: &'a Summary,
    thresholds: RiskThresholds,
    theme: &'a Theme,
}

impl<'a> SummaryPanel<'a> {
    pub fn new(summary: &'a Summary, thresholds: RiskThresholds, theme: &'a Theme) -> Self {
        Self {
            summary,
            thresholds,
            theme,
        }
    }

    fn render_card(&self, title: &str, value: String, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let block = Block::bordered()
            .title(format!(" {title} "))
            .border_style(Style::default().fg(colors.border()));
        let inner = block.inner(area);
        block.render(area, buf);
        Paragraph::new(Line::from(Span::styled(
            value,
            Style::default().fg(colors.accent()).add_modifier(Modifier::BOLD),
        )))
        .centered()
        .render(inner, buf);
    }

    fn render_subject(&self, s: &SubjectSummary, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let block = Block::bordered()
            .title(format!(" {} ", s.subject))
            .border_style(Style::default().fg(colors.border()));
        let inner = block.inner(area);
        block.render(area, buf);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(inner);

        ProgressBar::from_pct("Mastery", s.mastery_pct, self.theme).render(rows[0], buf);

        let hint_color = if s.hints >= self.thresholds.hint_warn_count {
            colors.warning()
        } else {
            colors.fg()
        };
        let lines = vec![
            Line::from(vec![
                Span::styled(" Time   ", Style::default().fg(colors.muted())),
                Span::styled(format_minutes(s.minutes), Style::default().fg(colors.fg())),
            ]),
            Line::from(vec![
                Span::styled(" Score  ", Style::default().fg(colors.muted())),
                Span::styled(format_score(s.assess_avg), Style::default().fg(colors.fg())),
            ]),
            Line::from(vec![
                Span::styled(" Hints  ", Style::default().fg(colors.muted())),
                Span::styled(s.hints.to_string(), Style::default().fg(hint_color)),
            ]),
        ];
        Paragraph::new(lines).render(rows[1], buf);
    }

    fn unit_lines(&self, heading: &str, units: &[UnitRef]) -> Vec<Line<'static>> {
        let colors = &self.theme.colors;
        let mut lines = vec![Line::from(Span::styled(
            format!(" {heading}"),
            Style::default().fg(colors.accent()).add_modifier(Modifier::BOLD),
        ))];
        if units.is_empty() {
            lines.push(Line::from(Span::styled(
                "  -".to_string(),
                Style::default().fg(colors.muted()),
            )));
        }
        for unit in units {
            lines.push(Line::from(vec![
                Span::styled(format!("  {}", unit.title), Style::default().fg(colors.fg())),
                Span::styled(format!(" ({})", unit.subject), Style::default().fg(colors.muted())),
            ]));
        }
        lines
    }
}

impl Widget for SummaryPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let weekly = &self.summary.weekly;

        let block = Block::bordered()
            .title(format!(
                " Week of {} ",
                self.summary.window.start.format("%d/%m/%Y")
            ))
            .border_style(Style::default().fg(colors.border_focused()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(7),
                Constraint::Min(0),
            ])
            .split(inner);

        let cards = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 4); 4])
            .split(rows[0]);
        self.render_card("Study time", format_minutes(weekly.total_minutes), cards[0], buf);

        let adherence_color = if weekly.adherence_pct < self.thresholds.adherence_crit_pct {
            colors.error()
        } else {
            colors.success()
        };
        ProgressBar::from_pct("Adherence", weekly.adherence_pct, self.theme)
            .caption(format!(
                "{}% ({}/{})",
                weekly.adherence_pct, weekly.sessions_completed, weekly.sessions_planned
            ))
            .fill(adherence_color)
            .render(cards[1], buf);
        self.render_card("Assess avg", format_score(weekly.assess_avg), cards[2], buf);
        self.render_card("Hints", weekly.hints_used.to_string(), cards[3], buf);

        let n = self.summary.subjects.len().max(1) as u32;
        let tiles = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, n); n as usize])
            .split(rows[1]);
        for (s, tile) in self.summary.subjects.iter().zip(tiles.iter()) {
            self.render_subject(s, *tile, buf);
        }

        let ranked = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[2]);
        Paragraph::new(self.unit_lines("Strongest", &weekly.strongest_units)).render(ranked[0], buf);
        Paragraph::new(self.unit_lines("Needs work", &weekly.weakest_units)).render(ranked[1], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(45), "45'");
        assert_eq!(format_minutes(60), "1h00");
        assert_eq!(format_minutes(135), "2h15");
    }

    #[test]
    fn test_format_score_hides_zero() {
        assert_eq!(format_score(0.0), "-");
        assert_eq!(format_score(7.3), "7.3/10");
    }
}
