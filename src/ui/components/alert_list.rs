use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};

use crate::plan::risk::{Alert, RiskLevel};
use crate::ui::theme::Theme;

pub struct AlertList<'a> {
    alerts: &'a [Alert],
    level: RiskLevel,
    theme: &'a Theme,
}

impl<'a> AlertList<'a> {
    pub fn new(alerts: &'a [Alert], level: RiskLevel, theme: &'a Theme) -> Self {
        Self {
            alerts,
            level,
            theme,
        }
    }
}

impl Widget for AlertList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;

        let (level_label, level_color) = match self.level {
            RiskLevel::Ok => ("on track", colors.success()),
            RiskLevel::Warn => ("needs attention", colors.warning()),
            RiskLevel::Crit => ("at risk", colors.error()),
        };

        let block = Block::bordered()
            .title(Line::from(vec![
                Span::raw(" Alerts · "),
                Span::styled(
                    level_label,
                    Style::default().fg(level_color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
            ]))
            .border_style(Style::default().fg(colors.border()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let lines: Vec<Line> = if self.alerts.is_empty() {
            vec![Line::from(Span::styled(
                "  No alerts this week.",
                Style::default().fg(colors.muted()),
            ))]
        } else {
            self.alerts
                .iter()
                .map(|alert| {
                    Line::from(vec![
                        Span::styled(
                            format!("  {:<5}", alert.severity.to_string().to_uppercase()),
                            Style::default()
                                .fg(colors.severity(alert.severity))
                                .add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(alert.message.clone(), Style::default().fg(colors.fg())),
                    ])
                })
                .collect()
        };

        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .render(inner, buf);
    }
}
