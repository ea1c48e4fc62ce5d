use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget};

use crate::plan::day_plan::DayPlan;
use crate::ui::components::progress_bar::ProgressBar;
use crate::ui::theme::Theme;

pub struct DayPanel<'a> {
    plan: &'a DayPlan,
    theme: &'a Theme,
}

impl<'a> DayPanel<'a> {
    pub fn new(plan: &'a DayPlan, theme: &'a Theme) -> Self {
        Self { plan, theme }
    }
}

impl Widget for DayPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let plan = self.plan;

        let block = Block::bordered()
            .title(format!(" {} ", plan.date.format("%a %d/%m/%Y")))
            .border_style(Style::default().fg(colors.border()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
            ])
            .split(inner);

        let budget_color = if plan.over_budget() {
            colors.warning()
        } else {
            colors.bar_filled()
        };
        ProgressBar::new(
            "Budget",
            plan.scheduled_minutes as f64 / plan.budget_minutes.max(1) as f64,
            self.theme,
        )
        .caption(format!("{}' / {}'", plan.scheduled_minutes, plan.budget_minutes))
        .fill(budget_color)
        .render(layout[0], buf);

        ProgressBar::from_pct("Adherence", plan.adherence_pct, self.theme)
            .caption(format!(
                "{}% ({}/{})",
                plan.adherence_pct, plan.done_count, plan.session_count
            ))
            .render(layout[1], buf);

        let counts = Line::from(vec![
            Span::styled(" Studied ", Style::default().fg(colors.muted())),
            Span::styled(
                format!("{}'", plan.elapsed_minutes),
                Style::default().fg(colors.fg()).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  High priority ", Style::default().fg(colors.muted())),
            Span::styled(
                plan.high_priority_count.to_string(),
                Style::default().fg(colors.warning()),
            ),
        ]);
        Paragraph::new(counts).render(layout[2], buf);

        let mut lines = vec![Line::from(Span::styled(
            " Weak units",
            Style::default().fg(colors.accent()).add_modifier(Modifier::BOLD),
        ))];
        if plan.weak_units.is_empty() {
            lines.push(Line::from(Span::styled(
                "  nothing flagged",
                Style::default().fg(colors.muted()),
            )));
        }
        for unit in &plan.weak_units {
            lines.push(Line::from(vec![
                Span::styled("  • ", Style::default().fg(colors.warning())),
                Span::styled(unit.title.clone(), Style::default().fg(colors.fg())),
                Span::styled(
                    format!(" ({})", unit.subject),
                    Style::default().fg(colors.muted()),
                ),
            ]));
        }
        Paragraph::new(lines).render(layout[3], buf);
    }
}
