use ratatui::layout::{Constraint, Direction, Layout, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutTier {
    Wide,   // ≥100 cols: session list + day panel
    Medium, // 60-99 cols: session list, day panel folded into the header
    Narrow, // <60 cols: compact rows, no notes column
}

impl LayoutTier {
    pub fn from_area(area: Rect) -> Self {
        if area.width >= 100 {
            LayoutTier::Wide
        } else if area.width >= 60 {
            LayoutTier::Medium
        } else {
            LayoutTier::Narrow
        }
    }

    pub fn show_sidebar(&self) -> bool {
        *self == LayoutTier::Wide
    }

    pub fn show_notes(&self) -> bool {
        *self != LayoutTier::Narrow
    }
}

pub struct AppLayout {
    pub header: Rect,
    pub main: Rect,
    pub sidebar: Option<Rect>,
    pub footer: Rect,
    pub tier: LayoutTier,
}

impl AppLayout {
    pub fn new(area: Rect, footer_lines: u16) -> Self {
        let tier = LayoutTier::from_area(area);

        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(footer_lines.max(1)),
            ])
            .split(area);

        let (main, sidebar) = if tier.show_sidebar() {
            let horizontal = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
                .split(vertical[1]);
            (horizontal[0], Some(horizontal[1]))
        } else {
            (vertical[1], None)
        };

        Self {
            header: vertical[0],
            main,
            sidebar,
            footer: vertical[2],
            tier,
        }
    }
}

/// Greedy packing of key hints into as few lines as fit `width`.
pub fn pack_hint_lines(hints: &[&str], width: usize) -> Vec<String> {
    if width == 0 || hints.is_empty() {
        return Vec::new();
    }

    let prefix = " ";
    let separator = "  ";
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();

    for hint in hints.iter().filter(|h| !h.is_empty()) {
        if current.is_empty() {
            current = format!("{prefix}{hint}");
            continue;
        }
        let candidate = format!("{current}{separator}{hint}");
        if candidate.chars().count() <= width {
            current = candidate;
        } else {
            out.push(std::mem::replace(&mut current, format!("{prefix}{hint}")));
        }
    }

    if !current.is_empty() {
        out.push(current);
    }
    out
}

pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    let left = area.x.saturating_add(area.width.saturating_sub(w) / 2);
    let top = area.y.saturating_add(area.height.saturating_sub(h) / 2);
    Rect::new(left, top, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers() {
        assert_eq!(LayoutTier::from_area(Rect::new(0, 0, 120, 40)), LayoutTier::Wide);
        assert_eq!(LayoutTier::from_area(Rect::new(0, 0, 80, 24)), LayoutTier::Medium);
        assert_eq!(LayoutTier::from_area(Rect::new(0, 0, 40, 24)), LayoutTier::Narrow);
    }

    #[test]
    fn test_sidebar_only_when_wide() {
        let wide = AppLayout::new(Rect::new(0, 0, 120, 40), 2);
        assert!(wide.sidebar.is_some());
        assert_eq!(wide.footer.height, 2);
        let medium = AppLayout::new(Rect::new(0, 0, 80, 24), 1);
        assert!(medium.sidebar.is_none());
    }

    #[test]
    fn test_pack_hint_lines_wraps() {
        let lines = pack_hint_lines(&["[s] Start", "[d] Done", "[q] Quit"], 20);
        assert_eq!(lines, vec![" [s] Start  [d] Done", " [q] Quit"]);
        assert!(pack_hint_lines(&["x"], 0).is_empty());
    }

    #[test]
    fn test_centered_rect_clamps_to_area() {
        let r = centered_rect(80, 30, Rect::new(0, 0, 60, 20));
        assert_eq!(r, Rect::new(0, 0, 60, 20));
        let r = centered_rect(20, 10, Rect::new(0, 0, 60, 20));
        assert_eq!(r, Rect::new(20, 5, 20, 10));
    }
}
