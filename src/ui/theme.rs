use std::fs;

use ratatui::style::Color;
use serde::{Deserialize, Serialize};

use crate::plan::risk::Severity;
use crate::plan::session::SessionStatus;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub colors: ThemeColors,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThemeColors {
    pub bg: String,
    pub fg: String,
    pub muted: String,
    pub accent: String,
    pub accent_dim: String,
    pub border: String,
    pub border_focused: String,
    pub header_bg: String,
    pub header_fg: String,
    pub selection_bg: String,
    pub bar_filled: String,
    pub bar_empty: String,
    pub running: String,
    pub paused: String,
    pub done: String,
    pub error: String,
    pub warning: String,
    pub success: String,
}

const BUILTIN_THEMES: [&str; 3] = ["terminal-default", "catppuccin-mocha", "gruvbox-dark"];

impl Theme {
    /// User themes in `<config_dir>/studyplan/themes/<name>.toml` shadow the
    /// built-in palettes of the same name.
    pub fn load(name: &str) -> Option<Self> {
        if let Some(config_dir) = dirs::config_dir() {
            let user_theme_path = config_dir
                .join("studyplan")
                .join("themes")
                .join(format!("{name}.toml"));
            if let Ok(content) = fs::read_to_string(&user_theme_path)
                && let Ok(theme) = toml::from_str::<Theme>(&content)
            {
                return Some(theme);
            }
        }
        Self::builtin(name)
    }

    pub fn builtin(name: &str) -> Option<Self> {
        let colors = match name {
            "terminal-default" => ThemeColors::default(),
            "catppuccin-mocha" => ThemeColors {
                bg: "#1e1e2e".into(),
                fg: "#cdd6f4".into(),
                muted: "#6c7086".into(),
                accent: "#89b4fa".into(),
                accent_dim: "#45475a".into(),
                border: "#45475a".into(),
                border_focused: "#89b4fa".into(),
                header_bg: "#313244".into(),
                header_fg: "#cdd6f4".into(),
                selection_bg: "#313244".into(),
                bar_filled: "#89b4fa".into(),
                bar_empty: "#313244".into(),
                running: "#89dceb".into(),
                paused: "#f9e2af".into(),
                done: "#a6e3a1".into(),
                error: "#f38ba8".into(),
                warning: "#f9e2af".into(),
                success: "#a6e3a1".into(),
            },
            "gruvbox-dark" => ThemeColors {
                bg: "#282828".into(),
                fg: "#ebdbb2".into(),
                muted: "#928374".into(),
                accent: "#83a598".into(),
                accent_dim: "#504945".into(),
                border: "#504945".into(),
                border_focused: "#83a598".into(),
                header_bg: "#3c3836".into(),
                header_fg: "#ebdbb2".into(),
                selection_bg: "#3c3836".into(),
                bar_filled: "#83a598".into(),
                bar_empty: "#3c3836".into(),
                running: "#8ec07c".into(),
                paused: "#fabd2f".into(),
                done: "#b8bb26".into(),
                error: "#fb4934".into(),
                warning: "#fabd2f".into(),
                success: "#b8bb26".into(),
            },
            _ => return None,
        };
        Some(Self {
            name: name.to_string(),
            colors,
        })
    }

    pub fn available_themes() -> Vec<String> {
        BUILTIN_THEMES.iter().map(|n| n.to_string()).collect()
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            name: "terminal-default".to_string(),
            colors: ThemeColors::default(),
        }
    }
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            bg: "reset".into(),
            fg: "reset".into(),
            muted: "#808080".into(),
            accent: "#5f87d7".into(),
            accent_dim: "#3a3a3a".into(),
            border: "#585858".into(),
            border_focused: "#5f87d7".into(),
            header_bg: "#303030".into(),
            header_fg: "#e4e4e4".into(),
            selection_bg: "#303030".into(),
            bar_filled: "#5f87d7".into(),
            bar_empty: "#303030".into(),
            running: "#5fafaf".into(),
            paused: "#d7af5f".into(),
            done: "#87af5f".into(),
            error: "#d75f5f".into(),
            warning: "#d7af5f".into(),
            success: "#87af5f".into(),
        }
    }
}

impl ThemeColors {
    /// `#rrggbb`, or `reset` for the terminal's own color.
    pub fn parse_color(hex: &str) -> Color {
        if hex.eq_ignore_ascii_case("reset") {
            return Color::Reset;
        }
        let hex = hex.trim_start_matches('#');
        if hex.len() == 6
            && let (Ok(r), Ok(g), Ok(b)) = (
                u8::from_str_radix(&hex[0..2], 16),
                u8::from_str_radix(&hex[2..4], 16),
                u8::from_str_radix(&hex[4..6], 16),
            )
        {
            return Color::Rgb(r, g, b);
        }
        Color::White
    }

    pub fn bg(&self) -> Color { Self::parse_color(&self.bg) }
    pub fn fg(&self) -> Color { Self::parse_color(&self.fg) }
    pub fn muted(&self) -> Color { Self::parse_color(&self.muted) }
    pub fn accent(&self) -> Color { Self::parse_color(&self.accent) }
    pub fn accent_dim(&self) -> Color { Self::parse_color(&self.accent_dim) }
    pub fn border(&self) -> Color { Self::parse_color(&self.border) }
    pub fn border_focused(&self) -> Color { Self::parse_color(&self.border_focused) }
    pub fn header_bg(&self) -> Color { Self::parse_color(&self.header_bg) }
    pub fn header_fg(&self) -> Color { Self::parse_color(&self.header_fg) }
    pub fn selection_bg(&self) -> Color { Self::parse_color(&self.selection_bg) }
    pub fn bar_filled(&self) -> Color { Self::parse_color(&self.bar_filled) }
    pub fn bar_empty(&self) -> Color { Self::parse_color(&self.bar_empty) }
    pub fn error(&self) -> Color { Self::parse_color(&self.error) }
    pub fn warning(&self) -> Color { Self::parse_color(&self.warning) }
    pub fn success(&self) -> Color { Self::parse_color(&self.success) }

    pub fn status(&self, status: SessionStatus, paused: bool) -> Color {
        match status {
            SessionStatus::Running if paused => Self::parse_color(&self.paused),
            SessionStatus::Running => Self::parse_color(&self.running),
            SessionStatus::Done => Self::parse_color(&self.done),
            SessionStatus::Idle => self.fg(),
        }
    }

    pub fn severity(&self, severity: Severity) -> Color {
        match severity {
            Severity::Crit => self.error(),
            Severity::Warn => self.warning(),
            Severity::Info => self.accent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(ThemeColors::parse_color("#ff8000"), Color::Rgb(255, 128, 0));
        assert_eq!(ThemeColors::parse_color("reset"), Color::Reset);
        assert_eq!(ThemeColors::parse_color("nonsense"), Color::White);
    }

    #[test]
    fn test_builtin_themes_resolve() {
        for name in Theme::available_themes() {
            let theme = Theme::builtin(&name).unwrap();
            assert_eq!(theme.name, name);
        }
        assert!(Theme::builtin("missing").is_none());
    }

    #[test]
    fn test_theme_toml_round_trip() {
        let theme = Theme::builtin("gruvbox-dark").unwrap();
        let text = toml::to_string(&theme).unwrap();
        let parsed: Theme = toml::from_str(&text).unwrap();
        assert_eq!(parsed.colors.accent, "#83a598");
    }
}
