use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use studyplan::app::{App, AppScreen, InputMode, class_report};
use studyplan::config::Config;
use studyplan::event::{AppEvent, EventSource};
use studyplan::plan::subject::Subject;
use studyplan::plan::summary::Scope;
use studyplan::plan::timer::Phase;
use studyplan::store::kv::FileKvStore;
use studyplan::store::plan_store::PlanStore;
use studyplan::store::schema::ExportData;
use studyplan::ui::components::alert_list::AlertList;
use studyplan::ui::components::day_panel::DayPanel;
use studyplan::ui::components::session_form::SessionFormPopup;
use studyplan::ui::components::session_list::{SessionList, format_clock};
use studyplan::ui::components::summary_panel::SummaryPanel;
use studyplan::ui::layout::{AppLayout, centered_rect, pack_hint_lines};
use studyplan::ui::theme::Theme;

#[derive(Parser)]
#[command(
    name = "studyplan",
    version,
    about = "Terminal study planner with a focus timer and weekly progress"
)]
struct Cli {
    #[arg(short, long, help = "Theme name")]
    theme: Option<String>,

    #[arg(short, long, help = "Learner id (selects the data sub-directory)")]
    learner: Option<String>,

    #[arg(short, long, help = "Treat this date (YYYY-MM-DD) as today")]
    date: Option<NaiveDate>,

    #[arg(long, help = "Data directory (default: platform data dir)")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print this week's summary, day plan and alerts as JSON
    Summary {
        #[arg(short, long, help = "Limit weekly totals to one subject")]
        subject: Option<String>,
    },
    /// Write all plan data to a JSON file
    Export { path: PathBuf },
    /// Replace plan data with the contents of an export file
    Import { path: PathBuf },
    /// Roll up several learners' export files into a class report (JSON)
    Class {
        #[arg(short, long, help = "Only include learners in this class (e.g. 9A)")]
        class: Option<String>,
        #[arg(required = true)]
        exports: Vec<PathBuf>,
    },
}

fn init_tracing(log_dir: &Path, default_level: &str) -> Result<WorkerGuard> {
    let appender = tracing_appender::rolling::never(log_dir, "studyplan.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("STUDYPLAN_LOG").unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;
    Ok(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable config: {e}");
        Config::default()
    });
    if let Some(learner) = cli.learner.as_deref() {
        config.learner_id = learner.to_string();
    }
    if let Some(theme) = cli.theme.as_deref() {
        config.theme = theme.to_string();
    }
    config.validate();

    let base_dir = cli.data_dir.clone().unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("studyplan")
    });
    fs::create_dir_all(&base_dir)
        .with_context(|| format!("creating data directory {}", base_dir.display()))?;
    let _log_guard = init_tracing(&base_dir, &config.log_level)?;

    let kv = FileKvStore::with_base_dir(base_dir.join(&config.learner_id))?;
    let mut store = PlanStore::new(kv);
    let today = cli.date.unwrap_or_else(|| Local::now().date_naive());
    info!(%today, learner = %config.learner_id, "studyplan starting");

    match cli.command {
        Some(Command::Summary { subject }) => print_summary(config, store, today, subject.as_deref()),
        Some(Command::Class { class, exports }) => {
            print_class(&config, today, class.as_deref(), &exports)
        }
        Some(Command::Export { path }) => {
            let data = store.export_all(&config)?;
            fs::write(&path, serde_json::to_string_pretty(&data)?)
                .with_context(|| format!("writing {}", path.display()))?;
            println!(
                "Exported {} sessions and {} history days to {}",
                data.sessions.sessions.len(),
                data.history.len(),
                path.display()
            );
            Ok(())
        }
        Some(Command::Import { path }) => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let data: ExportData = serde_json::from_str(&content)?;
            store.import_all(&data)?;
            println!(
                "Imported {} sessions and {} history days",
                data.sessions.sessions.len(),
                data.history.len()
            );
            Ok(())
        }
        None => run_tui(config, store, today),
    }
}

fn print_summary(
    config: Config,
    store: PlanStore<FileKvStore>,
    today: NaiveDate,
    subject: Option<&str>,
) -> Result<()> {
    let scope = match subject {
        None => Scope::All,
        Some(label) => match Subject::from_label(label) {
            Some(s) => Scope::Subject(s),
            None => bail!("Unknown subject: {label}"),
        },
    };
    let mut app = App::new(config, store, today);
    app.summary_scope = scope;
    let report = app.progress_report();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_class(
    config: &Config,
    today: NaiveDate,
    class_code: Option<&str>,
    paths: &[PathBuf],
) -> Result<()> {
    let mut exports = Vec::with_capacity(paths.len());
    for path in paths {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let data: ExportData = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        exports.push(data);
    }
    let report = class_report(
        &exports,
        today,
        class_code,
        &config.thresholds(),
        config.class_alert_limit,
    )?;
    if report.rows.is_empty() {
        warn!(class = ?class_code, "no learners matched");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_tui(config: Config, store: PlanStore<FileKvStore>, today: NaiveDate) -> Result<()> {
    let tick_rate = Duration::from_millis(config.tick_rate_ms);
    let mut app = App::new(config, store, today);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let events = EventSource::spawn(tick_rate);
    let result = run_app(&mut terminal, &mut app, &events);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &result {
        warn!(error = %err, "event loop ended with an error");
        eprintln!("Error: {err:?}");
    }
    info!("studyplan exiting");
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<FileKvStore>,
    events: &EventSource,
) -> Result<()> {
    loop {
        terminal.draw(|frame| render(frame, app))?;

        match events.next()? {
            AppEvent::Key(key) => handle_key(app, key),
            AppEvent::Tick => app.on_tick(Instant::now()),
            AppEvent::Resize => {}
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App<FileKvStore>, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.quit();
        return;
    }

    if !matches!(app.input, InputMode::Normal) {
        handle_input_key(app, key);
        return;
    }

    app.status_message = None;
    match app.screen {
        AppScreen::Plan => handle_plan_key(app, key),
        AppScreen::Progress => handle_progress_key(app, key),
    }
}

fn handle_input_key(app: &mut App<FileKvStore>, key: KeyEvent) {
    if let InputMode::ConfirmDelete(_) = app.input {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => app.submit_input(),
            KeyCode::Char('n') | KeyCode::Esc => app.cancel_input(),
            _ => {}
        }
        return;
    }
    match key.code {
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Enter => app.submit_input(),
        _ => {}
    }
    match &mut app.input {
        InputMode::NewSession(form) => match key.code {
            KeyCode::Tab | KeyCode::Down => form.focus = form.focus.next(),
            KeyCode::BackTab | KeyCode::Up => form.focus = form.focus.prev(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Left | KeyCode::Right => form.cycle(),
            KeyCode::Char(' ') if !form.focus.is_text() => form.cycle(),
            KeyCode::Char(ch) => form.push_char(ch),
            _ => {}
        },
        InputMode::Note { buffer, .. } => match key.code {
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(ch) => buffer.push(ch),
            _ => {}
        },
        InputMode::ConfirmDelete(_) | InputMode::Normal => {}
    }
}

fn handle_plan_key(app: &mut App<FileKvStore>, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
        KeyCode::Tab => app.toggle_screen(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Left => app.shift_view_date(-1),
        KeyCode::Right => app.shift_view_date(1),
        KeyCode::Char('t') => app.go_today(),
        KeyCode::Enter | KeyCode::Char('s') => app.start_selected(),
        KeyCode::Char(' ') => app.toggle_pause(),
        KeyCode::Char('b') => app.toggle_phase(),
        KeyCode::Char('d') => app.stop(true),
        KeyCode::Char('x') => app.stop(false),
        KeyCode::Char('h') => app.record_hint(),
        KeyCode::Char('[') => app.reschedule_selected(-1),
        KeyCode::Char(']') => app.reschedule_selected(1),
        KeyCode::Char('a') => app.open_new_session(),
        KeyCode::Char('n') => app.open_note_editor(),
        KeyCode::Char('p') => app.cycle_priority_selected(),
        KeyCode::Char('m') => app.cycle_duration_selected(),
        KeyCode::Char('f') => app.cycle_subject_filter(),
        KeyCode::Char('r') => app.replan_weak_units(),
        KeyCode::Delete | KeyCode::Char('D') => app.open_delete_confirm(),
        _ => {}
    }
}

fn handle_progress_key(app: &mut App<FileKvStore>, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Tab | KeyCode::Esc => app.toggle_screen(),
        KeyCode::Left => app.shift_view_date(-7),
        KeyCode::Right => app.shift_view_date(7),
        KeyCode::Char('t') => app.go_today(),
        KeyCode::Char('f') => app.cycle_summary_scope(),
        KeyCode::Char('R') => app.reload_mastery(),
        _ => {}
    }
}

fn render(frame: &mut ratatui::Frame, app: &mut App<FileKvStore>) {
    let area = frame.area();
    let bg = Block::default().style(Style::default().bg(app.theme.colors.bg()));
    frame.render_widget(bg, area);

    match app.screen {
        AppScreen::Plan => render_plan(frame, app),
        AppScreen::Progress => render_progress(frame, app),
    }
}

fn render_header(frame: &mut ratatui::Frame, app: &App<FileKvStore>, title: &str, area: ratatui::layout::Rect) {
    let colors = &app.theme.colors;
    let mut spans = vec![
        Span::styled(
            format!(" {title} "),
            Style::default()
                .fg(colors.header_fg())
                .bg(colors.header_bg())
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}", app.config.learner_name),
            Style::default().fg(colors.fg()),
        ),
    ];
    if let Some(class) = app.config.class_code() {
        spans.push(Span::styled(format!(" · {class}"), Style::default().fg(colors.muted())));
    }
    let date_label = if app.view_date == app.today {
        format!("  {} (today)", app.view_date.format("%d/%m/%Y"))
    } else {
        format!("  {}", app.view_date.format("%d/%m/%Y"))
    };
    spans.push(Span::styled(date_label, Style::default().fg(colors.accent())));

    let timer = app.planner().timer();
    if let (Some(run), Some(remaining)) = (timer.active_run(), app.planner().remaining_secs()) {
        let (label, color) = match (run.phase, timer.is_paused()) {
            (_, true) => ("paused", colors.warning()),
            (Phase::Break, false) => ("break", colors.success()),
            (Phase::Focus, false) => ("focus", colors.accent()),
        };
        spans.push(Span::styled(
            format!("  ⏱ {} {label}", format_clock(remaining)),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::bordered().border_style(Style::default().fg(colors.border())),
    );
    frame.render_widget(header, area);
}

fn render_footer(frame: &mut ratatui::Frame, app: &App<FileKvStore>, hints: &[String], area: ratatui::layout::Rect) {
    let colors = &app.theme.colors;
    let mut lines = Vec::new();
    if let Some(msg) = &app.status_message {
        lines.push(Line::from(Span::styled(
            format!(" {msg}"),
            Style::default().fg(colors.warning()),
        )));
    }
    lines.extend(
        hints
            .iter()
            .map(|h| Line::from(Span::styled(h.clone(), Style::default().fg(colors.muted())))),
    );
    frame.render_widget(Paragraph::new(lines), area);
}

const PLAN_HINTS: [&str; 14] = [
    "[↑↓] Select",
    "[←→] Day",
    "[s] Start",
    "[Space] Pause",
    "[b] Break",
    "[d] Done",
    "[x] Stop",
    "[h] Hint",
    "[[ ]] Move ±1d",
    "[a] Add",
    "[n] Note",
    "[p/m] Priority/Minutes",
    "[f] Filter  [r] Replan",
    "[Tab] Progress  [q] Quit",
];

fn render_plan(frame: &mut ratatui::Frame, app: &mut App<FileKvStore>) {
    let area = frame.area();
    let hints = pack_hint_lines(&PLAN_HINTS, area.width as usize);
    let footer_lines = hints.len() as u16 + u16::from(app.status_message.is_some());
    let layout = AppLayout::new(area, footer_lines);

    render_header(frame, app, "Today's Plan", layout.header);

    let day_plan = app.day_plan();
    let rows = app.session_rows();
    let title = match app.subject_filter {
        Some(subject) => format!("Sessions · {subject}"),
        None => "Sessions".to_string(),
    };
    let list = SessionList::new(&rows, app.selected, title, &app.theme)
        .show_notes(layout.tier.show_notes());
    frame.render_widget(list, layout.main);

    if let Some(sidebar) = layout.sidebar {
        frame.render_widget(DayPanel::new(&day_plan, &app.theme), sidebar);
    }
    render_footer(frame, app, &hints, layout.footer);

    match &app.input {
        InputMode::NewSession(form) => {
            let popup = centered_rect(56, 12, area);
            frame.render_widget(SessionFormPopup::new(form, &app.theme), popup);
        }
        InputMode::Note { buffer, .. } => {
            let popup = centered_rect(60, 5, area);
            render_prompt(frame, app, " Note ", &format!(" {buffer}▏"), "[Enter] Save  [Esc] Cancel", popup);
        }
        InputMode::ConfirmDelete(id) => {
            let title = app
                .planner()
                .get(id)
                .map(|s| s.unit.title.clone())
                .unwrap_or_default();
            let popup = centered_rect(50, 5, area);
            render_prompt(frame, app, " Delete session ", &format!(" Delete \"{title}\"?"), "[y] Yes  [n] No", popup);
        }
        InputMode::Normal => {}
    }
}

fn render_prompt(
    frame: &mut ratatui::Frame,
    app: &App<FileKvStore>,
    title: &str,
    body: &str,
    hint: &str,
    area: ratatui::layout::Rect,
) {
    let colors = &app.theme.colors;
    let block = Block::bordered()
        .title(title.to_string())
        .border_style(Style::default().fg(colors.accent()))
        .style(Style::default().bg(colors.bg()));
    let inner = block.inner(area);
    frame.render_widget(Clear, area);
    frame.render_widget(block, area);
    let body = Paragraph::new(vec![
        Line::from(Span::styled(body.to_string(), Style::default().fg(colors.fg()))),
        Line::default(),
        Line::from(Span::styled(format!(" {hint}"), Style::default().fg(colors.muted()))),
    ]);
    frame.render_widget(body, inner);
}

fn render_progress(frame: &mut ratatui::Frame, app: &mut App<FileKvStore>) {
    let area = frame.area();
    let hints = pack_hint_lines(
        &["[←→] Week", "[f] Scope", "[t] This week", "[R] Reload mastery", "[Tab] Plan", "[q] Quit"],
        area.width as usize,
    );
    let footer_lines = hints.len() as u16 + u16::from(app.status_message.is_some());

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(14),
            Constraint::Length(6),
            Constraint::Length(footer_lines.max(1)),
        ])
        .split(area);

    let scope_label = match app.summary_scope {
        Scope::All => "Progress".to_string(),
        Scope::Subject(subject) => format!("Progress · {subject}"),
    };
    render_header(frame, app, &scope_label, vertical[0]);

    let report = app.progress_report();
    let theme: &Theme = &app.theme;
    frame.render_widget(
        SummaryPanel::new(&report.summary, app.config.thresholds(), theme),
        vertical[1],
    );
    frame.render_widget(
        AlertList::new(&report.alerts, report.risk_level, theme),
        vertical[2],
    );
    render_footer(frame, app, &hints, vertical[3]);
}
