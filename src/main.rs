use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use mal_predictions_terminal::config::AppConfig;
use mal_predictions_terminal::provider::{self, ProviderConfig};
use mal_predictions_terminal::state::{
    self, AppState, HydratedRecord, InputField, ProviderCommand, RefreshStatus, ScoreBadge,
    apply_delta,
};

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
}

impl App {
    fn new(state: AppState, cmd_tx: Option<mpsc::Sender<ProviderCommand>>) -> Self {
        Self {
            state,
            should_quit: false,
            cmd_tx,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.editing.is_some() {
            self.on_edit_key(key);
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('r') | KeyCode::Char('R') => self.request_refresh(),
            KeyCode::Char('e') | KeyCode::Char('E') => self.request_export(),
            KeyCode::Char('s') => self.state.toggle_sort(),
            KeyCode::Char('n') => self.state.cycle_season(),
            KeyCode::Char('/') => self.state.start_editing(InputField::Query),
            KeyCode::Char('a') => self.state.start_editing(InputField::ApiBase),
            KeyCode::Char('y') => self.state.start_editing(InputField::Year),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Esc => {
                if self.state.help_overlay {
                    self.state.help_overlay = false;
                } else if !self.state.query.is_empty() {
                    self.state.query.clear();
                    self.state.clamp_selection();
                }
            }
            _ => {}
        }
    }

    fn on_edit_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => self.state.stop_editing(),
            KeyCode::Backspace => self.state.input_pop(),
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.state.input_push(ch)
            }
            _ => {}
        }
    }

    fn request_refresh(&mut self) {
        let cmd = self.state.begin_refresh();
        let Some(tx) = &self.cmd_tx else {
            apply_unavailable(&mut self.state, "Refresh worker unavailable");
            return;
        };
        if tx.send(cmd).is_err() {
            apply_unavailable(&mut self.state, "Refresh request failed");
        }
    }

    fn request_export(&mut self) {
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log("[INFO] Export unavailable");
            return;
        };
        if tx.send(self.state.export_command()).is_err() {
            self.state.push_log("[WARN] Export request failed");
        }
    }
}

fn apply_unavailable(state: &mut AppState, message: &str) {
    let generation = state.generation;
    apply_delta(
        state,
        state::Delta::RefreshFinished {
            generation,
            result: Err(message.to_string()),
        },
    );
}

fn main() -> io::Result<()> {
    let config = AppConfig::load();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    provider::spawn_provider(tx, cmd_rx, ProviderConfig::from(&config));

    let mut app = App::new(AppState::from_config(&config), Some(cmd_tx));
    app.request_refresh();
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<state::Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let state = &app.state;
    let banner_height = if state.error_message.is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Length(banner_height),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header =
        Paragraph::new(header_lines(state)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    render_search(frame, chunks[1], state);

    if let Some(message) = &state.error_message {
        let banner = Paragraph::new(format!("Error: {message}"))
            .style(Style::default().fg(Color::Red))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            );
        frame.render_widget(banner, chunks[2]);
    }

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(44)])
        .split(chunks[3]);
    render_cards(frame, body[0], state);
    render_detail(frame, body[1], state);

    let console = Paragraph::new(console_text(state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[4]);

    let footer = Paragraph::new(footer_text(state)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[5]);

    if state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_lines(state: &AppState) -> Vec<Line<'static>> {
    let status_style = match state.status {
        RefreshStatus::Idle => Style::default().fg(Color::Green),
        RefreshStatus::Loading => Style::default().fg(Color::Yellow),
        RefreshStatus::Error => Style::default().fg(Color::Red),
    };
    let refreshed = state
        .last_refreshed
        .map(|at| format!(" | updated {}", at.format("%H:%M:%S")))
        .unwrap_or_default();
    let title = Line::from(vec![
        Span::styled(
            "MAL Anime Score Predictions",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(state::status_label(state.status), status_style),
        Span::raw(refreshed),
    ]);

    let inputs = Line::from(vec![
        input_span(state, InputField::ApiBase),
        Span::raw("  "),
        input_span(state, InputField::Year),
        Span::raw("  "),
        Span::raw(format!("Season: {}", state.season.as_str())),
    ]);

    let url = Line::from(vec![
        Span::raw("Live from: "),
        Span::styled(
            state.predictions_url(),
            Style::default().add_modifier(Modifier::UNDERLINED),
        ),
    ]);
    vec![title, inputs, url]
}

fn input_span(state: &AppState, field: InputField) -> Span<'static> {
    let editing = state.editing == Some(field);
    let cursor = if editing { "▏" } else { "" };
    let text = format!(
        "{}: {}{cursor}",
        state::field_label(field),
        state.field_value(field)
    );
    if editing {
        Span::styled(text, Style::default().fg(Color::Black).bg(Color::Cyan))
    } else {
        Span::raw(text)
    }
}

fn render_search(frame: &mut Frame, area: Rect, state: &AppState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(22)])
        .split(area);

    let query_style = if state.editing == Some(InputField::Query) {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let query = if state.query.is_empty() && state.editing != Some(InputField::Query) {
        Paragraph::new("Search title or MAL ID… (/)").style(Style::default().fg(Color::DarkGray))
    } else {
        let cursor = if state.editing == Some(InputField::Query) { "▏" } else { "" };
        Paragraph::new(format!("{}{cursor}", state.query)).style(query_style)
    };
    frame.render_widget(
        query.block(Block::default().borders(Borders::ALL).border_style(query_style)),
        cols[0],
    );

    let sort = Paragraph::new(state::sort_label(state.sort_by_score))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(sort, cols[1]);
}

fn card_columns() -> [Constraint; 5] {
    [
        Constraint::Length(5),
        Constraint::Min(20),
        Constraint::Length(12),
        Constraint::Length(7),
        Constraint::Length(11),
    ]
}

fn render_cards(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().title("Predictions").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height < 2 || inner.width == 0 {
        return;
    }

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(inner);
    let widths = card_columns();
    render_cards_header(frame, sections[0], &widths);
    let list_area = sections[1];

    if state.is_loading() {
        let rows = (list_area.height as usize).min(12);
        let skeleton = (0..rows)
            .map(|_| "░".repeat(list_area.width as usize))
            .collect::<Vec<_>>()
            .join("\n");
        let loading = Paragraph::new(skeleton).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(loading, list_area);
        return;
    }

    let visible = state.visible_records();
    if visible.is_empty() {
        let empty = Paragraph::new("No rows. Try Refresh, or adjust your filters.")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, list_area);
        return;
    }

    let (start, end) = visible_range(state.selected, visible.len(), list_area.height as usize);
    for (i, idx) in (start..end).enumerate() {
        let row_area = Rect {
            x: list_area.x,
            y: list_area.y + i as u16,
            width: list_area.width,
            height: 1,
        };
        let selected = idx == state.selected;
        let row_style = if selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };
        if selected {
            frame.render_widget(Block::default().style(row_style), row_area);
        }

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(widths)
            .split(row_area);

        let record = visible[idx];
        let badge = state::score_badge(record.pred_score);
        let badge_style = row_style.fg(badge_color(badge)).add_modifier(Modifier::BOLD);

        render_cell_text(frame, cols[0], &format!("{:>3}.", idx + 1), row_style);
        render_cell_text(frame, cols[1], record.title_label(), row_style);
        render_cell_text(frame, cols[2], &format!("MAL: {}", record.id_label()), row_style);
        render_cell_text(frame, cols[3], &record.score_label(), badge_style);
        render_cell_text(frame, cols[4], state::badge_label(badge), badge_style);
    }
}

fn render_cards_header(frame: &mut Frame, area: Rect, widths: &[Constraint]) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(widths)
        .split(area);
    let style = Style::default().add_modifier(Modifier::BOLD);

    render_cell_text(frame, cols[0], "#", style);
    render_cell_text(frame, cols[1], "Title", style);
    render_cell_text(frame, cols[2], "Id", style);
    render_cell_text(frame, cols[3], "Score", style);
    render_cell_text(frame, cols[4], "Badge", style);
}

fn render_detail(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().title("Card").borders(Borders::ALL);
    let text = match (state.is_loading(), state.selected_record()) {
        (true, _) => vec![Line::from("Loading…")],
        (false, Some(record)) => detail_lines(record, state.selected),
        (false, None) => vec![Line::from("No row selected")],
    };
    let detail = Paragraph::new(text)
        .block(block)
        .wrap(ratatui::widgets::Wrap { trim: true });
    frame.render_widget(detail, area);
}

fn detail_lines(record: &HydratedRecord, index: usize) -> Vec<Line<'static>> {
    let badge = state::score_badge(record.pred_score);
    let mut lines = vec![
        Line::from(Span::styled(
            record.title_label().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::raw("Predicted: "),
            Span::styled(
                format!("{} {}", record.score_label(), state::badge_label(badge)),
                Style::default().fg(badge_color(badge)).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(format!("MAL: {}", record.id_label())),
    ];
    if let Some(url) = record.mal_url() {
        lines.push(Line::from(Span::styled(
            url,
            Style::default().add_modifier(Modifier::UNDERLINED),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(match &record.image_url {
        Some(url) => format!("Cover: {url}"),
        None => "Cover: no cover".to_string(),
    }));
    lines.push(Line::from(Span::styled(
        format!("key {}", record.row_key(index)),
        Style::default().fg(Color::DarkGray),
    )));
    lines
}

fn badge_color(badge: ScoreBadge) -> Color {
    match badge {
        ScoreBadge::Excellent => Color::Green,
        ScoreBadge::Great => Color::LightGreen,
        ScoreBadge::Good => Color::LightYellow,
        ScoreBadge::Fair => Color::Yellow,
        ScoreBadge::Mixed => Color::LightRed,
        ScoreBadge::Poor => Color::Red,
    }
}

fn render_cell_text(frame: &mut Frame, area: Rect, text: &str, style: Style) {
    let text_area = Rect {
        x: area.x,
        y: area.y + (area.height / 2),
        width: area.width,
        height: 1,
    };
    let paragraph = Paragraph::new(text.to_string()).style(style);
    frame.render_widget(paragraph, text_area);
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 || visible == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    let start = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(start)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn footer_text(state: &AppState) -> String {
    if let Some(field) = state.editing {
        return format!(
            "Editing {} | Enter/Esc Done | Backspace Delete",
            state::field_label(field)
        );
    }
    let export = state
        .last_export
        .as_deref()
        .map(|path| format!(" | last export {path}"))
        .unwrap_or_default();
    format!(
        "r Refresh | / Search | s Sort | n Season | y Year | a API | e Export CSV | j/k Move | ? Help | q Quit{export}"
    )
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "MAL Predictions - Help",
        "",
        "  r            Refresh predictions",
        "  /            Search title or MAL id",
        "  Esc          Clear search / close help",
        "  s            Toggle sort by score",
        "  n            Next season",
        "  y            Edit year",
        "  a            Edit API base",
        "  e            Export visible rows to CSV",
        "  j/k or ↑/↓   Move selection",
        "  ?            Toggle help",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
