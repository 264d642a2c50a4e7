use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{BarChart, Block, Borders, Clear, Paragraph, Wrap},
};
use std::io::stdout;
use std::path::Path;
use std::sync::mpsc::Receiver;
use tracing::{info, warn};

use crate::analytics;
use crate::auth::{AuthEvent, AuthService};
use crate::drag::{self, DragController, DropTarget, Point};
use crate::filter::{self, ExperienceBucket, FilterCriteria};
use crate::models::{Application, NewApplication, ResumeSource, ResumeUpload, Stage};
use crate::pipeline::{StageGroups, group_by_stage};
use crate::repository::ApplicationRepository;

const CARD_HEIGHT: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Kanban,
    Analytics,
}

#[derive(Default)]
struct SignInForm {
    email: String,
    password: String,
    on_password: bool,
    sign_up: bool,
    error: Option<String>,
}

const ADD_FIELDS: [&str; 4] = ["Candidate Name *", "Role *", "Years of Experience", "Resume (URL or PDF path)"];

struct AddForm {
    values: [String; 4],
    status: Stage,
    /// 0..=3 are text fields, 4 is the status selector.
    focus: usize,
    error: Option<String>,
}

impl AddForm {
    fn new() -> Self {
        Self {
            values: [String::new(), String::new(), "0".to_string(), String::new()],
            status: Stage::Applied,
            focus: 0,
            error: None,
        }
    }

    fn to_new_application(&self) -> Result<NewApplication, String> {
        let [name, role, years, resume] = &self.values;
        if name.trim().is_empty() || role.trim().is_empty() {
            return Err("Candidate name and role are required".to_string());
        }
        let experience_years = match years.trim() {
            "" => 0,
            raw => raw
                .parse::<u32>()
                .map_err(|_| format!("'{}' is not a number of years", raw))?,
        };
        let resume = resume.trim();
        let resume = if resume.is_empty() {
            None
        } else if resume.starts_with("http://") || resume.starts_with("https://") {
            Some(ResumeSource::Link {
                url: resume.to_string(),
                file_name: None,
            })
        } else {
            let path = Path::new(resume);
            let bytes = std::fs::read(path).map_err(|e| format!("Cannot read {}: {}", resume, e))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| resume.to_string());
            Some(ResumeSource::Upload(ResumeUpload { file_name, bytes }))
        };
        Ok(NewApplication {
            candidate_name: name.clone(),
            role: role.clone(),
            experience_years,
            status: self.status,
            resume,
        })
    }
}

enum Mode {
    Normal,
    Search,
    Adding(AddForm),
    ConfirmDelete(i64),
}

struct AppState<'a> {
    repo: ApplicationRepository<'a>,
    auth: &'a AuthService<'a>,
    auth_events: Receiver<AuthEvent>,
    criteria: FilterCriteria,
    view: View,
    mode: Mode,
    sign_in: SignInForm,
    drag: DragController,
    focus_col: usize,
    focus_row: usize,
    message: Option<String>,
    /// Drop targets laid out by the last frame.
    targets: Vec<(Rect, DropTarget)>,
}

impl<'a> AppState<'a> {
    fn new(repo: ApplicationRepository<'a>, auth: &'a AuthService<'a>, activation_distance: u16) -> Self {
        let auth_events = auth.subscribe();
        Self {
            repo,
            auth,
            auth_events,
            criteria: FilterCriteria::default(),
            view: View::Kanban,
            mode: Mode::Normal,
            sign_in: SignInForm::default(),
            drag: DragController::new(activation_distance),
            focus_col: 0,
            focus_row: 0,
            message: None,
            targets: Vec::new(),
        }
    }

    fn sync_auth(&mut self) {
        while let Ok(event) = self.auth_events.try_recv() {
            if event == AuthEvent::SignedOut {
                self.criteria.clear();
                self.mode = Mode::Normal;
                self.drag.cancel();
                self.view = View::Kanban;
            }
            if let Err(e) = self.repo.handle_auth_event(&event) {
                self.message = Some(e.to_string());
            }
        }
    }

    fn groups(&self) -> StageGroups<'_> {
        group_by_stage(filter::apply(self.repo.applications(), &self.criteria))
    }

    fn selected_id(&self) -> Option<i64> {
        let stage = Stage::ALL[self.focus_col];
        self.groups()[&stage].get(self.focus_row).map(|app| app.id)
    }

    fn clamp_focus(&mut self) {
        let len = self.groups()[&Stage::ALL[self.focus_col]].len();
        self.focus_row = self.focus_row.min(len.saturating_sub(1));
    }

    fn focus_card(&mut self, id: i64) {
        let found = self.groups().iter().find_map(|(stage, list)| {
            list.iter().position(|app| app.id == id).map(|row| (stage.index(), row))
        });
        if let Some((col, row)) = found {
            self.focus_col = col;
            self.focus_row = row;
        }
    }

    fn hit_test(&self, at: Point) -> Option<DropTarget> {
        let mut column = None;
        for (rect, target) in &self.targets {
            if !contains(*rect, at) {
                continue;
            }
            match target {
                DropTarget::Card(_) => return Some(*target),
                DropTarget::Column(_) => column = Some(*target),
            }
        }
        column
    }

    fn move_selected(&mut self, stage: Stage) {
        let Some(id) = self.selected_id() else { return };
        let outcome = match self.repo.get(id) {
            Some(app) if app.status == stage => return,
            Some(app) => drag::DropOutcome::Move {
                id,
                from: app.status,
                to: stage,
            },
            None => return,
        };
        match drag::commit(outcome, &mut self.repo) {
            Ok(Some(app)) => {
                self.message = Some(format!("Moved {} to {}", app.candidate_name, app.status.title()));
                self.focus_card(id);
            }
            Ok(None) => {}
            Err(e) => self.message = Some(format!("Failed to update application status: {}", e)),
        }
    }

    fn cycle_role(&mut self) {
        let roles = filter::unique_roles(self.repo.applications());
        let next = match self.criteria.role.as_deref() {
            None => roles.first().cloned(),
            Some(current) => roles
                .iter()
                .position(|r| r == current)
                .and_then(|i| roles.get(i + 1))
                .cloned(),
        };
        self.criteria.role = next;
    }

    fn cycle_status(&mut self) {
        self.criteria.status = match self.criteria.status {
            None => Some(Stage::ALL[0]),
            Some(stage) => Stage::ALL.get(stage.index() + 1).copied(),
        };
    }

    fn cycle_experience(&mut self) {
        let all = ExperienceBucket::ALL;
        self.criteria.experience = match self.criteria.experience {
            None => Some(all[0]),
            Some(bucket) => all
                .iter()
                .position(|b| *b == bucket)
                .and_then(|i| all.get(i + 1))
                .copied(),
        };
    }

    /// Returns true when the dashboard should close.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.repo.owner().is_none() {
            return self.handle_sign_in_key(key);
        }
        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Normal => {
                let quit = self.handle_normal_key(key);
                // Mouse events only reach the controller in the Kanban view's normal mode.
                if !matches!(self.mode, Mode::Normal) || self.view != View::Kanban {
                    self.drag.cancel();
                }
                return quit;
            }
            Mode::Search => match key.code {
                KeyCode::Enter => {}
                KeyCode::Esc => self.criteria.search.clear(),
                KeyCode::Backspace => {
                    self.criteria.search.pop();
                    self.mode = Mode::Search;
                }
                KeyCode::Char(c) => {
                    self.criteria.search.push(c);
                    self.mode = Mode::Search;
                }
                _ => self.mode = Mode::Search,
            },
            Mode::Adding(form) => self.handle_add_key(form, key),
            Mode::ConfirmDelete(id) => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => match self.repo.delete(id) {
                    Ok(()) => self.message = Some(format!("Deleted application #{}", id)),
                    Err(e) => {
                        warn!(id, "failed to delete application: {}", e);
                        self.message = Some(format!("Failed to delete application: {}", e));
                    }
                },
                KeyCode::Char('n') | KeyCode::Esc => {}
                _ => self.mode = Mode::ConfirmDelete(id),
            },
        }
        self.clamp_focus();
        false
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => {
                self.view = match self.view {
                    View::Kanban => View::Analytics,
                    View::Analytics => View::Kanban,
                }
            }
            KeyCode::Char('a') => self.mode = Mode::Adding(AddForm::new()),
            KeyCode::Char('o') => {
                if let Err(e) = self.auth.sign_out() {
                    self.message = Some(format!("Failed to sign out: {}", e));
                }
            }
            KeyCode::Char('R') => {
                if let Err(e) = self.repo.refresh() {
                    self.message = Some(e.to_string());
                }
            }
            _ if self.view == View::Analytics => {}
            KeyCode::Char('/') => self.mode = Mode::Search,
            KeyCode::Char('r') => self.cycle_role(),
            KeyCode::Char('s') => self.cycle_status(),
            KeyCode::Char('e') => self.cycle_experience(),
            KeyCode::Char('c') => self.criteria.clear(),
            KeyCode::Left | KeyCode::Char('h') => {
                self.focus_col = self.focus_col.saturating_sub(1);
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.focus_col = (self.focus_col + 1).min(Stage::ALL.len() - 1);
            }
            KeyCode::Up | KeyCode::Char('k') => self.focus_row = self.focus_row.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.focus_row += 1,
            KeyCode::Char(c @ '1'..='4') => {
                let index = c as usize - '1' as usize;
                self.move_selected(Stage::ALL[index]);
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_id() {
                    self.mode = Mode::ConfirmDelete(id);
                }
            }
            _ => {}
        }
        self.clamp_focus();
        false
    }

    fn handle_add_key(&mut self, mut form: AddForm, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => return,
            KeyCode::Tab | KeyCode::Down => form.focus = (form.focus + 1) % 5,
            KeyCode::BackTab | KeyCode::Up => form.focus = (form.focus + 4) % 5,
            KeyCode::Left if form.focus == 4 => {
                form.status = Stage::ALL[(form.status.index() + 3) % 4];
            }
            KeyCode::Right if form.focus == 4 => {
                form.status = Stage::ALL[(form.status.index() + 1) % 4];
            }
            KeyCode::Backspace if form.focus < 4 => {
                form.values[form.focus].pop();
            }
            KeyCode::Char(c) if form.focus < 4 => {
                if form.focus != 2 || c.is_ascii_digit() {
                    form.values[form.focus].push(c);
                }
            }
            KeyCode::Enter => match form.to_new_application() {
                Err(msg) => form.error = Some(msg),
                Ok(new) => match self.repo.add(new) {
                    Ok(app) => {
                        self.message = Some(format!("Added {}", app.candidate_name));
                        self.focus_card(app.id);
                        return;
                    }
                    Err(e) => {
                        warn!("failed to add application: {}", e);
                        form.error = Some(e.to_string());
                    }
                },
            },
            _ => {}
        }
        self.mode = Mode::Adding(form);
    }

    fn handle_sign_in_key(&mut self, key: KeyEvent) -> bool {
        let form = &mut self.sign_in;
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                form.on_password = !form.on_password;
            }
            KeyCode::Char('t') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                form.sign_up = !form.sign_up;
                form.error = None;
            }
            KeyCode::Backspace => {
                if form.on_password {
                    form.password.pop();
                } else {
                    form.email.pop();
                }
            }
            KeyCode::Char(c) => {
                if form.on_password {
                    form.password.push(c);
                } else {
                    form.email.push(c);
                }
            }
            KeyCode::Enter => {
                if form.email.trim().is_empty() || form.password.trim().is_empty() {
                    return false;
                }
                let result = if form.sign_up {
                    self.auth.sign_up(&form.email, &form.password)
                } else {
                    self.auth.sign_in(&form.email, &form.password)
                };
                match result {
                    Ok(user) => {
                        info!(user_id = user.id, "dashboard sign-in");
                        self.sign_in = SignInForm::default();
                    }
                    Err(e) => {
                        form.error = Some(e.to_string());
                        form.password.clear();
                    }
                }
            }
            _ => {}
        }
        false
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.repo.owner().is_none() || self.view != View::Kanban || !matches!(self.mode, Mode::Normal) {
            return;
        }
        let at = Point::new(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(DropTarget::Card(id)) = self.hit_test(at) {
                    self.focus_card(id);
                    self.drag.press(id, at);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => self.drag.motion(at),
            MouseEventKind::Up(MouseButton::Left) => {
                let target = self.hit_test(at);
                let outcome = self.drag.release(target, self.repo.applications());
                match drag::commit(outcome, &mut self.repo) {
                    Ok(Some(app)) => {
                        self.message = Some(format!("Moved {} to {}", app.candidate_name, app.status.title()));
                        self.focus_card(app.id);
                    }
                    Ok(None) => {}
                    Err(e) => self.message = Some(format!("Failed to update application status: {}", e)),
                }
            }
            _ => {}
        }
    }
}

pub fn run_dashboard<'a>(
    repo: ApplicationRepository<'a>,
    auth: &'a AuthService<'a>,
    activation_distance: u16,
) -> Result<()> {
    let mut state = AppState::new(repo, auth, activation_distance);
    if let Some(user) = auth.current_user()? {
        if let Err(e) = state.repo.load(user) {
            state.message = Some(e.to_string());
        }
    }

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state);

    // Restore terminal
    stdout().execute(DisableMouseCapture)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, state: &mut AppState) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, state))?;

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                state.message = None;
                if state.handle_key(key) {
                    break;
                }
            }
            Event::Mouse(mouse) => state.handle_mouse(mouse),
            _ => {}
        }
        state.sync_auth();
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &mut AppState) {
    let Some(user) = state.repo.owner() else {
        state.targets.clear();
        draw_sign_in(frame, &state.sign_in);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    // Header
    let tab = |view: View, label: &'static str| {
        if state.view == view {
            Span::styled(format!(" {} ", label), Style::default().fg(Color::Black).bg(Color::Cyan))
        } else {
            Span::raw(format!(" {} ", label))
        }
    };
    let header = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("ATS Dashboard", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("   "),
            tab(View::Kanban, "Kanban"),
            tab(View::Analytics, "Analytics"),
        ]),
        Line::from(Span::styled(
            format!("Welcome back, {}", user.email),
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let mut targets = Vec::new();
    match state.view {
        View::Kanban => draw_kanban(frame, chunks[1], state, &mut targets),
        View::Analytics => draw_analytics(frame, chunks[1], state.repo.applications()),
    }

    // Footer help
    let footer = match (&state.message, state.view) {
        (Some(msg), _) => Paragraph::new(format!(" {}", msg)).style(Style::default().fg(Color::Yellow)),
        (None, View::Kanban) => Paragraph::new(
            " h/l/j/k:select  drag:move  1-4:stage  a:add  d:delete  /:search  r/s/e:filters  c:clear  Tab:analytics  o:sign out  q:quit",
        )
        .style(Style::default().fg(Color::DarkGray)),
        (None, View::Analytics) => Paragraph::new(" Tab:kanban  a:add  R:reload  o:sign out  q:quit")
            .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(footer, chunks[2]);

    // Overlays
    if let Some((id, at)) = state.drag.active() {
        if let Some(app) = state.repo.get(id) {
            draw_drag_overlay(frame, app, at);
        }
    }
    match &state.mode {
        Mode::Adding(form) => draw_add_form(frame, form),
        Mode::ConfirmDelete(id) => {
            if let Some(app) = state.repo.get(*id) {
                draw_confirm_delete(frame, app);
            }
        }
        Mode::Normal | Mode::Search => {}
    }

    state.targets = targets;
}

fn stage_color(stage: Stage) -> Color {
    match stage {
        Stage::Applied => Color::Blue,
        Stage::Interview => Color::Yellow,
        Stage::Offer => Color::Green,
        Stage::Rejected => Color::Red,
    }
}

fn draw_kanban(frame: &mut Frame, area: Rect, state: &AppState, targets: &mut Vec<(Rect, DropTarget)>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    // Filter bar
    let criteria = &state.criteria;
    let search = if matches!(state.mode, Mode::Search) {
        format!("{}_", criteria.search)
    } else if criteria.search.is_empty() {
        "(press /)".to_string()
    } else {
        criteria.search.clone()
    };
    let facet = |label: &str, value: Option<String>, fallback: &str| {
        vec![
            Span::styled(format!("{}: ", label), Style::default().fg(Color::DarkGray)),
            Span::raw(value.unwrap_or_else(|| fallback.to_string())),
            Span::raw("   "),
        ]
    };
    let mut bar = facet("Search", Some(search), "");
    bar.extend(facet("Role", criteria.role.clone(), "All Roles"));
    bar.extend(facet("Status", criteria.status.map(|s| s.title().to_string()), "All Status"));
    bar.extend(facet("Experience", criteria.experience.map(|b| format!("{} years", b)), "Any"));

    let all = state.repo.applications();
    let visible = filter::apply(all, criteria);
    let hint = if let Some(err) = state.repo.error() {
        Span::styled(err.to_string(), Style::default().fg(Color::Red))
    } else if all.is_empty() {
        Span::styled(
            "No applications yet. Press 'a' to add your first application.",
            Style::default().fg(Color::DarkGray),
        )
    } else if visible.is_empty() {
        Span::styled(
            "No applications match your current filters. Press 'c' to clear all filters.",
            Style::default().fg(Color::DarkGray),
        )
    } else if criteria.is_active() {
        Span::styled(
            format!("Showing {} of {}", visible.len(), all.len()),
            Style::default().fg(Color::DarkGray),
        )
    } else {
        Span::raw("")
    };
    let filter_bar = Paragraph::new(vec![Line::from(bar), Line::from(hint)])
        .block(Block::default().borders(Borders::ALL).title(" Filters "));
    frame.render_widget(filter_bar, chunks[0]);

    // Columns
    let groups = group_by_stage(visible);
    let dragged = state.drag.active().map(|(id, _)| id);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(chunks[1]);

    for (col, stage) in Stage::ALL.into_iter().enumerate() {
        let apps = &groups[&stage];
        let area = columns[col];
        targets.push((area, DropTarget::Column(stage)));

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(stage_color(stage)))
            .title(format!(" {} ({}) ", stage.title(), apps.len()));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let capacity = usize::from((inner.height / CARD_HEIGHT).max(1));
        let start = if state.focus_col == col && state.focus_row >= capacity {
            state.focus_row + 1 - capacity
        } else {
            0
        };

        for (slot, (row, app)) in apps.iter().enumerate().skip(start).take(capacity).enumerate() {
            let rect = Rect::new(inner.x, inner.y + slot as u16 * CARD_HEIGHT, inner.width, CARD_HEIGHT)
                .intersection(inner);
            if rect.height < 3 {
                break;
            }
            let focused = state.focus_col == col && state.focus_row == row;
            draw_card(frame, rect, app, focused, dragged == Some(app.id));
            targets.push((rect, DropTarget::Card(app.id)));
        }
    }
}

fn draw_card(frame: &mut Frame, area: Rect, app: &Application, focused: bool, dragging: bool) {
    let border = if dragging {
        Style::default().fg(Color::DarkGray)
    } else if focused {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let name_style = if dragging {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let resume = if app.resume.is_some() { "  [resume]" } else { "" };
    let lines = vec![
        Line::from(Span::styled(app.candidate_name.clone(), name_style)),
        Line::from(vec![
            Span::styled(app.role.clone(), Style::default().fg(Color::Cyan)),
            Span::raw(format!("  {}y{}", app.experience_years, resume)),
        ]),
        Line::from(Span::styled(
            format!("Added {}", app.created_at.format("%b %-d, %Y")),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let card = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).border_style(border));
    frame.render_widget(card, area);
}

fn draw_drag_overlay(frame: &mut Frame, app: &Application, at: Point) {
    let screen = frame.area();
    let width = 30.min(screen.width);
    let height = 4.min(screen.height);
    let x = at.x.min(screen.width.saturating_sub(width));
    let y = at.y.min(screen.height.saturating_sub(height));
    let area = Rect::new(x, y, width, height);

    let overlay = Paragraph::new(vec![
        Line::from(Span::styled(
            app.candidate_name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(app.role.clone(), Style::default().fg(Color::Cyan))),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    frame.render_widget(Clear, area);
    frame.render_widget(overlay, area);
}

fn draw_analytics(frame: &mut Frame, area: Rect, apps: &[Application]) {
    let summary = analytics::summarize(apps);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    let tiles = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(chunks[0]);
    let stats = [
        ("Total Candidates", summary.total.to_string(), Color::Blue),
        ("Avg Experience", format!("{:.1}y", summary.avg_experience), Color::Green),
        ("Conversion Rate", format!("{:.1}%", summary.conversion_rate), Color::Yellow),
        ("Offers Made", summary.offers().to_string(), Color::Magenta),
    ];
    for (tile, (title, value, color)) in tiles.iter().zip(stats) {
        let widget = Paragraph::new(Line::from(Span::styled(
            value,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(format!(" {} ", title)));
        frame.render_widget(widget, *tile);
    }

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);

    // Stage distribution
    let bar_room = usize::from(body[0].width.saturating_sub(24));
    let mut lines = Vec::new();
    for stage in Stage::ALL {
        let count = summary.by_stage[&stage];
        let share = summary.stage_share(stage);
        let filled = (share / 100.0 * bar_room as f64).round() as usize;
        lines.push(Line::from(vec![
            Span::raw(format!("{:<10} {:>3} ", stage.title(), count)),
            Span::styled("█".repeat(filled), Style::default().fg(stage_color(stage))),
            Span::raw(format!(" {:.1}%", share)),
        ]));
    }
    let distribution = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Pipeline "))
        .wrap(Wrap { trim: false });
    frame.render_widget(distribution, body[0]);

    // Role histogram
    let data: Vec<(&str, u64)> = summary
        .roles
        .iter()
        .map(|r| (r.role.as_str(), r.count as u64))
        .collect();
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(" Candidates by Role "))
        .data(data.as_slice())
        .bar_width(9)
        .bar_gap(2)
        .max(summary.role_axis_max())
        .bar_style(Style::default().fg(Color::Blue))
        .value_style(Style::default().fg(Color::Black).bg(Color::Blue));
    frame.render_widget(chart, body[1]);
}

fn draw_add_form(frame: &mut Frame, form: &AddForm) {
    let area = centered_rect(64, 16, frame.area());
    let mut lines = Vec::new();
    for (i, label) in ADD_FIELDS.iter().enumerate() {
        let focused = form.focus == i;
        let marker = if focused { "> " } else { "  " };
        lines.push(Line::from(Span::styled(
            format!("{}{}", marker, label),
            Style::default().fg(Color::DarkGray),
        )));
        let cursor = if focused { "_" } else { "" };
        lines.push(Line::from(format!("    {}{}", form.values[i], cursor)));
    }
    let status_style = if form.focus == 4 {
        Style::default().fg(stage_color(form.status)).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(stage_color(form.status))
    };
    lines.push(Line::from(vec![
        Span::styled(
            format!("{}Initial Status: ", if form.focus == 4 { "> " } else { "  " }),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(format!("< {} >", form.status.title()), status_style),
    ]));
    lines.push(Line::from(""));
    if let Some(err) = &form.error {
        lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red))));
    }
    lines.push(Line::from(Span::styled(
        "Tab: next field  Left/Right: status  Enter: add  Esc: cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Add New Application "));
    frame.render_widget(Clear, area);
    frame.render_widget(widget, area);
}

fn draw_confirm_delete(frame: &mut Frame, app: &Application) {
    let area = centered_rect(50, 8, frame.area());
    let message = format!(
        "Are you sure you want to delete the application from {}? This cannot be undone.",
        app.candidate_name
    );
    let mut lines: Vec<Line> = textwrap::fill(&message, usize::from(area.width.saturating_sub(4)).max(10))
        .lines()
        .map(|l| Line::from(l.to_string()))
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("y", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::raw(": delete   "),
        Span::styled("n", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(": cancel"),
    ]));
    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Delete Application "),
    );
    frame.render_widget(Clear, area);
    frame.render_widget(widget, area);
}

fn draw_sign_in(frame: &mut Frame, form: &SignInForm) {
    let area = centered_rect(54, 13, frame.area());
    let field = |label: &str, value: String, focused: bool| {
        let style = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        vec![
            Line::from(Span::styled(format!("{}{}", if focused { "> " } else { "  " }, label), style)),
            Line::from(format!("    {}{}", value, if focused { "_" } else { "" })),
        ]
    };
    let mut lines = vec![Line::from(Span::styled(
        if form.sign_up {
            "Create an account to start tracking candidates"
        } else {
            "Sign in to manage your applications"
        },
        Style::default().fg(Color::DarkGray),
    ))];
    lines.push(Line::from(""));
    lines.extend(field("Email", form.email.clone(), !form.on_password));
    lines.extend(field("Password", "*".repeat(form.password.chars().count()), form.on_password));
    lines.push(Line::from(""));
    if let Some(err) = &form.error {
        lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red))));
    }
    lines.push(Line::from(Span::styled(
        format!(
            "Enter: {}  Tab: switch field  Ctrl-T: {}  Esc: quit",
            if form.sign_up { "sign up" } else { "sign in" },
            if form.sign_up { "have an account?" } else { "create account" }
        ),
        Style::default().fg(Color::DarkGray),
    )));

    let title = if form.sign_up { " ATS - Sign Up " } else { " ATS - Sign In " };
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(widget, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn contains(rect: Rect, at: Point) -> bool {
    at.x >= rect.x && at.x < rect.x + rect.width && at.y >= rect.y && at.y < rect.y + rect.height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::drag::DragState;
    use crate::repository::tests::MemoryFiles;

    #[test]
    fn add_form_builds_link_resume() {
        let mut form = AddForm::new();
        form.values = [
            "Ada".to_string(),
            "Eng".to_string(),
            "3".to_string(),
            "https://example.com/cv.pdf".to_string(),
        ];
        form.status = Stage::Interview;
        let new = form.to_new_application().unwrap();
        assert_eq!(new.experience_years, 3);
        assert_eq!(new.status, Stage::Interview);
        assert!(matches!(new.resume, Some(ResumeSource::Link { .. })));
    }

    #[test]
    fn add_form_reads_resume_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ada.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let mut form = AddForm::new();
        form.values = [
            "Ada".to_string(),
            "Eng".to_string(),
            String::new(),
            path.display().to_string(),
        ];
        let new = form.to_new_application().unwrap();
        assert_eq!(new.experience_years, 0);
        match new.resume {
            Some(ResumeSource::Upload(upload)) => {
                assert_eq!(upload.file_name, "ada.pdf");
                assert_eq!(upload.bytes, b"%PDF-1.4");
            }
            other => panic!("unexpected resume {other:?}"),
        }
    }

    #[test]
    fn add_form_requires_name_and_role() {
        let form = AddForm::new();
        assert!(form.to_new_application().is_err());
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn leaving_normal_mode_cancels_a_drag() {
        let db = Database::open_in_memory();
        let files = MemoryFiles::default();
        let dir = tempfile::tempdir().unwrap();
        let auth = AuthService::new(&db, dir.path().join("session.json"));
        let repo = ApplicationRepository::new(&db, &files);
        let mut state = AppState::new(repo, &auth, 2);

        auth.sign_up("ada@example.com", "secret1").unwrap();
        state.sync_auth();
        let id = state.repo.add(NewApplication::new("Ada", "Eng", 2)).unwrap().id;

        for opener in ['a', '/'] {
            assert!(state.drag.press(id, Point::new(1, 1)));
            state.drag.motion(Point::new(10, 1));
            assert!(state.drag.active().is_some());

            assert!(!state.handle_key(key(opener)));
            assert!(!matches!(state.mode, Mode::Normal));
            assert_eq!(state.drag.state(), DragState::Idle);

            state.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
            assert!(matches!(state.mode, Mode::Normal));
        }
    }

    #[test]
    fn hit_areas() {
        let rect = Rect::new(2, 3, 4, 2);
        assert!(contains(rect, Point::new(2, 3)));
        assert!(contains(rect, Point::new(5, 4)));
        assert!(!contains(rect, Point::new(6, 4)));
        assert!(!contains(rect, Point::new(2, 5)));
    }

    #[test]
    fn centered_rect_fits_small_screens() {
        let area = Rect::new(0, 0, 20, 5);
        let rect = centered_rect(64, 16, area);
        assert_eq!(rect, area);
    }
}
