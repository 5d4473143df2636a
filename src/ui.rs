use crate::api::NotesClient;
use crate::config::Config;
use crate::model::{Note, NoteDraft, NotePatch};
use crate::search::{empty_placeholder, filter_notes};
use crate::session::{Mode, Outcome, Request, Session};
use crate::store::LoadStatus;
use crate::worker::Worker;
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::info;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

pub fn run(client: NotesClient, config: &Config) -> Result<()> {
    let label = backend_label(config);
    let worker = Worker::spawn(client).context("starting API worker")?;
    let mut terminal = setup_terminal()?;
    let mut app = App::new(label);
    app.start();
    let result = app.event_loop(&mut terminal, &worker);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    session: Session,
    backend: String,
    search: FieldValue,
    searching: bool,
    confirm_delete: Option<String>,
    form: Option<NoteForm>,
    status: String,
    outbox: Vec<Request>,
    last_sync: Option<Instant>,
}

struct NoteForm {
    title: FieldValue,
    content: FieldValue,
    field: FormField,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum FormField {
    Title,
    Content,
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_char(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_char(self.cursor, &self.value);
    }

    fn move_up(&mut self) {
        let (line_starts, line_idx, col) = line_state(&self.value, self.cursor);
        if line_idx == 0 {
            return;
        }
        let target_start = line_starts[line_idx - 1];
        self.cursor = index_at_col(&self.value, target_start, col);
    }

    fn move_down(&mut self) {
        let (line_starts, line_idx, col) = line_state(&self.value, self.cursor);
        if line_idx + 1 >= line_starts.len() {
            return;
        }
        let target_start = line_starts[line_idx + 1];
        self.cursor = index_at_col(&self.value, target_start, col);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl NoteForm {
    fn new() -> Self {
        NoteForm {
            title: FieldValue::new(""),
            content: FieldValue::new(""),
            field: FormField::Title,
        }
    }

    fn from_note(note: &Note) -> Self {
        NoteForm {
            title: FieldValue::new(&note.title),
            content: FieldValue::new(&note.content),
            field: FormField::Title,
        }
    }

    fn toggle_field(&mut self) {
        self.field = match self.field {
            FormField::Title => FormField::Content,
            FormField::Content => FormField::Title,
        };
    }

    fn active_field_mut(&mut self) -> &mut FieldValue {
        match self.field {
            FormField::Title => &mut self.title,
            FormField::Content => &mut self.content,
        }
    }
}

impl App {
    fn new(backend: String) -> Self {
        App {
            session: Session::new(),
            backend,
            search: FieldValue::new(""),
            searching: false,
            confirm_delete: None,
            form: None,
            status: "Loading notes…".into(),
            outbox: Vec::new(),
            last_sync: None,
        }
    }

    fn start(&mut self) {
        let request = self.session.refresh();
        self.outbox.push(request);
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
        worker: &Worker,
    ) -> Result<()> {
        loop {
            worker.submit_all(self.outbox.drain(..));
            while let Some(response) = worker.try_next() {
                let listed = matches!(response.outcome, Outcome::Listed(Ok(_)));
                let follow_ups = self.session.apply(response);
                self.outbox.extend(follow_ups);
                if listed {
                    self.last_sync = Some(Instant::now());
                }
                self.sync_form();
            }
            worker.submit_all(self.outbox.drain(..));

            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        info!("event=app_exit in_flight={}", self.session.in_flight());
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.session.alert().is_some() {
            self.session.dismiss_alert();
            return false;
        }
        if self.confirm_delete.is_some() {
            self.handle_confirm_key(key);
            return false;
        }
        if self.searching {
            self.handle_search_key(key);
            return false;
        }
        let quit = match self.session.mode() {
            Mode::Editing | Mode::Creating => {
                self.handle_form_key(key);
                false
            }
            Mode::Empty | Mode::Viewing => self.handle_normal_key(key),
        };
        self.sync_form();
        quit
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Up | KeyCode::Char('k') => self.step_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.step_selection(1),
            KeyCode::Char('n') => {
                self.session.open_create();
                self.form = Some(NoteForm::new());
                self.status = "New note (Tab switch field, Ctrl+S save, Esc cancel)".into();
            }
            KeyCode::Char('e') | KeyCode::Enter => match self.session.open_edit() {
                Ok(()) => {
                    self.form = self.session.active_note().map(NoteForm::from_note);
                    self.status = "Editing (Tab switch field, Ctrl+S save, Esc cancel)".into();
                }
                Err(err) => self.status = format!("Cannot edit: {}", err),
            },
            KeyCode::Char('d') => self.request_delete(),
            KeyCode::Char('/') => {
                self.searching = true;
                self.status = "Search (Enter keep, Esc clear)".into();
            }
            KeyCode::Char('r') => {
                let request = self.session.refresh();
                self.outbox.push(request);
                self.status = "Refreshing…".into();
            }
            KeyCode::Esc => {
                if !self.search.value.is_empty() {
                    self.search.clear();
                    self.status = "Search cleared".into();
                }
            }
            _ => {}
        }
        false
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.search.clear();
                self.searching = false;
                self.status = "Search cleared".into();
            }
            KeyCode::Enter => {
                self.searching = false;
                self.status = format!("Filter: {}", self.search.value);
            }
            KeyCode::Backspace => self.search.backspace(),
            KeyCode::Left => self.search.move_left(),
            KeyCode::Right => self.search.move_right(),
            KeyCode::Up => self.step_selection(-1),
            KeyCode::Down => self.step_selection(1),
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    self.search.insert_char(c);
                }
            }
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        let Some(form) = self.form.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.session.cancel();
                self.form = None;
                self.status = "Canceled".into();
            }
            KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
            KeyCode::Left => form.active_field_mut().move_left(),
            KeyCode::Right => form.active_field_mut().move_right(),
            KeyCode::Up => form.active_field_mut().move_up(),
            KeyCode::Down => form.active_field_mut().move_down(),
            KeyCode::Char('s') if control => self.submit_form(),
            KeyCode::Char('d') if control => self.request_delete(),
            KeyCode::Enter if control => self.submit_form(),
            KeyCode::Enter => match form.field {
                FormField::Title => form.field = FormField::Content,
                FormField::Content => form.content.insert_char('\n'),
            },
            KeyCode::Backspace => form.active_field_mut().backspace(),
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    form.active_field_mut().insert_char(c);
                }
            }
            _ => {}
        }
    }

    fn submit_form(&mut self) {
        let Some(form) = self.form.as_ref() else {
            return;
        };
        let title = form.title.value.clone();
        let content = form.content.value.clone();
        match self.session.mode() {
            Mode::Creating => match self.session.save_new(NoteDraft::new(title, content)) {
                Ok(request) => {
                    self.outbox.push(request);
                    self.form = None;
                    self.status = "Creating note…".into();
                }
                Err(err) => self.status = format!("Could not create: {}", err),
            },
            Mode::Editing => {
                match self
                    .session
                    .save_edit(NotePatch::new(Some(title), Some(content)))
                {
                    Ok(request) => {
                        self.outbox.push(request);
                        self.status = "Saving…".into();
                    }
                    Err(err) => self.status = format!("Could not save: {}", err),
                }
            }
            Mode::Empty | Mode::Viewing => {}
        }
    }

    fn request_delete(&mut self) {
        match self.session.active_note() {
            Some(note) => {
                self.confirm_delete = Some(note.id.clone());
                self.status = "Delete note? (y to confirm, n/Esc to cancel)".into();
            }
            None => self.status = "No note selected to delete".into(),
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        let Some(note_id) = self.confirm_delete.clone() else {
            return;
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                if let Some(request) = self.session.delete(&note_id) {
                    self.outbox.push(request);
                }
                self.status = "Deleted note".into();
                self.confirm_delete = None;
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                self.confirm_delete = None;
            }
            _ => {}
        }
        self.sync_form();
    }

    /// Keeps the editor buffer in step with the session mode.
    fn sync_form(&mut self) {
        match self.session.mode() {
            Mode::Editing if self.form.is_none() => {
                self.form = self.session.active_note().map(NoteForm::from_note);
            }
            Mode::Creating if self.form.is_none() => self.form = Some(NoteForm::new()),
            Mode::Empty | Mode::Viewing => self.form = None,
            _ => {}
        }
    }

    fn visible_notes(&self) -> Vec<&Note> {
        filter_notes(self.session.notes(), &self.search.value)
    }

    fn step_selection(&mut self, delta: isize) {
        let target = {
            let visible = self.visible_notes();
            if visible.is_empty() {
                return;
            }
            let current = self
                .session
                .active_id()
                .and_then(|id| visible.iter().position(|n| n.id == id));
            let next = match current {
                Some(idx) => (idx as isize + delta).clamp(0, visible.len() as isize - 1) as usize,
                None => 0,
            };
            visible[next].id.clone()
        };
        self.session.select(&target);
    }

    fn draw(&self, f: &mut ratatui::Frame<'_>) {
        let banner_height = if self.session.status() == LoadStatus::Error {
            3
        } else {
            0
        };
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(banner_height),
                Constraint::Min(8),
                Constraint::Length(3),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        if banner_height > 0 {
            self.draw_banner(f, layout[1]);
        }
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(32), Constraint::Percentage(68)])
            .split(layout[2]);
        self.draw_sidebar(f, body[0]);
        match self.session.mode() {
            Mode::Editing | Mode::Creating => self.draw_editor(f, body[1]),
            Mode::Viewing => self.draw_note(f, body[1]),
            Mode::Empty => self.draw_empty(f, body[1]),
        }
        self.draw_footer(f, layout[3]);

        if let Some(note_id) = &self.confirm_delete {
            self.draw_confirm(f, note_id);
        }
        if let Some(message) = self.session.alert() {
            draw_alert(f, message);
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let synced = match self.last_sync {
            Some(at) => format!("synced {}", format_elapsed(at)),
            None => "not synced".to_string(),
        };
        let mut spans = vec![
            Span::styled(
                "jotter ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(self.backend.clone(), Style::default().fg(Color::Green)),
            Span::raw("  •  "),
            Span::styled(
                format!("{} notes", self.session.notes().len()),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(synced, Style::default().fg(Color::Gray)),
            Span::raw("  •  "),
            Span::styled(
                self.session.mode().label(),
                Style::default().fg(Color::Magenta),
            ),
        ];
        if self.session.in_flight() > 0 {
            spans.push(Span::raw("  •  "));
            spans.push(Span::styled(
                format!("{} pending", self.session.in_flight()),
                Style::default().fg(Color::LightYellow),
            ));
        }
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_banner(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let text = format!(
            "Could not load notes: {}  (press r to retry)",
            self.session.error()
        );
        let banner = Paragraph::new(text)
            .style(Style::default().fg(Color::LightRed))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::LightRed)),
            );
        f.render_widget(banner, area);
    }

    fn draw_sidebar(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let visible = self.visible_notes();
        let block = Block::default()
            .title(Span::styled(
                format!("Notes ({})", visible.len()),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(1)])
            .split(inner);

        let search_text = if self.searching {
            self.search.with_caret()
        } else if self.search.value.is_empty() {
            "press / to search".to_string()
        } else {
            self.search.value.clone()
        };
        let search = Paragraph::new(Line::from(vec![
            Span::styled(
                "Search: ",
                Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                search_text,
                Style::default().fg(if self.searching {
                    Color::Cyan
                } else {
                    Color::DarkGray
                }),
            ),
        ]))
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(search, rows[0]);

        if visible.is_empty() {
            let text = if self.session.store().is_loading() {
                "Loading notes…"
            } else {
                empty_placeholder(&self.search.value)
            };
            let placeholder = Paragraph::new(text)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            f.render_widget(placeholder, rows[1]);
            return;
        }

        let width = rows[1].width as usize;
        let selected = self
            .session
            .active_id()
            .and_then(|id| visible.iter().position(|n| n.id == id));
        let items: Vec<ListItem> = visible
            .iter()
            .map(|n| sidebar_item(n, width, self.session.is_optimistic(&n.id)))
            .collect();
        let mut state = ListState::default();
        state.select(selected);
        let viewport = (rows[1].height as usize / 2).max(1);
        *state.offset_mut() = adjust_offset(selected.unwrap_or(0), 0, viewport, 1, items.len());
        let list = List::new(items).highlight_style(
            Style::default()
                .bg(Color::LightCyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
        f.render_stateful_widget(list, rows[1], &mut state);
    }

    fn draw_note(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let Some(note) = self.session.active_note() else {
            self.draw_empty(f, area);
            return;
        };
        let mut lines = vec![
            Line::from(Span::styled(
                note.title.clone(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                if self.session.is_optimistic(&note.id) {
                    "saving…".to_string()
                } else {
                    format!("updated {}", note.updated_at.format("%Y-%m-%d %H:%M"))
                },
                Style::default().fg(Color::DarkGray),
            )),
            Line::from(""),
        ];
        lines.extend(note.content.lines().map(|l| Line::from(l.to_string())));
        let detail = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .title("Note")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(detail, area);
    }

    fn draw_empty(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let text = if self.session.store().is_loading() {
            "Loading notes…"
        } else {
            "No note selected. Press n to create one."
        };
        let msg = Paragraph::new(text)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title("jotter"));
        f.render_widget(msg, area);
    }

    fn draw_editor(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let title = if self.session.mode() == Mode::Creating {
            "New Note"
        } else if self.session.is_saving() {
            "Edit Note (saving…)"
        } else {
            "Edit Note"
        };
        let mut fields = Vec::new();
        if let Some(form) = &self.form {
            fields.extend(field_lines(
                "Title",
                &form.title,
                form.field == FormField::Title,
            ));
            fields.push(Line::from(""));
            fields.extend(field_lines(
                "Content",
                &form.content,
                form.field == FormField::Content,
            ));
        }
        fields.push(Line::from(""));
        let hint = if self.session.mode() == Mode::Editing {
            "Ctrl+S save • Esc cancel • Ctrl+D delete • Tab switch field • Enter adds newline in Content"
        } else {
            "Ctrl+S save • Esc cancel • Tab switch field • Enter adds newline in Content"
        };
        fields.push(Line::from(Span::styled(
            hint,
            Style::default().fg(Color::Gray),
        )));
        let editor = Paragraph::new(fields)
            .block(
                Block::default()
                    .title(Span::styled(
                        title,
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(editor, area);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(1)])
            .split(area);
        let help = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help, rows[0]);
        let status = Paragraph::new(self.status.clone()).style(Style::default().fg(Color::Gray));
        f.render_widget(status, rows[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let spans = match self.session.mode() {
            Mode::Editing | Mode::Creating => {
                let mut spans = vec![
                    Span::styled("Ctrl+S", Style::default().fg(Color::LightGreen)),
                    Span::raw(" save  "),
                    Span::styled("Tab", Style::default().fg(Color::LightCyan)),
                    Span::raw(" field  "),
                    Span::styled("Esc", Style::default().fg(Color::LightRed)),
                    Span::raw(" cancel"),
                ];
                if self.session.mode() == Mode::Editing {
                    spans.push(Span::raw("  "));
                    spans.push(Span::styled("Ctrl+D", Style::default().fg(Color::LightRed)));
                    spans.push(Span::raw(" delete"));
                }
                spans
            }
            Mode::Empty | Mode::Viewing => vec![
                Span::styled("↑↓ / j k", Style::default().fg(Color::LightCyan)),
                Span::raw(" select  "),
                Span::styled("/", Style::default().fg(Color::LightCyan)),
                Span::raw(" search  "),
                Span::styled("n", Style::default().fg(Color::LightMagenta)),
                Span::raw(" new  "),
                Span::styled("e", Style::default().fg(Color::LightYellow)),
                Span::raw(" edit  "),
                Span::styled("d", Style::default().fg(Color::LightRed)),
                Span::raw(" delete  "),
                Span::styled("r", Style::default().fg(Color::LightGreen)),
                Span::raw(" refresh  "),
                Span::styled("q", Style::default().fg(Color::LightRed)),
                Span::raw(" quit"),
            ],
        };
        Line::from(spans)
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, note_id: &str) {
        let area = centered_rect(50, 30, f.size());
        let title = self
            .session
            .store()
            .get(note_id)
            .map(|n| n.title.clone())
            .unwrap_or_else(|| note_id.to_string());
        let body = vec![
            Line::from(Span::styled(
                format!("Delete \"{}\"?", title),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn draw_alert(f: &mut ratatui::Frame<'_>, message: &str) {
    let area = centered_rect(60, 30, f.size());
    let body = vec![
        Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::White),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press any key to continue",
            Style::default().fg(Color::Gray),
        )),
    ];
    let dialog = Paragraph::new(body)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(Span::styled(
                    "Error",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn backend_label(config: &Config) -> String {
    match (config.api_base(), config.features.fallback()) {
        (Some(base), true) => format!("{} (fallback on)", base),
        (Some(base), false) => base.to_string(),
        (None, true) => "local fallback".to_string(),
        (None, false) => "no backend".to_string(),
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn prev_char(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_char(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map(|ch| cursor + ch.len_utf8())
        .unwrap_or(text.len())
}

fn line_state(text: &str, cursor: usize) -> (Vec<usize>, usize, usize) {
    let mut starts = vec![0];
    for (idx, ch) in text.char_indices() {
        if ch == '\n' {
            starts.push(idx + 1);
        }
    }
    let line_idx = starts.iter().rposition(|start| *start <= cursor).unwrap_or(0);
    let col = text[starts[line_idx]..cursor].chars().count();
    (starts, line_idx, col)
}

fn index_at_col(text: &str, start: usize, target_col: usize) -> usize {
    let slice = &text[start..];
    let limit = slice.find('\n').unwrap_or(slice.len());
    slice[..limit]
        .char_indices()
        .nth(target_col)
        .map(|(idx, _)| start + idx)
        .unwrap_or(start + limit)
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

fn sidebar_item(note: &Note, width: usize, optimistic: bool) -> ListItem<'static> {
    let title_style = if optimistic {
        Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::ITALIC)
    } else {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    };
    let meta = if optimistic {
        "saving…".to_string()
    } else {
        note.updated_at.format("%Y-%m-%d %H:%M").to_string()
    };
    let lines = vec![
        Line::from(Span::styled(truncate_text(&note.title, width), title_style)),
        Line::from(Span::styled(
            truncate_text(&meta, width),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    ListItem::new(lines)
}

fn field_lines(label: &str, field: &FieldValue, active: bool) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let prefix = format!("{}: ", label);
    let spacer = " ".repeat(prefix.chars().count());
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    text.split('\n')
        .enumerate()
        .map(|(idx, line)| {
            Line::from(vec![
                Span::styled(
                    if idx == 0 {
                        prefix.clone()
                    } else {
                        spacer.clone()
                    },
                    label_style,
                ),
                Span::styled(line.to_string(), value_style),
            ])
        })
        .collect()
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FallbackStore, NotesApi};
    use crate::search::NO_MATCHES;
    use crate::worker::execute;
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    /// Sends every queued request to `api` and feeds the answers back.
    fn flush(app: &mut App, api: &mut FallbackStore) {
        while !app.outbox.is_empty() {
            let batch: Vec<Request> = app.outbox.drain(..).collect();
            for request in batch {
                let response = execute(api, &request);
                let follow_ups = app.session.apply(response);
                app.outbox.extend(follow_ups);
            }
            app.sync_form();
        }
    }

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).expect("terminal");
        terminal.draw(|f| app.draw(f)).expect("draw");
        let buffer = terminal.backend().buffer().clone();
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn started(api: &mut FallbackStore) -> App {
        let mut app = App::new("test".into());
        app.start();
        flush(&mut app, api);
        app
    }

    #[test]
    fn search_without_matches_shows_placeholder_and_clear_restores() {
        let mut api = FallbackStore::with_latency(Duration::ZERO);
        let mut app = started(&mut api);
        app.handle_key(key(KeyCode::Char('/')));
        type_text(&mut app, "zzzz");
        assert!(app.visible_notes().is_empty());
        assert!(render(&app).contains(NO_MATCHES));

        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.visible_notes().len(), 1);
        assert!(!render(&app).contains(NO_MATCHES));
    }

    #[test]
    fn create_from_empty_through_keys() {
        let mut api = FallbackStore::empty(Duration::ZERO);
        let mut app = started(&mut api);
        assert_eq!(app.session.mode(), Mode::Empty);

        app.handle_key(key(KeyCode::Char('n')));
        assert_eq!(app.session.mode(), Mode::Creating);
        type_text(&mut app, "T1");
        app.handle_key(ctrl('s'));

        let temp = app.session.active_id().expect("optimistic").to_string();
        assert!(app.session.is_optimistic(&temp));
        assert!(render(&app).contains("T1"));

        flush(&mut app, &mut api);
        let active = app.session.active_id().expect("active");
        assert_ne!(active, temp);
        assert!(!app.session.is_optimistic(active));
        assert_eq!(app.session.mode(), Mode::Viewing);
        assert!(app.form.is_none());
    }

    #[test]
    fn edit_save_and_delete_through_keys() {
        let mut api = FallbackStore::with_latency(Duration::ZERO);
        let mut app = started(&mut api);

        app.handle_key(key(KeyCode::Char('e')));
        assert_eq!(app.session.mode(), Mode::Editing);
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "!");
        app.handle_key(ctrl('s'));
        flush(&mut app, &mut api);
        assert_eq!(app.session.mode(), Mode::Viewing);
        assert!(app.session.active_note().expect("note").content.ends_with('!'));

        app.handle_key(key(KeyCode::Char('d')));
        assert!(app.confirm_delete.is_some());
        app.handle_key(key(KeyCode::Char('y')));
        flush(&mut app, &mut api);
        assert_eq!(app.session.mode(), Mode::Empty);
        assert!(api.is_empty());
    }

    #[test]
    fn alert_blocks_until_dismissed() {
        let mut api = FallbackStore::with_latency(Duration::ZERO);
        let mut app = started(&mut api);
        let id = app.session.active_id().expect("active").to_string();
        api.delete(&id).expect("remove behind the session's back");

        app.handle_key(key(KeyCode::Char('d')));
        app.handle_key(key(KeyCode::Char('y')));
        flush(&mut app, &mut api);
        assert!(app.session.alert().is_some());
        assert!(render(&app).contains("Press any key to continue"));

        app.handle_key(key(KeyCode::Char('n')));
        assert!(app.session.alert().is_none());
        assert_eq!(app.session.mode(), Mode::Empty);
    }

    #[test]
    fn delete_from_editor_asks_first() {
        let mut api = FallbackStore::with_latency(Duration::ZERO);
        api.create(&NoteDraft::new("second", "")).expect("seed");
        let mut app = started(&mut api);
        let doomed = app.session.active_id().expect("active").to_string();

        app.handle_key(key(KeyCode::Char('e')));
        assert_eq!(app.session.mode(), Mode::Editing);
        assert!(render(&app).contains("Ctrl+D"));

        app.handle_key(ctrl('d'));
        assert_eq!(app.confirm_delete.as_deref(), Some(doomed.as_str()));
        assert_eq!(app.session.mode(), Mode::Editing);
        assert!(render(&app).contains("Confirm Delete"));

        app.handle_key(key(KeyCode::Char('y')));
        flush(&mut app, &mut api);
        assert!(app.confirm_delete.is_none());
        assert!(app.form.is_none());
        assert_eq!(app.session.notes().len(), 1);
        assert!(app.session.store().get(&doomed).is_none());
        assert_eq!(app.session.mode(), Mode::Viewing);
        assert_eq!(api.len(), 1);
    }

    #[test]
    fn delete_from_editor_can_be_canceled() {
        let mut api = FallbackStore::with_latency(Duration::ZERO);
        let mut app = started(&mut api);
        app.handle_key(key(KeyCode::Char('e')));
        app.handle_key(ctrl('d'));
        app.handle_key(key(KeyCode::Esc));
        assert!(app.confirm_delete.is_none());
        assert_eq!(app.session.mode(), Mode::Editing);
        assert!(app.form.is_some());
        assert_eq!(api.len(), 1);
    }

    #[test]
    fn text_helpers() {
        assert_eq!(truncate_text("hello world", 8), "hello...");
        assert_eq!(truncate_text("short", 8), "short");
        let mut field = FieldValue::new("héllo\nwörld");
        field.move_up();
        assert_eq!(&field.value[..field.cursor], "héllo");
        field.backspace();
        assert_eq!(field.value, "héll\nwörld");
    }
}
