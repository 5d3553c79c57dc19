use anyhow::Result;
use chrono::Utc;
use claim_insight::{
    age_on, claims_by_denial_reason, claims_by_payer, claims_view, dataset_counts,
    default_exposure_window, encounters_by_class, financial_exposure,
    patients_by_gender_and_birthdate, payer_denial_rates, top_denial_reasons, CategoryCount,
    ClaimsView, Config, DatasetCounts, DenialEstimate, DenialRateEstimator, EstimateRequest,
    ExposureReport, FilterOptions, PatientGroupCount, PayerDenialRate, Selection, Severity,
    Snapshot,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;

const PAGE_STEP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Patients,
    Encounters,
    Claims,
    DenialReasons,
    Payers,
    Predict,
}

impl Page {
    pub const ALL: [Page; 7] = [
        Page::Overview,
        Page::Patients,
        Page::Encounters,
        Page::Claims,
        Page::DenialReasons,
        Page::Payers,
        Page::Predict,
    ];

    fn position(&self) -> usize {
        Page::ALL.iter().position(|p| p == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Page::ALL[(self.position() + 1) % Page::ALL.len()]
    }

    pub fn previous(&self) -> Self {
        Page::ALL[(self.position() + Page::ALL.len() - 1) % Page::ALL.len()]
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overview => "Overview",
            Page::Patients => "Patients",
            Page::Encounters => "Encounters",
            Page::Claims => "Claims",
            Page::DenialReasons => "Denial Reasons",
            Page::Payers => "Payers",
            Page::Predict => "Predict Denial",
        }
    }
}

// ============================================================================
// SELECTORS
// ============================================================================

/// A cycling drop-down; index 0 is "All" when the selector allows it
#[derive(Debug, Clone)]
pub struct Selector {
    pub label: &'static str,
    pub options: Vec<String>,
    pub index: usize,
}

impl Selector {
    pub fn new(label: &'static str, options: Vec<String>) -> Self {
        Selector {
            label,
            options,
            index: 0,
        }
    }

    pub fn cycle(&mut self) {
        if !self.options.is_empty() {
            self.index = (self.index + 1) % self.options.len();
        }
    }

    pub fn cycle_back(&mut self) {
        if !self.options.is_empty() {
            self.index = (self.index + self.options.len() - 1) % self.options.len();
        }
    }

    pub fn current(&self) -> &str {
        self.options.get(self.index).map(String::as_str).unwrap_or("")
    }

    pub fn selection(&self) -> Selection {
        Selection::parse(Some(self.current()))
    }
}

// ============================================================================
// PREDICT FORM
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Patient,
    Payer,
    EncounterClass,
    Cost,
    Age,
}

impl FormField {
    const ORDER: [FormField; 5] = [
        FormField::Patient,
        FormField::Payer,
        FormField::EncounterClass,
        FormField::Cost,
        FormField::Age,
    ];

    fn step(&self, forward: bool) -> Self {
        let i = FormField::ORDER.iter().position(|f| f == self).unwrap_or(0);
        let n = FormField::ORDER.len();
        let next = if forward { (i + 1) % n } else { (i + n - 1) % n };
        FormField::ORDER[next]
    }

    fn is_text(&self) -> bool {
        matches!(self, FormField::Cost | FormField::Age)
    }
}

pub struct PredictForm {
    pub field: FormField,
    /// Patient used to pre-fill the age; "-" means none
    pub patient: Selector,
    pub payer: Selector,
    pub encounter_class: Selector,
    pub cost: String,
    pub age: String,
    pub result: Option<DenialEstimate>,
    pub error: Option<String>,
}

impl PredictForm {
    fn new(snapshot: &Snapshot, options: &FilterOptions) -> Self {
        let mut patients = vec!["-".to_string()];
        patients.extend(snapshot.patients().iter().map(|p| p.id.clone()));

        PredictForm {
            field: FormField::Payer,
            patient: Selector::new("Patient", patients),
            payer: Selector::new("Payer", options.payers.clone()),
            encounter_class: Selector::new("Encounter Class", options.encounter_classes.clone()),
            cost: "1000".to_string(),
            age: "40".to_string(),
            result: None,
            error: None,
        }
    }

    fn request(&self) -> std::result::Result<EstimateRequest, String> {
        let cost: f64 = self
            .cost
            .trim()
            .parse()
            .map_err(|_| format!("Cost must be a number, got {:?}", self.cost))?;
        let age: u32 = self
            .age
            .trim()
            .parse()
            .map_err(|_| format!("Age must be a whole number, got {:?}", self.age))?;

        Ok(EstimateRequest {
            payer: self.payer.current().to_string(),
            encounter_class: self.encounter_class.current().to_string(),
            cost,
            age,
        })
    }
}

// ============================================================================
// APP STATE
// ============================================================================

pub struct App {
    pub snapshot: Arc<Snapshot>,
    pub estimator: DenialRateEstimator,
    pub preview_limit: usize,
    pub current_page: Page,
    pub counts: DatasetCounts,

    pub gender: Selector,
    pub encounter_class: Selector,
    pub status: Selector,
    pub payer: Selector,

    pub patient_groups: Vec<PatientGroupCount>,
    pub class_histogram: Vec<CategoryCount>,
    pub claims: ClaimsView,
    pub denial_reasons: Vec<CategoryCount>,
    pub payer_histogram: Vec<CategoryCount>,
    pub payer_rates: Vec<PayerDenialRate>,
    pub exposure: Option<ExposureReport>,

    pub claims_state: TableState,
    pub payers_state: TableState,
    pub form: PredictForm,
}

impl App {
    pub fn new(snapshot: Arc<Snapshot>, config: &Config) -> Self {
        let options =
            FilterOptions::collect(snapshot.patients(), snapshot.encounters(), snapshot.claims());

        let counts = dataset_counts(snapshot.patients(), snapshot.encounters(), snapshot.claims());
        let exposure = default_exposure_window(snapshot.transactions())
            .map(|window| financial_exposure(snapshot.transactions(), window));

        let form = PredictForm::new(&snapshot, &options);

        let mut app = Self {
            estimator: DenialRateEstimator::with_settings(config.estimator.clone()),
            preview_limit: config.preview_limit,
            current_page: Page::Overview,
            counts,
            gender: Selector::new("Gender", FilterOptions::with_all(&options.genders)),
            encounter_class: Selector::new(
                "Encounter Class",
                FilterOptions::with_all(&options.encounter_classes),
            ),
            status: Selector::new("Status", FilterOptions::with_all(&options.statuses)),
            payer: Selector::new("Payer", FilterOptions::with_all(&options.payers)),
            patient_groups: Vec::new(),
            class_histogram: Vec::new(),
            claims: claims_view(&[], Selection::All, Selection::All, 0),
            denial_reasons: claims_by_denial_reason(snapshot.claims()),
            payer_histogram: claims_by_payer(snapshot.claims()),
            payer_rates: payer_denial_rates(snapshot.claims()),
            exposure,
            claims_state: TableState::default(),
            payers_state: TableState::default(),
            form,
            snapshot,
        };

        app.refresh_patients();
        app.refresh_encounters();
        app.refresh_claims();
        if !app.payer_rates.is_empty() {
            app.payers_state.select(Some(0));
        }
        app
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn refresh_patients(&mut self) {
        self.patient_groups =
            patients_by_gender_and_birthdate(self.snapshot.patients(), &self.gender.selection());
    }

    fn refresh_encounters(&mut self) {
        self.class_histogram =
            encounters_by_class(self.snapshot.encounters(), &self.encounter_class.selection());
    }

    fn refresh_claims(&mut self) {
        self.claims = claims_view(
            self.snapshot.claims(),
            self.status.selection(),
            self.payer.selection(),
            self.preview_limit,
        );

        // Reset selection to first row
        if self.claims.preview.is_empty() {
            self.claims_state.select(None);
        } else {
            self.claims_state.select(Some(0));
        }
    }

    /// `f`: the page's own filter
    pub fn cycle_filter(&mut self) {
        match self.current_page {
            Page::Patients => {
                self.gender.cycle();
                self.refresh_patients();
            }
            Page::Encounters => {
                self.encounter_class.cycle();
                self.refresh_encounters();
            }
            Page::Claims => self.cycle_status(),
            _ => {}
        }
    }

    pub fn cycle_status(&mut self) {
        self.status.cycle();
        self.refresh_claims();
    }

    pub fn cycle_payer(&mut self) {
        self.payer.cycle();
        self.refresh_claims();
    }

    fn active_table(&mut self) -> Option<(&mut TableState, usize)> {
        match self.current_page {
            Page::Claims => Some((&mut self.claims_state, self.claims.preview.len())),
            Page::Payers => Some((&mut self.payers_state, self.payer_rates.len())),
            _ => None,
        }
    }

    pub fn next(&mut self) {
        if let Some((state, len)) = self.active_table() {
            if len == 0 {
                return;
            }
            let i = match state.selected() {
                Some(i) if i >= len - 1 => 0,
                Some(i) => i + 1,
                None => 0,
            };
            state.select(Some(i));
        }
    }

    pub fn previous(&mut self) {
        if let Some((state, len)) = self.active_table() {
            if len == 0 {
                return;
            }
            let i = match state.selected() {
                Some(0) => len - 1,
                Some(i) => i - 1,
                None => 0,
            };
            state.select(Some(i));
        }
    }

    pub fn page_down(&mut self) {
        if let Some((state, len)) = self.active_table() {
            if len == 0 {
                return;
            }
            let i = state.selected().map_or(0, |i| (i + PAGE_STEP).min(len - 1));
            state.select(Some(i));
        }
    }

    pub fn page_up(&mut self) {
        if let Some((state, _)) = self.active_table() {
            let i = state.selected().map_or(0, |i| i.saturating_sub(PAGE_STEP));
            state.select(Some(i));
        }
    }

    pub fn home(&mut self) {
        if let Some((state, len)) = self.active_table() {
            if len > 0 {
                state.select(Some(0));
            }
        }
    }

    pub fn end(&mut self) {
        if let Some((state, len)) = self.active_table() {
            if len > 0 {
                state.select(Some(len - 1));
            }
        }
    }

    // ========================================================================
    // PREDICT FORM INPUT
    // ========================================================================

    pub fn form_next_field(&mut self) {
        self.form.field = self.form.field.step(true);
    }

    pub fn form_previous_field(&mut self) {
        self.form.field = self.form.field.step(false);
    }

    pub fn form_cycle(&mut self, forward: bool) {
        let selector = match self.form.field {
            FormField::Patient => &mut self.form.patient,
            FormField::Payer => &mut self.form.payer,
            FormField::EncounterClass => &mut self.form.encounter_class,
            FormField::Cost | FormField::Age => return,
        };

        if forward {
            selector.cycle();
        } else {
            selector.cycle_back();
        }

        if self.form.field == FormField::Patient {
            self.prefill_age();
        }
    }

    fn prefill_age(&mut self) {
        let today = Utc::now().date_naive();
        let age = self
            .snapshot
            .patients()
            .iter()
            .find(|p| p.id == self.form.patient.current())
            .and_then(|p| p.parsed_birth_date())
            .and_then(|birth| age_on(birth, today));

        if let Some(age) = age {
            self.form.age = age.to_string();
        }
    }

    pub fn form_input(&mut self, c: char) {
        let accepts = match self.form.field {
            FormField::Cost => c.is_ascii_digit() || c == '.',
            FormField::Age => c.is_ascii_digit(),
            _ => false,
        };
        if !accepts {
            return;
        }

        match self.form.field {
            FormField::Cost => self.form.cost.push(c),
            FormField::Age => self.form.age.push(c),
            _ => {}
        }
    }

    pub fn form_backspace(&mut self) {
        match self.form.field {
            FormField::Cost => {
                self.form.cost.pop();
            }
            FormField::Age => {
                self.form.age.pop();
            }
            _ => {}
        }
    }

    pub fn run_prediction(&mut self) {
        match self.form.request() {
            Ok(request) => {
                self.form.result = Some(self.estimator.estimate(self.snapshot.claims(), &request));
                self.form.error = None;
            }
            Err(message) => {
                self.form.result = None;
                self.form.error = Some(message);
            }
        }
    }
}

// ============================================================================
// EVENT LOOP
// ============================================================================

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Tab => app.next_page(),
            KeyCode::BackTab => app.previous_page(),
            _ if app.current_page == Page::Predict => handle_form_key(app, key.code),
            KeyCode::Char('f') => app.cycle_filter(),
            KeyCode::Char('s') if app.current_page == Page::Claims => app.cycle_status(),
            KeyCode::Char('p') if app.current_page == Page::Claims => app.cycle_payer(),
            KeyCode::Down | KeyCode::Char('j') => app.next(),
            KeyCode::Up | KeyCode::Char('k') => app.previous(),
            KeyCode::PageDown => app.page_down(),
            KeyCode::PageUp => app.page_up(),
            KeyCode::Home => app.home(),
            KeyCode::End => app.end(),
            KeyCode::Right if key.modifiers.contains(KeyModifiers::SHIFT) => app.next_page(),
            KeyCode::Left if key.modifiers.contains(KeyModifiers::SHIFT) => app.previous_page(),
            _ => {}
        }
    }
}

fn handle_form_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Down | KeyCode::Char('j') => app.form_next_field(),
        KeyCode::Up | KeyCode::Char('k') => app.form_previous_field(),
        KeyCode::Right => app.form_cycle(true),
        KeyCode::Left => app.form_cycle(false),
        KeyCode::Backspace => app.form_backspace(),
        KeyCode::Enter => app.run_prediction(),
        KeyCode::Char(c) => app.form_input(c),
        _ => {}
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Tabs + KPIs
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Overview => render_overview(f, chunks[1], app),
        Page::Patients => render_patients(f, chunks[1], app),
        Page::Encounters => render_encounters(f, chunks[1], app),
        Page::Claims => render_claims(f, chunks[1], app),
        Page::DenialReasons => render_denial_reasons(f, chunks[1], app),
        Page::Payers => render_payers(f, chunks[1], app),
        Page::Predict => render_predict(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    let counts = &app.counts;
    let kpi = |label: &str, value: usize, color: Color| {
        vec![
            Span::styled(format!("{}: ", label), Style::default().fg(Color::White)),
            Span::styled(
                value.to_string(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
        ]
    };

    let mut kpi_spans = vec![];
    kpi_spans.extend(kpi("Patients", counts.patients, Color::Cyan));
    kpi_spans.extend(kpi("Encounters", counts.encounters, Color::Cyan));
    kpi_spans.extend(kpi("Claims", counts.claims, Color::Green));
    kpi_spans.extend(kpi("Payers", counts.payers, Color::Magenta));

    let header = Paragraph::new(vec![Line::from(tab_spans), Line::from(kpi_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let mut status_spans = vec![
        Span::styled(
            format!(" {} ", app.current_page.title()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
    ];

    match app.current_page {
        Page::Patients | Page::Encounters => {
            status_spans.push(key("f"));
            status_spans.push(Span::raw(": filter  "));
        }
        Page::Claims => {
            status_spans.push(key("s"));
            status_spans.push(Span::raw(": status  "));
            status_spans.push(key("p"));
            status_spans.push(Span::raw(": payer  "));
            status_spans.push(key("↑/↓"));
            status_spans.push(Span::raw(": navigate  "));
        }
        Page::Predict => {
            status_spans.push(key("↑/↓"));
            status_spans.push(Span::raw(": field  "));
            status_spans.push(key("←/→"));
            status_spans.push(Span::raw(": choose  "));
            status_spans.push(key("Enter"));
            status_spans.push(Span::raw(": predict  "));
        }
        _ => {}
    }

    status_spans.push(key("Tab"));
    status_spans.push(Span::raw(": page  "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(": quit"));

    let status_bar = Paragraph::new(Line::from(status_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn selector_line(selector: &Selector) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("  {}: ", selector.label),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(selector.current().to_string(), Style::default().fg(Color::Green)),
        Span::styled(
            format!("  ({}/{})", selector.index + 1, selector.options.len()),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn render_bar_chart(
    f: &mut Frame,
    area: Rect,
    title: &str,
    histogram: &[CategoryCount],
    color: Color,
) {
    let labels: Vec<String> = histogram.iter().map(|c| truncate(&c.category, 18)).collect();
    let data: Vec<(&str, u64)> = labels
        .iter()
        .zip(histogram)
        .map(|(label, c)| (label.as_str(), c.count as u64))
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" {} ", title)),
        )
        .direction(Direction::Horizontal)
        .data(data.as_slice())
        .bar_width(1)
        .bar_gap(0)
        .bar_style(Style::default().fg(color))
        .value_style(Style::default().fg(Color::Black).bg(color));

    f.render_widget(chart, area);
}

fn split_with_selectors(area: Rect, selectors: u16) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(selectors + 2), Constraint::Min(0)])
        .split(area);
    (chunks[0], chunks[1])
}

fn render_selectors(f: &mut Frame, area: Rect, selectors: &[&Selector]) {
    let lines: Vec<Line> = selectors.iter().map(|s| selector_line(s)).collect();
    let block = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Filters "),
    );
    f.render_widget(block, area);
}

fn render_overview(f: &mut Frame, area: Rect, app: &App) {
    let quality = app.snapshot.quality();
    let label = |text: &str| {
        Span::styled(
            format!("  {}", text),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            label("Snapshot: "),
            Span::styled(app.snapshot.snapshot_id.clone(), Style::default().fg(Color::Green)),
        ]),
        Line::from(vec![
            label("Loaded at: "),
            Span::raw(app.snapshot.loaded_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ]),
        Line::from(""),
    ];

    match &app.exposure {
        Some(report) => {
            lines.push(Line::from(vec![
                label("Financial exposure: "),
                Span::styled(
                    format!("{:.2}", report.total),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!(
                    "  ({} → {}, {} days)",
                    report.window.start,
                    report.window.end,
                    report.daily.len()
                )),
            ]));
            if report.excluded_rows > 0 {
                lines.push(Line::from(Span::styled(
                    format!(
                        "  {} transactions without a service date excluded",
                        report.excluded_rows
                    ),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }
        }
        None => lines.push(Line::from(vec![
            label("Financial exposure: "),
            Span::styled("no dated transactions", Style::default().fg(Color::DarkGray)),
        ])),
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![label("Data quality: "), Span::raw(quality.summary())]));
    lines.push(Line::from(""));

    for issue in &quality.issues {
        let color = match issue.severity {
            Severity::Critical => Color::Red,
            Severity::Warning => Color::Yellow,
            Severity::Info => Color::DarkGray,
        };
        lines.push(Line::from(vec![
            Span::styled(format!("  {:?} ", issue.severity), Style::default().fg(color)),
            Span::styled(
                format!("{}.{}: ", issue.table, issue.field),
                Style::default().fg(Color::White),
            ),
            Span::raw(issue.issue.clone()),
        ]));
    }

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Overview "),
    );
    f.render_widget(paragraph, area);
}

fn render_patients(f: &mut Frame, area: Rect, app: &App) {
    let (top, body) = split_with_selectors(area, 1);
    render_selectors(f, top, &[&app.gender]);

    let header = Row::new(["Gender", "Birth Date", "Patients"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().bg(Color::DarkGray));

    let rows = app.patient_groups.iter().map(|g| {
        Row::new(vec![
            Cell::from(g.gender.clone()),
            Cell::from(g.birth_date.clone()),
            Cell::from(g.count.to_string()).style(Style::default().fg(Color::Green)),
        ])
    });

    let table = Table::new(
        rows,
        [Constraint::Length(10), Constraint::Length(14), Constraint::Length(10)],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Patients by Gender & Birth Date "),
    );

    f.render_widget(table, body);
}

fn render_encounters(f: &mut Frame, area: Rect, app: &App) {
    let (top, body) = split_with_selectors(area, 1);
    render_selectors(f, top, &[&app.encounter_class]);
    render_bar_chart(f, body, "Encounters by Class", &app.class_histogram, Color::Cyan);
}

fn render_claims(f: &mut Frame, area: Rect, app: &mut App) {
    let (top, body) = split_with_selectors(area, 2);
    render_selectors(f, top, &[&app.status, &app.payer]);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(body);

    render_bar_chart(f, chunks[0], "Claims by Status", &app.claims.histogram, Color::Green);

    let header = Row::new(["Claim", "Status", "Payer", "Outstanding", "Denied"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = app.claims.preview.iter().map(|c| {
        let color = if c.denied { Color::Red } else { Color::Green };
        let outstanding = c
            .outstanding_balance
            .map(|b| format!("{:.2}", b))
            .unwrap_or_else(|| "-".to_string());

        Row::new(vec![
            Cell::from(truncate(&c.id, 14)),
            Cell::from(c.status.clone()),
            Cell::from(truncate(&c.payer, 14)),
            Cell::from(outstanding),
            Cell::from(if c.denied { "yes" } else { "no" }).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let title = format!(
        " Claims ({} of {} shown) ",
        app.claims.preview.len(),
        app.claims.matched
    );

    let table = Table::new(
        rows,
        [
            Constraint::Length(16),
            Constraint::Length(10),
            Constraint::Length(16),
            Constraint::Length(12),
            Constraint::Length(7),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[1], &mut app.claims_state);
}

fn render_denial_reasons(f: &mut Frame, area: Rect, app: &App) {
    if app.denial_reasons.is_empty() {
        let empty = Paragraph::new("\n  No claims carry a denial reason").block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Denial Reasons "),
        );
        f.render_widget(empty, area);
        return;
    }
    render_bar_chart(f, area, "Denial Reasons", &app.denial_reasons, Color::Red);
}

fn render_payers(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    render_bar_chart(f, chunks[0], "Claims by Payer", &app.payer_histogram, Color::Magenta);

    let header = Row::new(["Payer", "Claims", "Denied", "Rate"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().bg(Color::DarkGray));

    let threshold = app.estimator.settings.baseline_threshold;
    let rows = app.payer_rates.iter().map(|r| {
        let color = if r.rate > threshold { Color::Red } else { Color::Green };
        Row::new(vec![
            Cell::from(truncate(&r.payer, 20)),
            Cell::from(r.claims.to_string()),
            Cell::from(r.denied.to_string()),
            Cell::from(format!("{:.1}%", r.rate)).style(Style::default().fg(color)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(22),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Denial Rate by Payer "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[1], &mut app.payers_state);
}

fn render_predict(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let form = &app.form;
    let field_line = |field: FormField, label: &str, value: String| {
        let active = form.field == field;
        let marker = if active { "→ " } else { "  " };
        let hint = if active && !field.is_text() { "  ◀ ▶" } else { "" };
        let value_style = if active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };

        Line::from(vec![
            Span::styled(marker.to_string(), Style::default().fg(Color::Green)),
            Span::styled(
                format!("{:<16}", label),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(value, value_style),
            Span::styled(hint.to_string(), Style::default().fg(Color::DarkGray)),
        ])
    };

    let lines = vec![
        Line::from(""),
        field_line(FormField::Patient, "Patient", form.patient.current().to_string()),
        field_line(FormField::Payer, "Payer", form.payer.current().to_string()),
        field_line(
            FormField::EncounterClass,
            "Encounter Class",
            form.encounter_class.current().to_string(),
        ),
        field_line(FormField::Cost, "Cost", form.cost.clone()),
        field_line(FormField::Age, "Age", form.age.clone()),
        Line::from(""),
        Line::from(Span::styled(
            "  Press Enter to predict",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    let form_panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Hypothetical Claim "),
    );
    f.render_widget(form_panel, chunks[0]);

    let mut result_lines = vec![Line::from("")];

    if let Some(error) = &form.error {
        result_lines.push(Line::from(Span::styled(
            format!("  ❌ {}", error),
            Style::default().fg(Color::Red),
        )));
    } else if let Some(estimate) = &form.result {
        let color = if estimate.prediction.is_denied() {
            Color::Red
        } else {
            Color::Green
        };

        result_lines.push(Line::from(vec![
            Span::styled(
                "  Prediction: ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                estimate.prediction.label(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
        ]));
        result_lines.push(Line::from(format!(
            "  Denial rate: {:.1}% over {} claims",
            estimate.rate, estimate.claims_considered
        )));
        result_lines.push(Line::from(format!("  Threshold:   {:.1}%", estimate.threshold)));
        for adjustment in &estimate.adjustments {
            result_lines.push(Line::from(Span::styled(
                format!("    {}", adjustment.describe()),
                Style::default().fg(Color::DarkGray),
            )));
        }

        if estimate.prediction.is_denied() {
            result_lines.push(Line::from(""));
            result_lines.push(Line::from(Span::styled(
                "  SUGGESTIONS",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )));
            if let Some(lower) = app.payer_rates.iter().find(|r| r.rate < estimate.rate) {
                result_lines.push(Line::from(format!(
                    "  Consider payer {} ({:.1}% denial rate)",
                    lower.payer, lower.rate
                )));
            }
            for reason in top_denial_reasons(app.snapshot.claims(), 3) {
                result_lines.push(Line::from(format!(
                    "  Watch for: {} ({} claims)",
                    reason.category, reason.count
                )));
            }
        }

        result_lines.push(Line::from(""));
        result_lines.push(Line::from(Span::styled(
            "  Encounter class is recorded but does not affect the estimate",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    } else {
        result_lines.push(Line::from(Span::styled(
            "  No prediction yet",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let result_panel = Paragraph::new(result_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Denial Estimate "),
    );
    f.render_widget(result_panel, chunks[1]);
}
