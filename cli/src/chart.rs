use std::{io, time::Duration};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, BorderType, Gauge, Padding, Paragraph},
};
use chrono::Datelike;
use tissue_core::{
    model::report::{MonthlyReport, UsageIntensity},
    service::aggregator,
    time::{month_name, shift_month},
    RecordStore,
};

// --- THEME ---
struct Theme {
    primary: Color,
    muted: Color,
    text: Color,
    low: Color,
    medium: Color,
    high: Color,
}

const THEME: Theme = Theme {
    primary: Color::Cyan,
    muted: Color::DarkGray,
    text: Color::White,
    low: Color::Green,
    medium: Color::Yellow,
    high: Color::Red,
};

fn intensity_color(intensity: UsageIntensity) -> Color {
    match intensity {
        UsageIntensity::None => THEME.muted,
        UsageIntensity::Low => THEME.low,
        UsageIntensity::Medium => THEME.medium,
        UsageIntensity::High => THEME.high,
    }
}

pub struct ChartApp {
    store: RecordStore,
    pub year: i32,
    pub month: u32,
    pub report: MonthlyReport,
}

impl ChartApp {
    pub fn new(store: RecordStore, year: i32, month: u32) -> Result<Self> {
        let report = aggregator::monthly_report(&store, year, month)?;
        Ok(Self {
            store,
            year,
            month,
            report,
        })
    }

    fn shift(&mut self, offset: i32) -> Result<()> {
        let (year, month) = shift_month(self.year, self.month, offset);
        self.report = aggregator::monthly_report(&self.store, year, month)?;
        self.year = year;
        self.month = month;
        Ok(())
    }

    pub fn next_month(&mut self) -> Result<()> {
        self.shift(1)
    }

    pub fn previous_month(&mut self) -> Result<()> {
        self.shift(-1)
    }
}

pub fn run(store: RecordStore, year: i32, month: u32) -> Result<()> {
    let mut app = ChartApp::new(store, year, month)?;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut ChartApp) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Left | KeyCode::Char('h') => app.previous_month()?,
                        KeyCode::Right | KeyCode::Char('l') => app.next_month()?,
                        _ => {}
                    }
                }
            }
        }
    }
}

fn ui(frame: &mut Frame, app: &ChartApp) {
    let size = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Chart + Sidebar
            Constraint::Length(1), // Footer
        ])
        .split(size);

    // --- Header ---
    let header_block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(THEME.muted));

    let header_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(24),
            Constraint::Min(1),
            Constraint::Length(30),
        ])
        .split(main_layout[0]);

    let app_title = Paragraph::new(Span::styled("TISSUE ROLL USAGE", Style::default().fg(THEME.primary).add_modifier(Modifier::BOLD)))
        .block(Block::default().padding(Padding::new(0, 0, 1, 0)));
    frame.render_widget(app_title, header_layout[0]);

    let title = format!(" {} {} ", month_name(app.month), app.year);
    let nav_text = Line::from(vec![
        Span::styled(" < ", Style::default().fg(THEME.text)),
        Span::styled(title, Style::default().fg(THEME.text).add_modifier(Modifier::BOLD)),
        Span::styled(" > ", Style::default().fg(THEME.text)),
    ]);
    let nav = Paragraph::new(nav_text).alignment(Alignment::Right).block(Block::default().padding(Padding::new(0, 0, 1, 0)));
    frame.render_widget(nav, header_layout[2]);

    frame.render_widget(header_block, main_layout[0]);

    // --- Content ---
    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(75),
            Constraint::Length(1),
            Constraint::Percentage(25),
        ])
        .split(main_layout[1]);

    if app.report.total == 0 {
        frame.render_widget(
            Paragraph::new("No usage recorded for this month").alignment(Alignment::Center),
            content_chunks[0],
        );
    } else {
        draw_chart(frame, &app.report, content_chunks[0]);
    }
    draw_info_panel(frame, &app.report, content_chunks[2]);

    // --- Footer ---
    let help = Line::from(vec![
        Span::styled("MONTH: ", Style::default().fg(THEME.muted)),
        Span::styled("←/→ ", Style::default().fg(THEME.text)),
        Span::raw("  "),
        Span::styled("QUIT: ", Style::default().fg(THEME.muted)),
        Span::styled("q", Style::default().fg(THEME.text)),
    ]);
    let footer = Paragraph::new(help).alignment(Alignment::Center).style(Style::default().fg(THEME.muted));
    frame.render_widget(footer, main_layout[2]);
}

/// One bar per day: (day label, total, color).
fn bar_data(report: &MonthlyReport) -> Vec<(String, u64, Color)> {
    report
        .days
        .iter()
        .map(|day| (day.date.day().to_string(), day.total, intensity_color(day.intensity())))
        .collect()
}

fn draw_chart(frame: &mut Frame, report: &MonthlyReport, area: Rect) {
    let data = bar_data(report);
    let bar_items: Vec<Bar> = data.iter().map(|(label, value, color)| {
        Bar::default()
            .label(label.as_str())
            .value(*value)
            .style(Style::default().fg(*color))
            .text_value(if *value > 0 { value.to_string() } else { "".to_string() })
    }).collect();

    let chart_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(THEME.muted))
        .title(" Daily Usage (Rolls) ");

    let chart = BarChart::default()
        .block(chart_block)
        .bar_width(2)
        .bar_gap(1)
        .data(BarGroup::default().bars(&bar_items));

    frame.render_widget(chart, area);
}

fn draw_info_panel(frame: &mut Frame, report: &MonthlyReport, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(10), // Weeks
            Constraint::Min(1),     // Active days
        ])
        .split(area);

    let mut info_text = vec![
        Line::from(vec![Span::styled("Weeks", Style::default().add_modifier(Modifier::BOLD))]),
        Line::from(""),
    ];
    for week in &report.weeks {
        info_text.push(Line::from(vec![
            Span::styled(format!("{}:    ", week.name), Style::default().fg(THEME.muted)),
            Span::styled(week.total.to_string(), Style::default().fg(THEME.text).add_modifier(Modifier::BOLD)),
        ]));
    }
    info_text.push(Line::from(vec![
        Span::styled("Total: ", Style::default().fg(THEME.muted)),
        Span::styled(report.total.to_string(), Style::default().fg(THEME.primary).add_modifier(Modifier::BOLD)),
    ]));

    let info_block = Paragraph::new(info_text)
        .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded).border_style(Style::default().fg(THEME.muted)).title(" Summary "));
    frame.render_widget(info_block, chunks[0]);

    let ratio = active_ratio(report);
    let gauge = Gauge::default()
        .block(Block::default().title(" Active Days ").borders(Borders::ALL).border_type(BorderType::Rounded).border_style(Style::default().fg(THEME.muted)))
        .gauge_style(Style::default().fg(THEME.low))
        .ratio(ratio)
        .label(format!("{}/{}", report.active_days, report.days.len()));

    frame.render_widget(gauge, chunks[1]);
}

fn active_ratio(report: &MonthlyReport) -> f64 {
    if report.days.is_empty() {
        return 0.0;
    }
    (report.active_days as f64 / report.days.len() as f64).min(1.0)
}
