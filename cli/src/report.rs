use tabled::settings::object::Rows;
use tabled::settings::{Color, Modify, Style};
use tabled::{Table, Tabled};
use tissue_core::model::report::{DaySheet, MonthlyReport, UsageIntensity};
use tissue_core::time::month_name;

#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportView {
    Daily,
    Weekly,
    #[default]
    Monthly,
}

#[derive(Tabled)]
struct DayRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Rolls")]
    total: u64,
    #[tabled(rename = "Usage")]
    intensity: String,
}

#[derive(Tabled)]
struct WeekRow {
    #[tabled(rename = "Week")]
    name: String,
    #[tabled(rename = "Days")]
    days: String,
    #[tabled(rename = "Rolls")]
    total: u64,
}

#[derive(Tabled)]
struct TotalRow {
    #[tabled(rename = "Group")]
    label: String,
    #[tabled(rename = "Rolls")]
    total: u64,
}

#[derive(Tabled)]
struct SheetRow {
    #[tabled(rename = "Floor")]
    floor: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Rolls")]
    value: u32,
}

fn intensity_label(intensity: UsageIntensity) -> &'static str {
    match intensity {
        UsageIntensity::None => "-",
        UsageIntensity::Low => "low",
        UsageIntensity::Medium => "medium",
        UsageIntensity::High => "high",
    }
}

fn render<T: Tabled>(rows: Vec<T>) -> String {
    let mut table = Table::new(rows);
    table
        .with(Style::modern())
        .with(Modify::new(Rows::first()).with(Color::FG_CYAN));
    table.to_string()
}

fn day_rows(report: &MonthlyReport) -> Vec<DayRow> {
    report
        .days
        .iter()
        .map(|day| DayRow {
            date: day.date.format("%Y-%m-%d (%a)").to_string(),
            total: day.total,
            intensity: intensity_label(day.intensity()).to_string(),
        })
        .collect()
}

fn week_rows(report: &MonthlyReport) -> Vec<WeekRow> {
    report
        .weeks
        .iter()
        .map(|week| WeekRow {
            name: week.name.clone(),
            days: if week.day_count() == 0 {
                "-".to_string()
            } else {
                format!("{}-{}", week.first_day, week.last_day)
            },
            total: week.total,
        })
        .collect()
}

fn summary_rows(report: &MonthlyReport) -> Vec<TotalRow> {
    let floors = report.floors.iter().map(|f| TotalRow {
        label: format!("Floor {}", f.floor),
        total: f.total,
    });
    let types = report.types.iter().map(|t| TotalRow {
        label: t.kind.label().to_string(),
        total: t.total,
    });
    floors.chain(types).collect()
}

fn sheet_rows(sheet: &DaySheet) -> Vec<SheetRow> {
    let mut rows = Vec::new();
    for floor in &sheet.floors {
        for (i, entry) in floor.entries.iter().enumerate() {
            rows.push(SheetRow {
                // Floor only on the first row of its group
                floor: if i == 0 { floor.floor.clone() } else { String::new() },
                kind: entry.kind.label().to_string(),
                value: entry.value,
            });
        }
    }
    rows
}

pub fn report_heading(report: &MonthlyReport) -> String {
    format!(
        "\x1b[1;36m{} {}\x1b[0m (Total: {} rolls, {} active days)",
        month_name(report.month),
        report.year,
        report.total,
        report.active_days
    )
}

pub fn show_report(report: &MonthlyReport, view: ReportView) {
    println!("{}", report_heading(report));
    if report.total == 0 {
        println!("No usage recorded for this month.");
        return;
    }
    let table = match view {
        ReportView::Daily => render(day_rows(report)),
        ReportView::Weekly => render(week_rows(report)),
        ReportView::Monthly => render(summary_rows(report)),
    };
    println!("{}", table);
}

pub fn show_day_sheet(sheet: &DaySheet) {
    println!(
        "\x1b[1;36m{}\x1b[0m (Total: {} rolls)",
        sheet.date.format("%Y-%m-%d (%a)"),
        sheet.total()
    );
    println!("{}", render(sheet_rows(sheet)));
}
