use astre::api::TrajectoryReport;
use astre::error::AstreResult;
use astre::scorer::Characteristics;
use astre::stats::LinkStats;
use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use std::path::Path;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn align_right(table: &mut Table, columns: std::ops::RangeInclusive<usize>) {
    for i in columns {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
}

fn header(text: &str) -> Cell {
    Cell::new(text).fg(Color::Cyan).add_attribute(Attribute::Bold)
}

fn percent(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{:.2}%", v * 100.0))
}

pub fn print_trajectory_table(trajectories: &[TrajectoryReport]) {
    if trajectories.is_empty() {
        println!("\nNo trajectory found.");
        return;
    }

    let mut table = new_table();
    table.add_row(vec![
        header("Id"),
        header("Start"),
        header("Len"),
        header("Size"),
        header("Runs"),
        header("Delta"),
        header("lNFA"),
        header("Descriptor"),
    ]);
    align_right(&mut table, 0..=6);

    for t in trajectories {
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(t.start),
            Cell::new(t.length),
            Cell::new(t.size),
            Cell::new(t.runs),
            Cell::new(format!("{:.4}", t.delta)),
            Cell::new(format!("{:.2}", t.log_nfa)).fg(Color::Green),
            Cell::new(&t.descriptor),
        ]);
    }
    println!("\n{}", table);
}

pub fn print_characteristics(descriptor: &str, c: &Characteristics) {
    let mut table = new_table();
    table.add_row(vec![
        header("Trajectory"),
        header("Start"),
        header("Len"),
        header("Size"),
        header("Runs"),
        header("Delta"),
        header("lNFA"),
    ]);
    align_right(&mut table, 1..=6);
    table.add_row(vec![
        Cell::new(descriptor).add_attribute(Attribute::Bold),
        Cell::new(c.start),
        Cell::new(c.len),
        Cell::new(c.size),
        Cell::new(c.runs),
        Cell::new(format!("{:.4}", c.delta)),
        Cell::new(format!("{:.3}", c.log_nfa)).fg(Color::Green),
    ]);
    println!("\n{}", table);
}

pub fn print_link_stats(s: &LinkStats) {
    let mut table = new_table();
    table.add_row(vec![
        header("Trajectories"),
        header("Real links"),
        header("Found links"),
        header("Correct"),
        header("Recall"),
        header("Precision"),
    ]);
    align_right(&mut table, 0..=5);
    table.add_row(vec![
        Cell::new(format!("{} / {}", s.found_trajectories, s.real_trajectories)),
        Cell::new(s.real_links),
        Cell::new(s.found_links),
        Cell::new(s.correct_links),
        Cell::new(percent(s.recall)).fg(Color::Green),
        Cell::new(percent(s.precision)).fg(Color::Green),
    ]);
    println!("\n{}", table);
}

pub fn write_summary_csv(path: &Path, trajectories: &[TrajectoryReport]) -> AstreResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for t in trajectories {
        wtr.serialize(t)?;
    }
    wtr.flush()?;
    Ok(())
}
