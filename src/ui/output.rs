use crate::record::Record;
use crate::relation::RelationMap;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::SHIELD, text.style(theme().header.clone()));
}

pub fn banner(title: &str, subtitle: &str) {
    if crate::output::is_quiet() {
        return;
    }
    println!();
    println!("  {}", title.style(theme().header.clone()));
    println!("  {}", subtitle.style(theme().dim.clone()));
    println!();
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

pub fn label(text: &str) -> String {
    text.style(theme().label.clone()).to_string()
}

/// One record as `• <id> <name>  <route>`
pub fn record_line(record: &Record) {
    println!(
        "  {} {} {}  {}",
        Icons::DOT,
        record.id().style(theme().id.clone()),
        record.name().unwrap_or(""),
        muted(record.route().unwrap_or(""))
    );
}

/// Every label of a relation map with its records; empty labels are listed as such
pub fn relation_map(map: &RelationMap<'_>) {
    if map.is_empty() {
        println!("  {}", muted("∅ No related records."));
        return;
    }
    for group in map.groups() {
        println!();
        println!("{} ({})", label(&group.label), group.records.len());
        if group.records.is_empty() {
            println!("  {}", muted("none resolved"));
        }
        for record in &group.records {
            record_line(record);
        }
    }
}
