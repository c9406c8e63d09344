use chrono::SecondsFormat;
use funclogs_core::filter::Severity;
use funclogs_core::model::log::LogEntry;
use funclogs_core::query::{StatusResponse, StoredLog};
use owo_colors::OwoColorize;

pub fn print_entries_human(entries: &[LogEntry]) {
    for entry in entries {
        println!("{}", entry_line(entry));
    }
    println!("-- {} entries --", entries.len());
}

pub fn print_stored_human(stored: &StoredLog) {
    println!("id={}", stored.id);
    println!("{}", entry_line(&stored.entry));
    let labels = stored
        .entry
        .resource
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!("resource: {labels}");
}

pub fn print_status_human(v: &StatusResponse) {
    println!("db_path={}", v.db_path);
    println!("db_size_bytes={}", v.db_size_bytes);
    println!("entries={}", v.entries_count);
    if let Some(oldest) = v.oldest_ts {
        println!(
            "oldest={}",
            oldest.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
    }
    if let Some(newest) = v.newest_ts {
        println!(
            "newest={}",
            newest.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
    }
}

fn entry_line(entry: &LogEntry) -> String {
    let service = entry
        .resource
        .get("function_name")
        .or_else(|| entry.resource.get("service_name"))
        .map(String::as_str)
        .unwrap_or("-");
    format!(
        "{} {} {} | {}",
        entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        service.cyan(),
        severity_label(entry.severity),
        entry.text_payload.as_deref().unwrap_or("")
    )
}

fn severity_label(severity: Severity) -> String {
    let label = severity.as_str();
    match severity {
        Severity::Default => label.bright_black().to_string(),
        Severity::Debug => label.blue().to_string(),
        Severity::Info | Severity::Notice => label.green().to_string(),
        Severity::Warning => label.yellow().to_string(),
        Severity::Error => label.red().to_string(),
        Severity::Critical | Severity::Alert | Severity::Emergency => label.magenta().to_string(),
    }
}
