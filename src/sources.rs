//! Terminal rendering of catalog contents for the `dock` CLI.

use crate::models::{SchemaSnapshot, Source, WarningLevel};

/// Print the source list as a fixed-width table.
pub fn print_sources(sources: &[Source]) {
    if sources.is_empty() {
        println!("No sources registered. Add one with `dock add`.");
        return;
    }

    println!(
        "{:<38} {:<10} {:<24} {:<12} {:<12}",
        "ID", "KIND", "NAME", "CONNECTION", "CRAWL"
    );
    for source in sources {
        println!(
            "{:<38} {:<10} {:<24} {:<12} {:<12}",
            source.id,
            source.kind().as_str(),
            truncate(&source.name, 24),
            source.connection_status.ui_label(),
            source.crawl_status.ui_label(),
        );
    }
}

/// Print one source in full, including its snapshot if one exists.
pub fn print_source_detail(source: &Source, snapshot: Option<&SchemaSnapshot>) {
    println!("id:          {}", source.id);
    println!("name:        {}", source.name);
    if let Some(desc) = &source.description {
        println!("description: {}", desc);
    }
    println!("kind:        {}", source.kind());
    println!("location:    {}", source.connection.location());
    if !source.owners.is_empty() {
        println!("owners:      {}", source.owners.join(", "));
    }
    if !source.tags.is_empty() {
        println!("tags:        {}", source.tags.join(", "));
    }
    println!("connection:  {}", source.connection_status.ui_label());
    println!("crawl:       {}", source.crawl_status.ui_label());
    if let Some(at) = source.last_connected_at {
        println!("last online: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(at) = source.last_crawl_at {
        println!("last crawl:  {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(err) = &source.last_error {
        println!(
            "last error:  [{}] {} ({})",
            err.operation,
            err.message,
            err.occurred_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    let Some(snapshot) = snapshot else {
        return;
    };

    println!();
    println!(
        "schema: {} tables (crawled {})",
        snapshot.schema.tables.len(),
        snapshot.crawled_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for table in &snapshot.schema.tables {
        let rows = snapshot
            .profile
            .tables
            .iter()
            .find(|t| t.table == table.name)
            .map(|t| t.row_count);
        match rows {
            Some(n) => println!("  {} ({} columns, {} rows)", table.name, table.columns.len(), n),
            None => println!("  {} ({} columns)", table.name, table.columns.len()),
        }
        for column in &table.columns {
            let ty = if column.data_type.is_empty() {
                "?"
            } else {
                &column.data_type
            };
            let null = if column.nullable { "" } else { " not null" };
            println!("    {} {}{}", column.name, ty, null);
        }
    }

    if !snapshot.warnings.is_empty() {
        println!();
        println!("warnings:");
        for w in &snapshot.warnings {
            let level = match w.level {
                WarningLevel::Info => "info",
                WarningLevel::Warning => "warn",
                WarningLevel::Error => "error",
            };
            println!("  [{}] {}: {}", level, w.feature, w.message);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
