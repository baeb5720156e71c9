use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::analyze::{Analysis, ComponentSummary};
use crate::error::BomError;
use crate::models::{Restrictiveness, Warning};

/// Render a colored terminal report of an analysis.
pub fn render(analysis: &Analysis, manifest: &Path, verbose: bool, quiet: bool) -> Result<()> {
    let components = &analysis.components;
    let count = |r: Restrictiveness| components.iter().filter(|c| c.restrictiveness == r).count();
    let conflict_count = analysis.warnings.len();

    if quiet {
        println!(
            "Components: {}  Permissive: {}  Restrictive: {}  Unknown: {}  Conflicts: {}",
            components.len(),
            count(Restrictiveness::Permissive).to_string().green(),
            (count(Restrictiveness::LessRestrictive) + count(Restrictiveness::Restrictive))
                .to_string()
                .yellow(),
            count(Restrictiveness::Unknown).to_string().dimmed(),
            conflict_count.to_string().red(),
        );
        return Ok(());
    }

    println!("\n {} v{}", "bomcheck".bold(), env!("CARGO_PKG_VERSION"));
    println!(" Manifest: {}\n", manifest.display());

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(" │  {:<48} │", format!("Components         : {}", components.len()));
    for (symbol, r) in [
        ("✓".green(), Restrictiveness::Permissive),
        ("⚠".yellow(), Restrictiveness::LessRestrictive),
        ("⚠".yellow(), Restrictiveness::Restrictive),
        ("?".dimmed(), Restrictiveness::Unknown),
    ] {
        println!(
            " │  {:<48} │",
            format!(
                "{}  {:<16}: {:>4}  {}",
                symbol,
                r.to_string(),
                count(r),
                summarize_licenses(components, r)
            )
        );
    }
    println!(
        " │  {:<48} │",
        format!("{}  Conflicts       : {:>4}", "✗".red(), conflict_count)
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    if conflict_count > 0 {
        println!(" {} License conflicts:\n", "[ERROR]".red().bold());
        for warning in &analysis.warnings {
            println!("  {} {}", "✗".red(), warning);
        }
        println!();
    }

    let flagged: Vec<&ComponentSummary> = components
        .iter()
        .filter(|c| c.restrictiveness != Restrictiveness::Permissive)
        .collect();
    if !flagged.is_empty() {
        println!(" {} Components with non-permissive licenses:\n", "[WARN]".yellow().bold());
        println!("{}", component_table(&flagged));
        println!();
    }

    if verbose {
        println!(" {} All components:\n", "[INFO]".cyan().bold());
        let all: Vec<&ComponentSummary> = components.iter().collect();
        println!("{}", component_table(&all));
        println!();
    }

    Ok(())
}

/// Print non-fatal findings to stderr.
pub fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
}

pub fn print_error(error: &BomError) {
    eprintln!("{} {}", "error:".red().bold(), error);
}

fn component_table(components: &[&ComponentSummary]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Root").add_attribute(Attribute::Bold),
            Cell::new("License").add_attribute(Attribute::Bold),
            Cell::new("Restrictiveness").add_attribute(Attribute::Bold),
            Cell::new("Scope").add_attribute(Attribute::Bold),
        ]);

    for c in components {
        let color = match c.restrictiveness {
            Restrictiveness::Permissive => Color::Green,
            Restrictiveness::LessRestrictive => Color::Yellow,
            Restrictiveness::Restrictive => Color::Red,
            Restrictiveness::Unknown => Color::DarkGrey,
        };
        let scope = if c.development { "development" } else { "shipped" };

        table.add_row(vec![
            Cell::new(&c.name),
            Cell::new(&c.root),
            Cell::new(&c.license),
            Cell::new(c.restrictiveness.to_string()).fg(color),
            Cell::new(scope).set_alignment(CellAlignment::Center),
        ]);
    }

    table
}

/// The three most common licenses at `restrictiveness`, e.g. `[MIT (3), Zlib (1)]`.
fn summarize_licenses(components: &[ComponentSummary], restrictiveness: Restrictiveness) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for c in components.iter().filter(|c| c.restrictiveness == restrictiveness) {
        *counts.entry(c.license.as_str()).or_insert(0) += 1;
    }

    let mut pairs: Vec<(&str, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let summary: Vec<String> = pairs
        .iter()
        .take(3)
        .map(|(lic, cnt)| format!("{} ({})", lic, cnt))
        .collect();

    if summary.is_empty() {
        String::new()
    } else {
        format!("[{}]", summary.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str, license: &str, restrictiveness: Restrictiveness) -> ComponentSummary {
        ComponentSummary {
            name: name.to_string(),
            root: name.to_string(),
            license: license.to_string(),
            restrictiveness,
            development: false,
        }
    }

    #[test]
    fn test_summarize_licenses() {
        let components = vec![
            component("a", "MIT", Restrictiveness::Permissive),
            component("b", "Zlib", Restrictiveness::Permissive),
            component("c", "MIT", Restrictiveness::Permissive),
            component("d", "GPL-3.0", Restrictiveness::Restrictive),
        ];
        assert_eq!(
            summarize_licenses(&components, Restrictiveness::Permissive),
            "[MIT (2), Zlib (1)]"
        );
        assert_eq!(summarize_licenses(&components, Restrictiveness::Unknown), "");
    }

    #[test]
    fn test_component_table_has_a_row_per_component() {
        let a = component("zlib", "Zlib", Restrictiveness::Permissive);
        let b = component("tools", "GPL-3.0", Restrictiveness::Restrictive);
        let table = component_table(&[&a, &b]);
        assert_eq!(table.row_iter().count(), 2);
        let text = table.to_string();
        assert!(text.contains("zlib") && text.contains("GPL-3.0"));
    }
}
