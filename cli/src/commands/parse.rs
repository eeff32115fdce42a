use crate::utils::file_store::FilePageStore;
use crate::utils::settings::{read_page, Settings};
use anyhow::Result;
use authz::{print, MalformedAcl, ParsedAcl};
use colored::*;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

/// Parse a page file and print its ACL in canonical form
pub fn execute(settings: &Settings, file: &Path, format: &str) -> Result<()> {
    let page = read_page(file)?;
    let manager = settings.manager(Arc::new(FilePageStore::new(file)))?;
    let parsed = manager.get_permissions(&page);

    match format {
        "json" => {
            let output = json!({
                "page": page.name,
                "dialect": manager.dialect(),
                "canonical": print(parsed.acl()),
                "acl": parsed.acl(),
                "malformed": parsed.malformed,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => print_parsed_text(&page.name, &parsed),
    }

    Ok(())
}

fn print_parsed_text(page: &str, parsed: &ParsedAcl) {
    println!(
        "{} {} ({})",
        "Page ACL:".bold(),
        page.cyan(),
        parsed.acl().dialect()
    );

    if parsed.acl().is_empty() {
        println!("  {}", "No ACL directives".dimmed());
    } else {
        print!("{}", print(parsed.acl()));
    }

    if !parsed.malformed.is_empty() {
        println!();
        println!(
            "{} {}",
            "Malformed directives:".yellow().bold(),
            parsed.malformed.len()
        );
        for malformed in &parsed.malformed {
            print_malformed(malformed);
        }
    }
}

fn print_malformed(malformed: &MalformedAcl) {
    println!(
        "  line {}, column {}: {} ({})",
        malformed.line,
        malformed.column,
        malformed.directive,
        malformed.reason.yellow()
    );
}
