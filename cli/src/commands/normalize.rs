use crate::utils::file_store::FilePageStore;
use crate::utils::settings::{read_page, Settings};
use anyhow::Result;
use colored::*;
use std::path::Path;
use std::sync::Arc;

/// Rewrite a page file so that its ACL directives are in canonical form
pub fn execute(settings: &Settings, file: &Path) -> Result<()> {
    let page = read_page(file)?;
    let manager = settings.manager(Arc::new(FilePageStore::new(file)))?;

    let parsed = manager.get_permissions(&page);
    for malformed in &parsed.malformed {
        eprintln!(
            "{} kept malformed directive at line {}: {}",
            "Warning:".yellow().bold(),
            malformed.line,
            malformed.directive
        );
    }

    let saved = manager.set_permissions(&page, parsed.acl().clone())?;
    println!(
        "{} {} ({} bytes)",
        "Normalized".green().bold(),
        file.display(),
        saved.text.len()
    );

    Ok(())
}
