use crate::utils::file_store::FilePageStore;
use crate::utils::settings::{read_page, Settings};
use anyhow::{anyhow, Result};
use authz::{expand_principal_names, Action};
use colored::*;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Check whether the given principals may perform an action on a page
pub fn execute(
    settings: &Settings,
    file: &Path,
    action: &str,
    names: Vec<String>,
    subject: Option<&str>,
) -> Result<()> {
    let action: Action = action.parse()?;
    let names = principal_names(settings, names, subject)?;

    let page = read_page(file)?;
    let manager = settings.manager(Arc::new(FilePageStore::new(file)))?;
    let granted = manager.check_permission(&page, &names, action);

    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort();
    let joined = sorted
        .iter()
        .map(|name| name.as_str())
        .collect::<Vec<_>>()
        .join(",");

    if granted {
        println!("{} {} on {} for {}", "ALLOW".green().bold(), action, page.name, joined);
    } else {
        println!("{} {} on {} for {}", "DENY".red().bold(), action, page.name, joined);
    }

    Ok(())
}

/// The explicit names plus the subject and its groups, when a subject is given
fn principal_names(
    settings: &Settings,
    names: Vec<String>,
    subject: Option<&str>,
) -> Result<HashSet<String>> {
    let mut all: HashSet<String> = names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    if let Some(subject) = subject {
        match &settings.directory {
            Some(directory) => all.extend(expand_principal_names(subject, directory)),
            None => {
                all.insert(subject.to_string());
            }
        }
    }

    if all.is_empty() {
        return Err(anyhow!("Provide --names or --subject"));
    }
    Ok(all)
}
