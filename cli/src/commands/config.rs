use crate::utils::settings::Settings;
use anyhow::Result;

/// Print the effective engine configuration
pub fn show(settings: &Settings, format: &str) -> Result<()> {
    if let Some(source) = &settings.config_source {
        tracing::debug!("Configuration loaded from {:?}", source);
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&settings.config)?);
        }
        _ => {
            print!("{}", settings.config.to_yaml()?);
        }
    }

    Ok(())
}
