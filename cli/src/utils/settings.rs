use anyhow::{anyhow, Context, Result};
use authz::{
    AclConfig, AclManager, Dialect, NullResolver, PageStore, PrincipalResolver, StaticDirectory,
    WikiPage,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default location of the engine configuration, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "./config/config.acl.yaml";

/// Everything a command needs to build an ACL manager
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: AclConfig,
    /// The file the configuration was read from, if any
    pub config_source: Option<PathBuf>,
    pub directory: Option<StaticDirectory>,
}

impl Settings {
    /// Load the configuration and directory, applying command line overrides
    pub fn load(
        config_path: Option<PathBuf>,
        dialect: Option<&str>,
        directory_path: Option<PathBuf>,
    ) -> Result<Self> {
        // Try to load .env file if it exists in current directory
        if let Ok(cwd) = env::current_dir() {
            let env_file = cwd.join(".env");
            if env_file.exists() {
                dotenv::from_path(&env_file).ok();
            }
        }

        let config_source = config_path.or_else(|| {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.is_file().then_some(default)
        });

        let mut config = match &config_source {
            Some(path) => {
                info!("Loading ACL configuration from {:?}", path);
                AclConfig::from_file(path)?
            }
            None => {
                debug!("No ACL configuration file found, using defaults");
                AclConfig::default()
            }
        };

        if let Some(dialect) = dialect {
            config.values.dialect = dialect.parse::<Dialect>()?;
        }

        let directory = directory_path
            .map(|path| load_directory(&path))
            .transpose()?;

        Ok(Self {
            config,
            config_source,
            directory,
        })
    }

    /// The principal resolver: the loaded directory, or one that resolves nobody
    pub fn resolver(&self) -> Arc<dyn PrincipalResolver> {
        match &self.directory {
            Some(directory) => Arc::new(directory.clone()),
            None => Arc::new(NullResolver),
        }
    }

    pub fn manager(&self, store: Arc<dyn PageStore>) -> Result<AclManager> {
        Ok(AclManager::new(self.config.clone(), self.resolver(), store)?)
    }
}

fn load_directory(path: &Path) -> Result<StaticDirectory> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read directory file {:?}", path))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse directory file {:?}", path))
}

/// Read a page source file. The page name is the file stem.
pub fn read_page(path: &Path) -> Result<WikiPage> {
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("Cannot derive a page name from {:?}", path))?;
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read page {:?}", path))?;
    Ok(WikiPage::new(name, 1, text))
}
