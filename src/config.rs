use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::record::ROUTE;
use crate::resolver::ResolverOptions;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AtlasKbConfig {
    /// Dataset document (YAML or JSON)
    pub dataset: Option<String>,
    /// Extra display-only attributes excluded from reference scanning
    pub display_attributes: Option<Vec<String>>,
    pub subtechnique_separator: Option<char>,
}

impl AtlasKbConfig {
    /// Resolver options with unset fields left at their defaults
    pub fn resolver_options(&self) -> ResolverOptions {
        let mut options = ResolverOptions::default();
        if let Some(attributes) = &self.display_attributes {
            options.display_attributes = attributes.clone();
            if !options.display_attributes.iter().any(|a| a == ROUTE) {
                options.display_attributes.push(ROUTE.to_string());
            }
        }
        if let Some(separator) = self.subtechnique_separator {
            options.subtechnique_separator = separator;
        }
        options
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("atlas-kb.toml")
}

pub fn default_dataset_path() -> PathBuf {
    PathBuf::from("ATLAS.yaml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<AtlasKbConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: AtlasKbConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &AtlasKbConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}
