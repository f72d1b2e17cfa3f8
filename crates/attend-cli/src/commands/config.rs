use std::path::{Path, PathBuf};

use attend_core::config::{default_config_path, KioskConfig};

use crate::cli::ConfigCommands;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { force } => {
            let path = resolve_config_path(path)?;
            run_config_init(&path, force)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = KioskConfig::load(path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

pub fn resolve_config_path(path: Option<&Path>) -> Result<PathBuf, CliError> {
    path.map(Path::to_path_buf)
        .or_else(default_config_path)
        .ok_or_else(|| {
            CliError::Config("No config directory on this platform; pass --config".to_string())
        })
}

/// Write the default configuration, refusing to replace an existing file
/// unless `force` is set.
pub fn run_config_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists; use --force to overwrite",
            path.display()
        )));
    }

    KioskConfig::default().save_to_path(path)?;
    Ok(())
}
