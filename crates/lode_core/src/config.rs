//! Json config files living in the data dir.
//!
//! A missing file is created from `Default` so that users have something to edit.
//! A file that fails to parse is never overwritten, we report it and fall back to defaults for this run.

use cap_std::fs_utf8::Dir;
use miette::{Context, IntoDiagnostic, Result};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

pub fn load_or_create_json<T>(dir: &Dir, file_name: &str) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    if dir
        .try_exists(file_name)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to check if {file_name} exists"))?
    {
        let contents = dir
            .read_to_string(file_name)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {file_name}"))?;
        match serde_json::from_str(&contents) {
            Ok(config) => return Ok(config),
            Err(e) => {
                error!(?e, file_name, "failed to deserialize config, using defaults");
                return Ok(T::default());
            }
        }
    }
    let config = T::default();
    let json = serde_json::to_string_pretty(&config)
        .into_diagnostic()
        .wrap_err("failed to serialize default config")?;
    dir.write(file_name, json)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to write default {file_name}"))?;
    debug!(file_name, "wrote default config to disk");
    Ok(config)
}
