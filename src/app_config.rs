use std::path::Path;

use ini::Ini;

use crate::config::{DEFAULT_REGION, DEFAULT_STORAGE_CLASS};
use crate::dataset_config::DatasetConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: ini::Error,
    },
    #[error("section {section} is missing required option {option}")]
    MissingOption { section: String, option: String },
    #[error("section {section} option {option} is not a valid integer: {value}")]
    InvalidInteger {
        section: String,
        option: String,
        value: String,
    },
}

/// Reads one value, falling back to the `DEFAULT` section if the dataset's
/// own section doesn't set it — mirrors `configparser.ConfigParser`'s
/// fallback behavior.
fn get(ini: &Ini, section: &str, default: &ini::Properties, key: &str) -> Option<String> {
    ini.section(Some(section))
        .and_then(|props| props.get(key))
        .or_else(|| default.get(key))
        .map(str::to_string)
}

fn get_required(
    ini: &Ini,
    section: &str,
    default: &ini::Properties,
    key: &str,
) -> Result<String, ConfigError> {
    get(ini, section, default, key).ok_or_else(|| ConfigError::MissingOption {
        section: section.to_string(),
        option: key.to_string(),
    })
}

fn get_usize(
    section: &str,
    default: &ini::Properties,
    ini: &Ini,
    key: &str,
) -> Result<Option<usize>, ConfigError> {
    match get(ini, section, default, key) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidInteger {
                section: section.to_string(),
                option: key.to_string(),
                value,
            }),
    }
}

/// Loads every non-`DEFAULT` section of the INI file at `path` as a
/// [`DatasetConfig`], one per managed dataset.
pub fn load_dataset_configs(path: impl AsRef<Path>) -> Result<Vec<DatasetConfig>, ConfigError> {
    let path = path.as_ref();
    let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let empty = ini::Properties::new();
    let default = ini.section(None::<String>).unwrap_or(&empty);

    let mut configs = Vec::new();
    for (section, _) in ini.iter() {
        let Some(section) = section else { continue };
        let region = get(&ini, section, default, "region").unwrap_or_else(|| DEFAULT_REGION.to_string());
        let storage_class =
            get(&ini, section, default, "storage_class").unwrap_or_else(|| DEFAULT_STORAGE_CLASS.to_string());
        configs.push(DatasetConfig {
            filesystem: section.to_string(),
            bucket_name: get_required(&ini, section, default, "bucket_name")?,
            access_key: get_required(&ini, section, default, "access_key")?,
            secret_key: get_required(&ini, section, default, "secret_key")?,
            region,
            endpoint: get(&ini, section, default, "endpoint"),
            prefix: get(&ini, section, default, "prefix"),
            cron: get(&ini, section, default, "cron"),
            max_snapshots: get_usize(section, default, &ini, "max_snapshots")?,
            max_backups: get_usize(section, default, &ini, "max_backups")?,
            max_incremental_backups_per_full: get_usize(
                section,
                default,
                &ini,
                "max_incremental_backups_per_full",
            )?,
            storage_class,
        });
    }
    Ok(configs)
}
