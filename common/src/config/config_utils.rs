use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;

/// Looks in the following places for the config file
/// - current directory
/// - user's home directory
/// - /etc/
/// If the file isn't found, returns the list of files checked
pub fn find_config_file(config_file_name: &str) -> Result<PathBuf, Vec<PathBuf>> {
    // start with the current directory
    let config_file_path = PathBuf::from(config_file_name);

    if config_file_path.exists() {
        return Ok(config_file_path)
    }

    let mut checked_paths = vec![config_file_path];

    // next try the user's directory
    if let Some(user_dir) = std::env::var_os("HOME").map(PathBuf::from) {
        let config_file_path = user_dir.join(config_file_name);

        if config_file_path.exists() {
            return Ok(config_file_path)
        }

        checked_paths.push(config_file_path);
    }

    // finally look for it in /etc
    let config_file_path = PathBuf::from("/etc/").join(config_file_name);

    if config_file_path.exists() {
        Ok(config_file_path)
    } else {
        checked_paths.push(config_file_path);
        Err(checked_paths)
    }
}

/// Parse the config file
pub fn parse_config_file<T: DeserializeOwned>(config_file_path: PathBuf) -> anyhow::Result<T> {
    let mut file = BufReader::new(File::open(&config_file_path)
        .with_context(|| format!("Error opening config file: {}", config_file_path.display()))?
    );
    let mut toml_str = String::new();

    // read the whole thing into a string
    file.read_to_string(&mut toml_str)
        .with_context(|| format!("Error reading config file: {}", config_file_path.display()))?;

    toml::from_str(toml_str.as_str())
        .map_err(|e| anyhow!("Failed parsing config file {}: {}", config_file_path.display(), e))
}

#[cfg(test)]
mod config_utils_tests {
    use std::fs;

    use crate::config::{parse_config_file, ConfigFile};

    #[test]
    fn parse_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("object-service.toml");

        fs::write(&path, "cache_ttl_secs = 60\n[ned]\nmax_radius = 1.5\n").unwrap();

        let config: ConfigFile = parse_config_file(path).unwrap();

        assert_eq!(60, config.cache_ttl_secs);
        assert_eq!(1.5, config.ned.max_radius);
    }

    #[test]
    fn bad_files() {
        let dir = tempfile::TempDir::new().unwrap();

        assert!(parse_config_file::<ConfigFile>(dir.path().join("missing.toml")).is_err());

        let path = dir.path().join("bad.toml");
        fs::write(&path, "default_radius = \"wide\"").unwrap();

        let err = parse_config_file::<ConfigFile>(path).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
