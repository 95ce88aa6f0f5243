//! Maps INI keys onto [`ConfigFile`] fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::{ConfigFile, ConfigFileError};
use super::size::parse_size;

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn get_parsed<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    props
        .get(key)
        .map(|v| v.trim().parse().map_err(|_| invalid(section, key, v, reason)))
        .transpose()
}

fn get_size(props: &Properties, section: &str, key: &str) -> Result<Option<u64>, ConfigFileError> {
    props
        .get(key)
        .map(|v| {
            parse_size(v).map_err(|_| {
                invalid(section, key, v, "expected format like '256MB', '2GB' or '1024KB'")
            })
        })
        .transpose()
}

fn get_bool(props: &Properties, section: &str, key: &str) -> Result<Option<bool>, ConfigFileError> {
    props
        .get(key)
        .map(|v| match v.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(invalid(section, key, v, "must be true or false")),
        })
        .transpose()
}

/// Expands a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Overlays the values found in `ini` on top of the defaults.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("provider")) {
        if let Some(v) = section.get("name") {
            let v = v.trim();
            if v.is_empty() {
                return Err(invalid("provider", "name", v, "must not be empty"));
            }
            config.provider.name = v.to_lowercase();
        }
        if let Some(v) = get_bool(section, "provider", "google_discover")? {
            config.provider.google_discover = v;
        }
    }

    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            config.cache.directory = (!v.is_empty()).then(|| expand_tilde(v));
        }
        if let Some(v) = get_size(section, "cache", "memory_size")? {
            config.cache.memory_size = v;
        }
    }

    if let Some(section) = ini.section(Some("mosaic")) {
        if let Some(v) = get_bool(section, "mosaic", "parallel")? {
            config.mosaic.parallel = v;
        }
        if let Some(v) = get_parsed::<usize>(section, "mosaic", "concurrency", "must be a positive integer")? {
            if v == 0 {
                return Err(invalid("mosaic", "concurrency", "0", "must be a positive integer"));
            }
            config.mosaic.concurrency = v;
        }
        if let Some(v) = get_parsed::<usize>(section, "mosaic", "batch_size", "must be a non-negative integer")? {
            // 0 disables batching
            config.mosaic.batch_size = (v > 0).then_some(v);
        }
        if let Some(v) = get_parsed::<u64>(section, "mosaic", "max_tiles", "must be a positive integer")? {
            if v == 0 {
                return Err(invalid("mosaic", "max_tiles", "0", "must be a positive integer"));
            }
            config.mosaic.max_tiles = v;
        }
        if let Some(v) = get_size(section, "mosaic", "rough_cache_size")? {
            config.mosaic.rough_cache_size = v;
        }
    }

    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = get_parsed::<u64>(section, "download", "timeout", "must be a positive integer (seconds)")? {
            config.download.timeout = v;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_file() {
        let config = ConfigFile::parse(
            r#"
[provider]
name = Google_Satellite
google_discover = yes

[cache]
directory = /var/cache/tiles.tar
memory_size = 64MB

[mosaic]
parallel = false
concurrency = 8
batch_size = 32
max_tiles = 10000
rough_cache_size = 1GB

[download]
timeout = 10
"#,
        )
        .unwrap();

        assert_eq!(config.provider.name, "google_satellite");
        assert!(config.provider.google_discover);
        assert_eq!(config.cache.directory, Some(PathBuf::from("/var/cache/tiles.tar")));
        assert_eq!(config.cache.memory_size, 64 << 20);
        assert!(!config.mosaic.parallel);
        assert_eq!(config.mosaic.concurrency, 8);
        assert_eq!(config.mosaic.batch_size, Some(32));
        assert_eq!(config.mosaic.max_tiles, 10_000);
        assert_eq!(config.mosaic.rough_cache_size, 1 << 30);
        assert_eq!(config.download.timeout, 10);
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(ConfigFile::parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_invalid_memory_size() {
        let err = ConfigFile::parse("[cache]\nmemory_size = 2TB\n").unwrap_err();
        assert!(err.to_string().contains("cache.memory_size = '2TB'"));
    }

    #[test]
    fn test_invalid_bool() {
        let err = ConfigFile::parse("[mosaic]\nparallel = maybe\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { ref key, .. } if key == "parallel"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(ConfigFile::parse("[mosaic]\nconcurrency = 0\n").is_err());
    }

    #[test]
    fn test_zero_max_tiles_rejected() {
        let err = ConfigFile::parse("[mosaic]\nmax_tiles = 0\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { ref key, .. } if key == "max_tiles"));
    }

    #[test]
    fn test_zero_batch_size_disables_batching() {
        let config = ConfigFile::parse("[mosaic]\nbatch_size = 0\n").unwrap();
        assert_eq!(config.mosaic.batch_size, None);
    }

    #[test]
    fn test_empty_directory_means_temporary() {
        let config = ConfigFile::parse("[cache]\ndirectory =\n").unwrap();
        assert_eq!(config.cache.directory, None);
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/tiles"), home.join("tiles"));
        }
    }
}
