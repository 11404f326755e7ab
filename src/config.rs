//! Settings file
//!
//! Optional defaults read from `<config dir>/ringcat/config.toml`, or from
//! the file named with `--config`. Command-line flags override every value.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("couldn't read settings file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Log store to read when `-i` is not given
    pub input: Option<PathBuf>,

    /// Output format, same names as `-v`
    pub format: Option<String>,

    /// Buffers to read when no `-b` is given
    pub buffers: Option<Vec<String>>,

    /// Rotation threshold used with `-f` when `-r` is absent
    pub rotate_kbytes: Option<u64>,

    pub max_rotated: Option<u32>,

    /// Event tag names for binary buffers
    pub event_tags: Option<PathBuf>,
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("ringcat").join("config.toml"))
    }

    /// Load settings. An explicit path must exist, the default one may not.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        match explicit {
            Some(path) => Self::read(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::parse(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_keys() {
        let settings = Settings::parse(
            r#"
input = "/var/log/store.bin"
format = "brief"
buffers = ["main", "events"]
rotate_kbytes = 64
max_rotated = 9
event_tags = "/etc/event-log-tags"
"#,
        )
        .unwrap();

        assert_eq!(settings.input, Some(PathBuf::from("/var/log/store.bin")));
        assert_eq!(settings.format.as_deref(), Some("brief"));
        assert_eq!(
            settings.buffers,
            Some(vec!["main".to_string(), "events".to_string()])
        );
        assert_eq!(settings.rotate_kbytes, Some(64));
        assert_eq!(settings.max_rotated, Some(9));
        assert_eq!(settings.event_tags, Some(PathBuf::from("/etc/event-log-tags")));
    }

    #[test]
    fn test_empty_and_unknown_keys() {
        assert_eq!(Settings::parse("").unwrap(), Settings::default());
        assert!(Settings::parse("colour = true").is_err());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Settings::load(Some(missing.as_path())),
            Err(SettingsError::Read { .. })
        ));

        let present = dir.path().join("config.toml");
        fs::write(&present, "max_rotated = 2\n").unwrap();
        assert_eq!(Settings::load(Some(present.as_path())).unwrap().max_rotated, Some(2));

        fs::write(&present, "max_rotated = \"two\"\n").unwrap();
        assert!(matches!(
            Settings::load(Some(present.as_path())),
            Err(SettingsError::Parse { .. })
        ));
    }
}
