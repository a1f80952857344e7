use std::{
    fs, io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer};
use serde_derive::Deserialize;

pub const CONFIG_FILE: &str = "beebasm.toml";

/// Project settings read from `beebasm.toml`.
///
/// ```toml
/// include = ["lib", "../shared"]
/// cpu = 1
/// output = "GAME"
///
/// [defines]
/// DEBUG = 1
/// SCREEN = "&3000"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub include: Vec<PathBuf>,

    #[serde(default, deserialize_with = "deserialize_defines")]
    pub defines: IndexMap<String, f64>,

    #[serde(default)]
    pub cpu: Option<u8>,

    #[serde(default)]
    pub output: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cant read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Looks for `beebasm.toml` beside the source file.
    pub fn discover(source: &Path) -> Result<Option<Self>, ConfigError> {
        let Some(dir) = source.parent() else {
            return Ok(None);
        };
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefineValue {
    Int(i64),
    Float(f64),
    Str(String),
}

fn deserialize_defines<'de, D>(deserializer: D) -> Result<IndexMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = IndexMap::<String, DefineValue>::deserialize(deserializer)?;
    let mut map = IndexMap::new();
    for (name, value) in raw {
        let value = match value {
            DefineValue::Int(value) => value as f64,
            DefineValue::Float(value) => value,
            DefineValue::Str(buf) => parse_based(&buf).map_err(de::Error::custom)?,
        };
        map.insert(name, value);
    }
    Ok(map)
}

fn parse_based(buf: &str) -> Result<f64, String> {
    let (digits, radix) = if let Some(hex) = buf.strip_prefix('&').or(buf.strip_prefix('$')) {
        (hex, 16)
    } else if let Some(bin) = buf.strip_prefix('%') {
        (bin, 2)
    } else {
        return buf
            .parse::<f64>()
            .map_err(|e| format!("{buf} is not a valid number: {e}"));
    };
    i64::from_str_radix(digits, radix)
        .map(|value| value as f64)
        .map_err(|e| format!("{buf} is not a valid base {radix} value: {e}"))
}
