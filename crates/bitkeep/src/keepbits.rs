//! Keepbit map persistence.
//!
//! A keepbit map records, for one source file, how many mantissa bits each
//! variable keeps. It is written once by analysis and read by any number of
//! compression runs.
//!
//! ```toml
//! # generated by find-keepbits
//! [meta]
//! format_version = 1
//! file = "/data/run/x.gac"
//! inflevel = 0.99
//!
//! [keepbits]
//! T = 7
//! U = 5
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::writer::publish_atomically;
use crate::{Error, Result};

/// Current keepbit map format version.
pub const FORMAT_VERSION: u32 = 1;

/// Largest valid keepbit count, the `f64` mantissa width.
pub const MAX_KEEPBITS: i32 = 52;

/// Suffix appended to a source file name to find its map in a directory.
pub const DEFAULT_MAP_SUFFIX: &str = ".keepbits.toml";

/// Per-variable keepbits for one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct KeepbitMap {
    /// Source the map was computed from (informational).
    pub file: String,
    /// Fraction of information retained, in (0, 1].
    pub inflevel: f64,
    pub format_version: u32,
    keepbits: IndexMap<String, i32>,
}

#[derive(Serialize, Deserialize)]
struct MapFile {
    meta: MetaSection,
    #[serde(default)]
    keepbits: IndexMap<String, i32>,
}

#[derive(Serialize, Deserialize)]
struct MetaSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    format_version: Option<u32>,
    #[serde(default)]
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    inflevel: Option<f64>,
}

fn check_inflevel(inflevel: f64) -> Result<()> {
    if inflevel > 0.0 && inflevel <= 1.0 {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "inflevel must be in (0, 1], got {}",
            inflevel
        )))
    }
}

impl KeepbitMap {
    /// Create an empty map.
    pub fn new(file: impl Into<String>, inflevel: f64) -> Result<Self> {
        check_inflevel(inflevel)?;
        Ok(Self {
            file: file.into(),
            inflevel,
            format_version: FORMAT_VERSION,
            keepbits: IndexMap::new(),
        })
    }

    pub fn insert(&mut self, variable: impl Into<String>, keepbits: i32) {
        self.keepbits.insert(variable.into(), keepbits);
    }

    pub fn get(&self, variable: &str) -> Option<i32> {
        self.keepbits.get(variable).copied()
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.keepbits.contains_key(variable)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.keepbits.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.keepbits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keepbits.is_empty()
    }

    /// Render the canonical text form.
    pub fn to_toml_string(&self) -> Result<String> {
        let file = MapFile {
            meta: MetaSection {
                format_version: Some(self.format_version),
                file: self.file.clone(),
                inflevel: Some(self.inflevel),
            },
            keepbits: self.keepbits.clone(),
        };
        let body = toml::to_string(&file)
            .map_err(|e| Error::configuration(format!("cannot render keepbit map: {}", e)))?;
        Ok(format!("# generated by find-keepbits\n{}", body))
    }

    /// Parse the canonical text form.
    ///
    /// A missing or out-of-range `inflevel`, an unknown `format_version` or
    /// a keepbit count outside `0..=52` is a configuration error; no partial
    /// map is returned.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let parsed: MapFile = toml::from_str(text)
            .map_err(|e| Error::configuration(format!("malformed keepbit map: {}", e)))?;

        let format_version = parsed
            .meta
            .format_version
            .ok_or_else(|| Error::configuration("keepbit map has no format_version"))?;
        if format_version != FORMAT_VERSION {
            return Err(Error::configuration(format!(
                "unsupported keepbit map format_version {} (expected {})",
                format_version, FORMAT_VERSION
            )));
        }

        let inflevel = parsed
            .meta
            .inflevel
            .ok_or_else(|| Error::configuration("keepbit map has no inflevel"))?;
        check_inflevel(inflevel)?;

        if let Some((name, k)) = parsed
            .keepbits
            .iter()
            .find(|&(_, &k)| !(0..=MAX_KEEPBITS).contains(&k))
        {
            return Err(Error::configuration(format!(
                "keepbits for '{}' must be in 0..={}, got {}",
                name, MAX_KEEPBITS, k
            )));
        }

        Ok(Self {
            file: parsed.meta.file,
            inflevel,
            format_version,
            keepbits: parsed.keepbits,
        })
    }

    /// Atomically write the map to `path`, creating its directory.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = self.to_toml_string()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::write_io(path, "cannot create keepbit map directory", e))?;
        }

        publish_atomically(path, |out| {
            out.write_all(text.as_bytes())?;
            Ok(())
        })?;

        debug!("saved {} keepbits to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a map from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("cannot read keepbit map {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text).map_err(|e| match e {
            Error::Configuration { message } => {
                Error::configuration(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }
}

/// Where compression finds the keepbit map for a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepbitSource {
    /// One map applied to every file.
    Shared(PathBuf),
    /// One map per file: `dir/<file name><suffix>`.
    Directory { dir: PathBuf, suffix: String },
}

impl KeepbitSource {
    /// Per-file maps in `dir` with the default suffix.
    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        KeepbitSource::Directory {
            dir: dir.into(),
            suffix: DEFAULT_MAP_SUFFIX.to_string(),
        }
    }

    /// Path of the map that applies to `input`.
    pub fn map_path_for(&self, input: &Path) -> PathBuf {
        match self {
            KeepbitSource::Shared(path) => path.clone(),
            KeepbitSource::Directory { dir, suffix } => {
                let mut name = input
                    .file_name()
                    .map(|n| n.to_os_string())
                    .unwrap_or_default();
                name.push(suffix);
                dir.join(name)
            }
        }
    }

    /// Load the map that applies to `input`.
    pub fn load_for(&self, input: &Path) -> Result<KeepbitMap> {
        KeepbitMap::load(self.map_path_for(input))
    }
}
