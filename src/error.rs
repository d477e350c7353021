// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types for the timeline library.

use std::path::PathBuf;

use thiserror::Error;

/// Library-level failures.
///
/// Playback commands never return these: invalid section data falls back to
/// safe defaults instead. Errors only surface from file I/O, parsing and
/// explicit validation.
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("failed to watch {path:?}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("section {index}: {reason}")]
    InvalidSection { index: usize, reason: String },

    #[error("section index {0} out of range")]
    SectionOutOfRange(usize),

    #[error("invalid {name}: {value}")]
    InvalidSetting { name: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, TimelineError>;
