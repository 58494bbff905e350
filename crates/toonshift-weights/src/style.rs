//! Named pretrained styles and weight sources

use std::fmt;
use std::path::{Path, PathBuf};

/// Release host the pretrained generator weights are published on.
pub const ASSET_HOST: &str =
    "https://github.com/ptran1203/pytorch-animeGAN/releases/download/v1.0";

/// Bundled pretrained styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Hayao,
    Shinkai,
}

impl Style {
    pub const ALL: [Style; 2] = [Style::Hayao, Style::Shinkai];

    pub fn name(&self) -> &'static str {
        match self {
            Style::Hayao => "hayao",
            Style::Shinkai => "shinkai",
        }
    }

    /// File name the release publishes this style under.
    pub fn asset_filename(&self) -> String {
        asset_filename(self.name())
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hayao" => Ok(Style::Hayao),
            "shinkai" => Ok(Style::Shinkai),
            other => Err(format!("unknown style '{other}'")),
        }
    }
}

pub(crate) fn asset_filename(name: &str) -> String {
    format!("generator_{name}.pth")
}

/// Where generator weights come from: a named remote asset or a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightSource {
    /// A style name resolved against [`ASSET_HOST`]. Names outside
    /// [`Style::ALL`] are allowed and fail at download time if the remote
    /// asset does not exist.
    Named(String),
    /// An explicit local weight file.
    File(PathBuf),
}

impl WeightSource {
    /// Interpret a CLI argument: an existing path is a file, anything else is
    /// treated as a style name.
    pub fn parse(arg: &str) -> Self {
        let path = Path::new(arg);
        if path.exists() {
            WeightSource::File(path.to_path_buf())
        } else {
            WeightSource::Named(arg.to_ascii_lowercase())
        }
    }
}

impl From<Style> for WeightSource {
    fn from(style: Style) -> Self {
        WeightSource::Named(style.name().to_string())
    }
}
