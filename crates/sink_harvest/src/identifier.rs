use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Opaque name of the sink resource an emitter writes to.
///
/// The core never interprets the value; the bound [`crate::ResourceFactory`] decides whether it
/// is a file path, a socket address or a key into an in-memory registry.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SinkIdentifier(String);

impl SinkIdentifier {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SinkIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SinkIdentifier {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for SinkIdentifier {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&Path> for SinkIdentifier {
    fn from(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for SinkIdentifier {
    fn from(path: PathBuf) -> Self {
        Self::from(path.as_path())
    }
}

impl AsRef<str> for SinkIdentifier {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
