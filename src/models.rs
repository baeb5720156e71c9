use serde::{Deserialize, Serialize};

/// A 1-based location inside a manifest source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
    pub source_name: String,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize, source_name: impl Into<String>) -> Self {
        Self {
            line,
            column,
            source_name: source_name.into(),
        }
    }
}

impl std::fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.source_name, self.line, self.column)
    }
}

/// A non-fatal finding, optionally bound to the manifest location it concerns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub message: String,
    pub position: Option<SourcePosition>,
}

impl Warning {
    pub fn new(message: impl Into<String>, position: Option<SourcePosition>) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.position {
            Some(pos) => write!(f, "{}: {}", pos, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// How much a license constrains downstream use. Ordered for ranking only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Restrictiveness {
    Permissive,
    LessRestrictive,
    Restrictive,
    Unknown,
}

impl std::fmt::Display for Restrictiveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Restrictiveness::Permissive => write!(f, "Permissive"),
            Restrictiveness::LessRestrictive => write!(f, "Less Restrictive"),
            Restrictiveness::Restrictive => write!(f, "Restrictive"),
            Restrictiveness::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A license declaration discovered while scanning a directory tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Declaration {
    /// Directory holding the license file, relative to the scanned root (`.` for the root).
    pub root: String,
    pub license_file: String,
    pub license: String,
    /// Files covered by this declaration; `None` means the whole directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

/// Whether discovered declarations are merged per directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coalesce {
    #[default]
    All,
    None,
}

impl std::fmt::Display for Coalesce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Coalesce::All => write!(f, "all"),
            Coalesce::None => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display_with_position() {
        let w = Warning::new("boom", Some(SourcePosition::new(3, 10, ".bom.yaml")));
        assert_eq!(w.to_string(), ".bom.yaml:3:10: boom");
        assert_eq!(Warning::new("boom", None).to_string(), "boom");
    }

    #[test]
    fn test_restrictiveness_order() {
        assert!(Restrictiveness::Permissive < Restrictiveness::LessRestrictive);
        assert!(Restrictiveness::LessRestrictive < Restrictiveness::Restrictive);
        assert!(Restrictiveness::Restrictive < Restrictiveness::Unknown);
    }
}
