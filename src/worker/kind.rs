//! Worker kinds naming the pipeline's stages.
//!
//! The seven built-in kinds cover the default pipeline. Additional stages are
//! expressed as [`WorkerKind::Custom`] and become runnable once a worker and a
//! quality gate are registered for them.
//!
//! ## Serialization
//!
//! Kinds serialize as their hyphenated name (`"code-quality"`, `"ui-ux"`, ...).
//! Underscored, spaced and capitalized spellings of a built-in are accepted on
//! input. Any other name parses as a custom kind and is kept exactly as
//! written (surrounding whitespace aside), so a custom kind reads back equal
//! to the one that was written out.
//!
//! A hand-built `Custom` whose name is blank or spells a built-in would not
//! survive that round trip; [`WorkerKind::is_canonical`] detects it and the
//! orchestrator refuses to run such a layout.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of a pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkerKind {
    /// Type checking, linting and build optimization.
    CodeQuality,
    /// Interface design and accessibility.
    UiUx,
    /// Bundle size, web vitals and offline capability.
    Performance,
    /// Test coverage and content validation.
    Testing,
    /// Vulnerability scanning and data-protection compliance.
    Security,
    /// CI/CD, monitoring and deployment.
    Devops,
    /// Whole-system architectural assessment.
    Architecture,
    /// A stage outside the built-in set.
    Custom(String),
}

impl WorkerKind {
    /// The built-in kinds in default sequential order.
    pub const BUILTIN: [WorkerKind; 7] = [
        WorkerKind::CodeQuality,
        WorkerKind::UiUx,
        WorkerKind::Performance,
        WorkerKind::Testing,
        WorkerKind::Security,
        WorkerKind::Devops,
        WorkerKind::Architecture,
    ];

    /// Hyphenated identifier used in records and configuration.
    ///
    /// ```
    /// use stagegate::worker::WorkerKind;
    ///
    /// assert_eq!(WorkerKind::UiUx.as_str(), "ui-ux");
    /// assert_eq!(WorkerKind::Custom("load-test".to_string()).as_str(), "load-test");
    /// ```
    pub fn as_str(&self) -> &str {
        match self {
            Self::CodeQuality => "code-quality",
            Self::UiUx => "ui-ux",
            Self::Performance => "performance",
            Self::Testing => "testing",
            Self::Security => "security",
            Self::Devops => "devops",
            Self::Architecture => "architecture",
            Self::Custom(name) => name,
        }
    }

    /// Human-readable name for terminal output.
    pub fn display_name(&self) -> &str {
        match self {
            Self::CodeQuality => "Code Quality",
            Self::UiUx => "UI/UX",
            Self::Performance => "Performance",
            Self::Testing => "Testing",
            Self::Security => "Security",
            Self::Devops => "DevOps",
            Self::Architecture => "Architecture",
            Self::Custom(name) => name,
        }
    }

    /// Whether this kind is one of the built-in stages.
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }

    /// Create a custom kind, rejecting blank names and built-in spellings.
    ///
    /// ```
    /// use stagegate::worker::WorkerKind;
    ///
    /// let kind = WorkerKind::custom(" Load_Test ").unwrap();
    /// assert_eq!(kind.as_str(), "Load_Test");
    /// assert!(WorkerKind::custom("dev_ops").is_err());
    /// ```
    pub fn custom(name: &str) -> anyhow::Result<Self> {
        let kind: Self = name.parse()?;
        if kind.is_builtin() {
            anyhow::bail!("'{}' names the built-in worker kind '{}'", name.trim(), kind);
        }
        Ok(kind)
    }

    /// Whether this kind parses back to itself from [`as_str`](Self::as_str).
    pub fn is_canonical(&self) -> bool {
        match self {
            Self::Custom(_) => self
                .as_str()
                .parse::<Self>()
                .is_ok_and(|parsed| parsed == *self),
            _ => true,
        }
    }
}

fn builtin(normalized: &str) -> Option<WorkerKind> {
    let kind = match normalized {
        "code-quality" => WorkerKind::CodeQuality,
        "ui-ux" | "uiux" => WorkerKind::UiUx,
        "performance" => WorkerKind::Performance,
        "testing" => WorkerKind::Testing,
        "security" => WorkerKind::Security,
        "devops" | "dev-ops" => WorkerKind::Devops,
        "architecture" => WorkerKind::Architecture,
        _ => return None,
    };
    Some(kind)
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            anyhow::bail!("Worker kind must not be empty");
        }

        let normalized = trimmed.to_lowercase().replace(['_', ' '], "-");
        Ok(builtin(&normalized).unwrap_or_else(|| Self::Custom(trimmed.to_string())))
    }
}

impl Serialize for WorkerKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WorkerKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
