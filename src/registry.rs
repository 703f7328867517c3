//! Canonical norm registry.
//!
//! A small table of well-known norms (constitution, codes, landmark laws)
//! plus the lexical trigger rules that open external-origin regions. The
//! whole registry is bundled into the binary as TOML (`data/norms.toml`),
//! parsed once at startup, and passed by reference; nothing here mutates
//! after load.

use miette::Diagnostic;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Errors while loading the registry.
#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("failed to parse norm registry: {message}")]
    #[diagnostic(
        code(lexcanon::registry::parse),
        help("Check the TOML syntax of data/norms.toml.")
    )]
    Parse { message: String },

    #[error("invalid trigger regex in rule \"{rule}\": {message}")]
    #[diagnostic(
        code(lexcanon::registry::bad_trigger),
        help("Trigger patterns must be valid regular expressions.")
    )]
    BadTrigger { rule: String, message: String },
}

/// Convenience alias for registry results.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// A well-known norm: canonical id plus the spellings it hides behind.
#[derive(Debug, Clone, Deserialize)]
pub struct NormEntry {
    /// Canonical document id, e.g. `DECRETO-LEI-2.848-1940`.
    pub id: String,
    /// Human-readable name, e.g. `Código Penal`.
    pub name: String,
    /// Type token used in citations, e.g. `LEI`, `DECRETO-LEI`, `CF`.
    pub doc_type: String,
    /// Plain number, no thousands dots.
    pub number: String,
    pub year: i32,
    /// Alternative spellings found in running text.
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A lexical trigger that opens an external-origin region.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerRule {
    /// Stable rule name recorded as `origin_reason`, e.g. `rule:nova_redacao`.
    pub id: String,
    /// Regex tested against device text.
    pub trigger: String,
    /// Norm pinned by the rule itself, when the trigger names one.
    #[serde(default)]
    pub norm: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    norm: Vec<NormEntry>,
    #[serde(default)]
    rule: Vec<TriggerRule>,
}

/// Immutable registry of canonical norms and origin trigger rules.
pub struct NormRegistry {
    norms: Vec<NormEntry>,
    rules: Vec<(TriggerRule, Regex)>,
}

impl NormRegistry {
    /// Parse a registry from TOML text.
    pub fn from_toml(text: &str) -> RegistryResult<Self> {
        let file: RegistryFile = toml::from_str(text).map_err(|e| RegistryError::Parse {
            message: e.to_string(),
        })?;
        let mut rules = Vec::with_capacity(file.rule.len());
        for rule in file.rule {
            let regex = Regex::new(&rule.trigger).map_err(|e| RegistryError::BadTrigger {
                rule: rule.id.clone(),
                message: e.to_string(),
            })?;
            rules.push((rule, regex));
        }
        Ok(Self {
            norms: file.norm,
            rules,
        })
    }

    /// The registry bundled into the binary.
    pub fn builtin() -> Self {
        // The bundled file is covered by tests; a parse failure here is
        // programmer error.
        Self::from_toml(include_str!("../data/norms.toml"))
            .expect("bundled norm registry must parse")
    }

    /// Look up a norm by `(type, number)`, ignoring thousands dots. This is
    /// how year-less citations get resolved.
    pub fn resolve_number(&self, doc_type: &str, number: &str) -> Option<&NormEntry> {
        let wanted_type = doc_type.trim().to_uppercase().replace(' ', "-");
        let wanted_number: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
        self.norms
            .iter()
            .find(|n| n.doc_type == wanted_type && n.number == wanted_number)
    }

    /// Look up a norm by canonical id.
    pub fn by_id(&self, id: &str) -> Option<&NormEntry> {
        self.norms.iter().find(|n| n.id == id)
    }

    /// Find the first norm whose name or alias occurs in `text`.
    pub fn find_alias(&self, text: &str) -> Option<&NormEntry> {
        self.norms.iter().find(|n| {
            text.contains(n.name.as_str()) || n.aliases.iter().any(|a| text.contains(a.as_str()))
        })
    }

    /// Origin entry rules with their compiled triggers.
    pub fn rules(&self) -> impl Iterator<Item = (&TriggerRule, &Regex)> {
        self.rules.iter().map(|(rule, regex)| (rule, regex))
    }

    /// All registered norms.
    pub fn norms(&self) -> impl Iterator<Item = &NormEntry> {
        self.norms.iter()
    }
}
