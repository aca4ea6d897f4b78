//! Versioned migration script naming.
//!
//! Scripts are named `V<version>__<description>.sql`, e.g.
//! `V1.2__add_index.sql`. The version prefix (`V1.2`) is compared as a
//! string against the prefix of the last applied script, so `V10` sorts
//! before `V2`; zero-pad versions when more than nine are expected.

use std::sync::OnceLock;

use regex::Regex;

fn script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(V[0-9][0-9.]*)__([\w\s+\-]+)\.sql$").expect("static regex")
    })
}

/// A parsed migration script file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptName {
    pub file_name: String,
    /// The `V`-prefixed version, e.g. `V1.2`.
    pub version: String,
    pub description: String,
}

impl ScriptName {
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = script_pattern().captures(file_name)?;
        Some(Self {
            file_name: file_name.to_string(),
            version: caps[1].to_string(),
            description: caps[2].to_string(),
        })
    }
}

/// Select the scripts newer than `last_applied` (a script file name, as
/// recorded in the ledger), sorted by file name.
///
/// Names that do not follow the convention are skipped with a warning.
pub fn pending_scripts<I>(file_names: I, last_applied: Option<&str>) -> Vec<ScriptName>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let last_version = last_applied.map(|name| {
        ScriptName::parse(name)
            .map(|s| s.version)
            .unwrap_or_default()
    });

    let mut pending: Vec<ScriptName> = file_names
        .into_iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let parsed = ScriptName::parse(name);
            if parsed.is_none() {
                tracing::warn!(file = name, "Ignoring file that is not a V<version>__<description>.sql script");
            }
            parsed
        })
        .filter(|script| match &last_version {
            Some(last) => script.version.as_str() > last.as_str(),
            None => true,
        })
        .collect();
    pending.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    pending
}
