//! Target Registry
//!
//! Maps configured aliases to executable names and back.

use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no target selected, select at least one")]
    EmptySelection,
    #[error("unknown alias: {0}")]
    UnknownAlias(String),
}

/// Fixed alias <-> executable mapping, in configuration order
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    aliases: Vec<(String, String)>,
    exe_to_aliases: HashMap<String, Vec<String>>,
}

impl TargetRegistry {
    pub fn new(aliases: Vec<(String, String)>) -> Self {
        let mut exe_to_aliases: HashMap<String, Vec<String>> = HashMap::new();
        for (alias, exe) in &aliases {
            exe_to_aliases
                .entry(exe.clone())
                .or_default()
                .push(alias.clone());
        }

        Self {
            aliases,
            exe_to_aliases,
        }
    }

    /// All `(alias, executable)` pairs in configuration order
    pub fn aliases(&self) -> &[(String, String)] {
        &self.aliases
    }

    pub fn executable_for(&self, alias: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, exe)| exe.as_str())
    }

    /// Turns a set of selected aliases into the distinct executables to monitor
    pub fn resolve<I, S>(&self, selected: I) -> Result<BTreeSet<String>, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exes = BTreeSet::new();
        let mut any = false;

        for alias in selected {
            any = true;
            let alias = alias.as_ref();
            let exe = self
                .executable_for(alias)
                .ok_or_else(|| RegistryError::UnknownAlias(alias.to_string()))?;
            exes.insert(exe.to_string());
        }

        if !any {
            return Err(RegistryError::EmptySelection);
        }

        Ok(exes)
    }

    /// Aliases of an executable in configuration order (empty if unknown)
    pub fn display_names_for(&self, exe: &str) -> &[String] {
        self.exe_to_aliases
            .get(exe)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TargetRegistry {
        TargetRegistry::new(vec![
            ("qq".to_string(), "QQ.exe".to_string()),
            ("wow".to_string(), "Wow.exe".to_string()),
            ("腾讯QQ".to_string(), "QQ.exe".to_string()),
        ])
    }

    #[test]
    fn resolve_deduplicates_executables() {
        let reg = registry();
        let exes = reg.resolve(["腾讯QQ", "qq"]).unwrap();
        assert_eq!(exes.into_iter().collect::<Vec<_>>(), vec!["QQ.exe"]);
    }

    #[test]
    fn resolve_is_order_independent() {
        let reg = registry();
        assert_eq!(
            reg.resolve(["wow", "qq"]).unwrap(),
            reg.resolve(["qq", "wow"]).unwrap()
        );
    }

    #[test]
    fn resolve_rejects_empty_selection() {
        let reg = registry();
        let none: [&str; 0] = [];
        assert_eq!(reg.resolve(none), Err(RegistryError::EmptySelection));
    }

    #[test]
    fn resolve_rejects_unknown_alias() {
        let reg = registry();
        assert_eq!(
            reg.resolve(["qq", "steam"]),
            Err(RegistryError::UnknownAlias("steam".to_string()))
        );
    }

    #[test]
    fn display_names_keep_configuration_order() {
        let reg = registry();
        assert_eq!(reg.display_names_for("QQ.exe"), ["qq", "腾讯QQ"]);
        assert_eq!(reg.display_names_for("Wow.exe"), ["wow"]);
        assert!(reg.display_names_for("Steam.exe").is_empty());
    }
}
