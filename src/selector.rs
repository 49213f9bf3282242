//! Startup target selection
//!
//! Console prompt listing every configured alias. Loops until the user
//! picks at least one valid entry.

use crate::registry::{RegistryError, TargetRegistry};
use anyhow::{bail, Result};
use std::collections::BTreeSet;
use std::io::{BufRead, Write};

const EMPTY_WARNING: &str = "请至少选择一项！";

/// Returns the chosen aliases (never empty)
pub fn prompt_selection<R: BufRead, W: Write>(
    registry: &TargetRegistry,
    mut input: R,
    mut output: W,
) -> Result<BTreeSet<String>> {
    loop {
        writeln!(output, "选择要监控的进程 (numbers or names, separated by spaces):")?;
        for (i, (alias, exe)) in registry.aliases().iter().enumerate() {
            writeln!(output, "  {}) {} ({})", i + 1, alias, exe)?;
        }
        write!(output, "> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("input closed before a target was selected");
        }

        match parse_answer(registry, &line) {
            Ok(selected) => return Ok(selected),
            Err(RegistryError::EmptySelection) => writeln!(output, "{}", EMPTY_WARNING)?,
            Err(e) => writeln!(output, "{}", e)?,
        }
    }
}

/// Parses `1 3`, `qq,wow` or a mix into aliases
fn parse_answer(registry: &TargetRegistry, line: &str) -> Result<BTreeSet<String>, RegistryError> {
    let aliases = registry.aliases();
    let mut selected = BTreeSet::new();

    for token in line
        .split(|c: char| c == ',' || c == '，' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        // A configured alias wins over a list number
        let alias = if registry.executable_for(token).is_some() {
            token.to_string()
        } else {
            match token.parse::<usize>() {
                Ok(n) if (1..=aliases.len()).contains(&n) => aliases[n - 1].0.clone(),
                _ => return Err(RegistryError::UnknownAlias(token.to_string())),
            }
        };
        selected.insert(alias);
    }

    // Same rules as the registry, so an empty answer is EmptySelection
    registry.resolve(&selected)?;
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn registry() -> TargetRegistry {
        TargetRegistry::new(vec![
            ("qq".to_string(), "QQ.exe".to_string()),
            ("wow".to_string(), "Wow.exe".to_string()),
            ("7".to_string(), "Seven.exe".to_string()),
        ])
    }

    fn run(input: &str) -> (Result<BTreeSet<String>>, String) {
        let mut out = Vec::new();
        let result = prompt_selection(&registry(), Cursor::new(input.as_bytes()), &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn numbers_and_names_mix() {
        let (result, out) = run("1, wow\n");
        let selected = result.unwrap();
        assert_eq!(selected.into_iter().collect::<Vec<_>>(), ["qq", "wow"]);
        assert!(out.contains("1) qq (QQ.exe)"));
        assert!(out.contains("2) wow (Wow.exe)"));
    }

    #[test]
    fn empty_answer_reprompts() {
        let (result, out) = run("\n  \n2\n");
        assert_eq!(result.unwrap().into_iter().collect::<Vec<_>>(), ["wow"]);
        assert_eq!(out.matches(EMPTY_WARNING).count(), 2);
    }

    #[test]
    fn unknown_entry_reprompts() {
        let (result, out) = run("steam\n9\nqq\n");
        assert_eq!(result.unwrap().into_iter().collect::<Vec<_>>(), ["qq"]);
        assert!(out.contains("unknown alias: steam"));
        assert!(out.contains("unknown alias: 9"));
    }

    #[test]
    fn numeric_alias_falls_back_to_name() {
        // "7" is out of range as an index but is a configured alias
        let (result, _) = run("7\n");
        assert_eq!(result.unwrap().into_iter().collect::<Vec<_>>(), ["7"]);
    }

    #[test]
    fn numeric_alias_beats_list_number() {
        let registry = TargetRegistry::new(vec![
            ("qq".to_string(), "QQ.exe".to_string()),
            ("1".to_string(), "One.exe".to_string()),
        ]);
        let mut out = Vec::new();
        let selected = prompt_selection(&registry, Cursor::new("1\n"), &mut out).unwrap();
        assert_eq!(selected.into_iter().collect::<Vec<_>>(), ["1"]);

        let mut out = Vec::new();
        let selected = prompt_selection(&registry, Cursor::new("2 qq\n"), &mut out).unwrap();
        assert_eq!(selected.into_iter().collect::<Vec<_>>(), ["1", "qq"]);
    }

    #[test]
    fn closed_input_is_an_error() {
        let (result, out) = run("");
        assert!(result.is_err());
        assert!(out.contains("> "));
    }
}
