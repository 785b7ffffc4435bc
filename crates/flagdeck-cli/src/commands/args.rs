//! Typed accessors over `clap` matches.
//!
//! All lookups go through `try_get_*` so a mismatched id surfaces as a
//! missing value instead of a panic.

use clap::ArgMatches;

use crate::error::{CliError, CliResult};

/// Trimmed, non-empty value of a single-valued option.
pub(crate) fn optional<'a>(args: &'a ArgMatches, name: &str) -> Option<&'a str> {
    args.try_get_one::<String>(name)
        .ok()
        .flatten()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Like [`optional`], failing with a validation error when absent.
pub(crate) fn required<'a>(args: &'a ArgMatches, name: &str) -> CliResult<&'a str> {
    optional(args, name).ok_or_else(|| CliError::validation(format!("--{name} is required.")))
}

/// Whether a boolean switch is set.
pub(crate) fn flag(args: &ArgMatches, name: &str) -> bool {
    args.try_get_one::<bool>(name)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}

/// All values of a multi-valued option or argument, in command-line order.
pub(crate) fn many<'a>(args: &'a ArgMatches, name: &str) -> Vec<&'a str> {
    args.try_get_many::<String>(name)
        .ok()
        .flatten()
        .map(|values| values.map(String::as_str).collect())
        .unwrap_or_default()
}

/// Required numeric identifier.
pub(crate) fn id(args: &ArgMatches, name: &str) -> CliResult<i64> {
    let raw = required(args, name)?;
    raw.parse()
        .map_err(|_| CliError::validation(format!("--{name} expects a number, got '{raw}'.")))
}

/// Numeric identifiers, accepting repeated values and comma-separated lists.
pub(crate) fn ids(args: &ArgMatches, name: &str) -> CliResult<Vec<i64>> {
    many(args, name)
        .into_iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value.parse().map_err(|_| {
                CliError::validation(format!("--{name} expects numbers, got '{value}'."))
            })
        })
        .collect()
}

/// One-based position converted to an index below `len`.
pub(crate) fn position(args: &ArgMatches, name: &str, len: usize) -> CliResult<usize> {
    let raw = required(args, name)?;
    match raw.parse::<usize>() {
        Ok(position) if (1..=len).contains(&position) => Ok(position - 1),
        _ if len == 0 => Err(CliError::validation(format!(
            "--{name} is out of range, there are no rules to address."
        ))),
        _ => Err(CliError::validation(format!(
            "--{name} must be between 1 and {len}, got '{raw}'."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction, Command};

    fn parse(args: &[&str]) -> ArgMatches {
        Command::new("test")
            .arg(Arg::new("name").long("name"))
            .arg(Arg::new("ids").long("ids").action(ArgAction::Append).num_args(1..))
            .arg(Arg::new("json").long("json").action(ArgAction::SetTrue))
            .arg(Arg::new("position").long("position"))
            .try_get_matches_from(args)
            .expect("valid arguments")
    }

    #[test]
    fn blank_values_count_as_missing() {
        let matches = parse(&["test", "--name", "   "]);
        assert_eq!(optional(&matches, "name"), None);
        assert!(matches!(
            required(&matches, "name"),
            Err(CliError::Validation(message)) if message == "--name is required."
        ));
    }

    #[test]
    fn unknown_ids_do_not_panic() {
        let matches = parse(&["test"]);
        assert_eq!(optional(&matches, "missing"), None);
        assert!(!flag(&matches, "missing"));
        assert!(many(&matches, "missing").is_empty());
    }

    #[test]
    fn ids_accept_lists_and_repeats() -> CliResult<()> {
        let matches = parse(&["test", "--ids", "1,2", "3", "--ids", "4"]);
        assert_eq!(ids(&matches, "ids")?, vec![1, 2, 3, 4]);

        let bad = parse(&["test", "--ids", "1,x"]);
        assert!(ids(&bad, "ids").is_err());
        Ok(())
    }

    #[test]
    fn positions_are_one_based() -> CliResult<()> {
        let matches = parse(&["test", "--position", "2"]);
        assert_eq!(position(&matches, "position", 3)?, 1);
        assert!(position(&matches, "position", 1).is_err());
        assert!(position(&parse(&["test", "--position", "0"]), "position", 3).is_err());
        Ok(())
    }
}
