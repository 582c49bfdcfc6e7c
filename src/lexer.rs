//! Splitting input lines into argument vectors.

use nix::unistd::{SysconfVar, sysconf};

/// Split a command line into whitespace-separated arguments.
///
/// Leading and trailing whitespace is ignored. Returns `None` for a blank
/// line, which callers treat as "nothing to do" rather than an error. The
/// vector is capped at the platform argument-count ceiling; tokens past the
/// cap are dropped instead of failing the parse.
pub fn split_into_args(line: &str) -> Option<Vec<String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let ceiling = arg_ceiling()?;
    Some(
        line.split_whitespace()
            .take(ceiling)
            .map(str::to_owned)
            .collect(),
    )
}

/// Detect and remove a trailing `&`.
///
/// Returns the line without the marker and whether it was present. Run this
/// before [`split_into_args`] so the marker never ends up in the child's
/// argument list.
pub fn strip_background(line: &str) -> (&str, bool) {
    match line.trim_end().strip_suffix('&') {
        Some(rest) => (rest, true),
        None => (line, false),
    }
}

fn arg_ceiling() -> Option<usize> {
    match sysconf(SysconfVar::ARG_MAX) {
        Ok(Some(max)) if max > 0 => Some(max as usize),
        _ => None,
    }
}
