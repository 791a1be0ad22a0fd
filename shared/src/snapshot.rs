//! Packed text payloads broadcast by the authority.
//!
//! Both formats are newline-joined lines and must stay byte-compatible with
//! existing observers:
//! - lobby: `"{display_name}  {score}"` (two spaces), one line per participant
//! - dead: `"{identity}|{0 or 1}"`, one line per participant

use crate::Identity;
use thiserror::Error;

pub const LOBBY_SEPARATOR: &str = "  ";
pub const DEAD_DELIMITER: char = '|';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot line `{0}` has no `|` delimiter")]
    MissingDelimiter(String),
    #[error("snapshot line `{0}` has more than one `|` delimiter")]
    ExtraDelimiter(String),
    #[error("snapshot line `{0}` has an invalid identity")]
    InvalidIdentity(String),
    #[error("snapshot line `{0}` has a non-numeric dead flag")]
    InvalidFlag(String),
}

/// Packs `(display_name, score)` pairs in roster order.
pub fn pack_lobby<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a str, u32)>,
{
    entries
        .into_iter()
        .map(|(name, score)| format!("{}{}{}", name, LOBBY_SEPARATOR, score))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits a lobby payload into display lines, dropping empty lines.
pub fn unpack_lobby(packed: &str) -> Vec<String> {
    packed
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn pack_dead_snapshot<I>(entries: I) -> String
where
    I: IntoIterator<Item = (Identity, bool)>,
{
    entries
        .into_iter()
        .map(|(id, dead)| format!("{}{}{}", id, DEAD_DELIMITER, if dead { 1 } else { 0 }))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses one dead-snapshot line. Any flag other than `1` means alive.
pub fn parse_dead_line(line: &str) -> Result<(Identity, bool), SnapshotError> {
    let mut parts = line.split(DEAD_DELIMITER);
    let (id, flag) = match (parts.next(), parts.next(), parts.next()) {
        (Some(id), Some(flag), None) => (id, flag),
        (_, None, _) => return Err(SnapshotError::MissingDelimiter(line.to_string())),
        _ => return Err(SnapshotError::ExtraDelimiter(line.to_string())),
    };

    let identity = id
        .parse::<Identity>()
        .map_err(|_| SnapshotError::InvalidIdentity(line.to_string()))?;
    let flag = flag
        .trim()
        .parse::<i32>()
        .map_err(|_| SnapshotError::InvalidFlag(line.to_string()))?;

    Ok((identity, flag == 1))
}

/// Parses every non-empty line; callers skip the errors and keep the rest.
pub fn unpack_dead_snapshot(
    packed: &str,
) -> impl Iterator<Item = Result<(Identity, bool), SnapshotError>> + '_ {
    packed
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(parse_dead_line)
}
