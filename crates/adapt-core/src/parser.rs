//! Migration script parsing.
//!
//! [`parse`] reduces the text of a migration script to a [`ParsedMigration`]:
//! the ordered list of executable statements plus the transaction flag. The
//! scan is line oriented and preserves line endings inside statements, so
//! multi-line DDL keeps its formatting; a `\r` immediately before `\n` is
//! dropped.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ParseError;

/// Directive marker recognized at the start of a trimmed line.
const DIRECTIVE_PREFIX: &str = "-- +adapt ";

/// A migration script reduced to its executable form.
///
/// The JSON representation of this type (keys `UseTransaction` and
/// `Statements`) is what gets persisted as the down-form of an applied
/// migration, so the spelling of those keys must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMigration {
    /// Whether the statements should run inside a transaction.
    #[serde(rename = "UseTransaction")]
    pub use_tx: bool,
    /// Ordered, whitespace-trimmed statements.
    #[serde(rename = "Statements")]
    pub statements: Vec<String>,
}

impl ParsedMigration {
    /// Content hash over `use_tx` and every statement, hex-lowercase.
    ///
    /// A pure function of the parsed structure: the same script hashes the
    /// same no matter which source it was loaded from.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(if self.use_tx { "true" } else { "false" });
        for statement in &self.statements {
            hasher.update(statement.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Parse a migration script.
///
/// Statements are split after every `;`. Three directives are recognized on
/// lines starting with `-- +adapt `:
///
/// * `NoTransaction` — run this migration outside a transaction; only valid
///   before the first statement.
/// * `BeginStatement` / `EndStatement` — treat the enclosed lines as one
///   statement without semicolon splitting (stored procedures, triggers).
///
/// For example:
///
/// ```text
/// -- +adapt NoTransaction
/// CREATE DATABASE IF NOT EXISTS testdb
///     CHARACTER SET utf8mb4
///     COLLATE utf8mb4_unicode_ci;
///
/// CREATE TABLE testdb.accounts_old (id INT NOT NULL, PRIMARY KEY (id));
///
/// -- +adapt BeginStatement
/// CREATE TRIGGER accounts_trigger BEFORE UPDATE ON accounts_old FOR EACH ROW BEGIN
///     INSERT INTO testdb.accounts_new (id) VALUES(OLD.id)
/// END
/// -- +adapt EndStatement
/// ```
///
/// parses to `use_tx = false` and three statements, the trigger body staying
/// intact as one statement.
pub fn parse(input: &str) -> Result<ParsedMigration, ParseError> {
    let mut parsed = ParsedMigration {
        use_tx: true,
        statements: Vec::new(),
    };

    let mut buf = String::new();
    let mut in_statement = false;

    for line in split_lines(input) {
        let trimmed = line.trim();

        // blank lines only carry meaning inside a statement block
        if !in_statement && trimmed.is_empty() {
            continue;
        }

        if let Some(directive) = trimmed.strip_prefix(DIRECTIVE_PREFIX) {
            match directive {
                "NoTransaction" => {
                    if !parsed.statements.is_empty() || !buf.is_empty() {
                        return Err(ParseError::MisplacedNoTransaction);
                    }
                    parsed.use_tx = false;
                }
                "BeginStatement" => in_statement = true,
                "EndStatement" => {
                    parsed.statements.push(std::mem::take(&mut buf));
                    in_statement = false;
                }
                other => return Err(ParseError::UnknownDirective(other.to_string())),
            }
            continue;
        }

        if in_statement || !line.contains(';') {
            buf.push_str(&line);
            continue;
        }

        let split = split_after(&line, ';');

        // the first part completes whatever accumulated in the buffer
        buf.push_str(split[0]);
        parsed.statements.push(std::mem::take(&mut buf));

        // middle parts each carry their own trailing semicolon
        if split.len() > 2 {
            for part in &split[1..split.len() - 1] {
                if !part.trim().is_empty() {
                    parsed.statements.push((*part).to_string());
                }
            }
        }

        // the last part has no semicolon yet and continues on the next line
        let last = split[split.len() - 1];
        if !last.trim().is_empty() {
            buf.push_str(last);
        }
    }

    if !buf.trim().is_empty() {
        parsed.statements.push(buf);
    }

    for statement in &mut parsed.statements {
        *statement = statement.trim().to_string();
    }

    Ok(parsed)
}

/// Split into lines keeping the trailing `\n` on each; a `\r` before the
/// `\n` (and a bare trailing `\r` on the final line) is dropped.
fn split_lines(input: &str) -> impl Iterator<Item = String> + '_ {
    let mut rest = input;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.find('\n') {
            Some(pos) => {
                let (line, tail) = rest.split_at(pos + 1);
                rest = tail;
                Some(match line.strip_suffix("\r\n") {
                    Some(body) => format!("{body}\n"),
                    None => line.to_string(),
                })
            }
            None => {
                let line = rest.strip_suffix('\r').unwrap_or(rest).to_string();
                rest = "";
                Some(line)
            }
        }
    })
}

/// Split after every occurrence of `sep`, keeping the separator on each
/// part; the final element is the (possibly empty) remainder.
fn split_after(line: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (idx, ch) in line.char_indices() {
        if ch == sep {
            parts.push(&line[start..=idx]);
            start = idx + sep.len_utf8();
        }
    }
    parts.push(&line[start..]);
    parts
}

#[cfg(test)]
#[path = "parser_test.rs"]
mod tests;
