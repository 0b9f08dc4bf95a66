//! Parse-time errors, built from the bytecode's farthest-failure tracking
//! (§7: the *farthest-failure rule*).

use crate::bytecode::Constant;
use crate::location::{Location, Position};

/// One `{type, description}` entry a failed match could report.
///
/// Kept as a type/description pair, rather than a bare string, so the
/// formatter below can special-case `Kind::End` as "end of input" without
/// string-matching a rendered message (§10 supplemented feature).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    /// The expectation's kind.
    pub kind: ExpectationKind,
    /// Human-readable description of what was expected.
    pub description: String,
}

/// The category of thing a failed match expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectationKind {
    /// A literal string match was expected.
    Literal,
    /// A character class match was expected.
    Class,
    /// Any one code point was expected.
    Any,
    /// End-of-input was expected.
    End,
    /// An expectation kind not covered by the other variants.
    Other,
}

impl Expectation {
    fn from_constant(constant: &Constant) -> Self {
        match constant {
            Constant::Expectation { kind, description } => Expectation {
                kind: match kind.as_str() {
                    "literal" => ExpectationKind::Literal,
                    "class" => ExpectationKind::Class,
                    "any" => ExpectationKind::Any,
                    "end" => ExpectationKind::End,
                    _ => ExpectationKind::Other,
                },
                description: description.clone(),
            },
            _ => Expectation {
                kind: ExpectationKind::Other,
                description: "unknown".to_string(),
            },
        }
    }
}

/// Accumulates the failure(s) with the greatest input offset seen so far.
///
/// Matches `§7`'s farthest-failure rule: only the failure(s) at the single
/// highest offset are kept, merged and order-preserving by first
/// occurrence if more than one expectation shares that offset.
#[derive(Debug, Default)]
pub(crate) struct FailureTracker {
    offset: usize,
    expected: Vec<Expectation>,
    silent_depth: u32,
}

impl FailureTracker {
    pub(crate) fn enter_silent(&mut self) {
        self.silent_depth += 1;
    }

    pub(crate) fn exit_silent(&mut self) {
        self.silent_depth = self.silent_depth.saturating_sub(1);
    }

    pub(crate) fn record(&mut self, offset: usize, constant: &Constant) {
        if self.silent_depth > 0 {
            return;
        }
        let expectation = Expectation::from_constant(constant);
        match offset.cmp(&self.offset) {
            std::cmp::Ordering::Greater => {
                self.offset = offset;
                self.expected = vec![expectation];
            }
            std::cmp::Ordering::Equal => {
                if !self.expected.contains(&expectation) {
                    self.expected.push(expectation);
                }
            }
            std::cmp::Ordering::Less => {}
        }
    }

    pub(crate) fn into_error(self, input: &str) -> PegSyntaxError {
        let found = input[self.offset..].chars().next();
        PegSyntaxError {
            message: format_message(&self.expected, found),
            location: point_location(input, self.offset),
            found,
            expected: self.expected,
        }
    }
}

pub(crate) fn point_location(input: &str, offset: usize) -> Location {
    let mut line = 1usize;
    let mut column = 1usize;
    for ch in input[..offset.min(input.len())].chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    let pos = Position::new(offset, line, column);
    Location::new(pos, pos)
}

fn format_message(expected: &[Expectation], found: Option<char>) -> String {
    let found_desc = found.map_or_else(|| "end of input".to_string(), |c| format!("{c:?}"));
    let list = match expected {
        [] => "nothing".to_string(),
        [one] => one.description.clone(),
        many => {
            let (last, rest) = many.split_last().expect("non-empty checked above");
            let joined = rest
                .iter()
                .map(|e| e.description.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{joined} or {}", last.description)
        }
    };
    format!("Expected {list} but {found_desc} found")
}

/// A parse failure, matching the emitted `PegSyntaxError` surface (§6):
/// `name = "PegSyntaxError"`, a formatted `message`, `location`, `found`
/// character, and `expected` list.
#[derive(Debug, Clone, PartialEq)]
pub struct PegSyntaxError {
    /// Formatted, human-readable error message.
    pub message: String,
    /// Location of the failure in the source.
    pub location: Location,
    /// The character actually found at the failure point, if any.
    pub found: Option<char>,
    /// The farthest-failure expectations that were not met.
    pub expected: Vec<Expectation>,
}

impl PegSyntaxError {
    /// Always `"PegSyntaxError"`, matching the emitted parser's error name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        "PegSyntaxError"
    }

    /// Builds the error an action's `error(msg)` call raises directly,
    /// bypassing farthest-failure tracking.
    #[must_use]
    pub fn custom(message: impl Into<String>, location: Location) -> Self {
        Self {
            message: message.into(),
            location,
            found: None,
            expected: Vec::new(),
        }
    }
}

impl std::fmt::Display for PegSyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PegSyntaxError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn farthest_failure_wins_over_earlier_ones() {
        let mut tracker = FailureTracker::default();
        tracker.record(
            0,
            &Constant::Expectation {
                kind: "literal".to_string(),
                description: "\"a\"".to_string(),
            },
        );
        tracker.record(
            3,
            &Constant::Expectation {
                kind: "literal".to_string(),
                description: "\"b\"".to_string(),
            },
        );
        let error = tracker.into_error("aaac");
        assert_eq!(error.location.start.offset, 3);
        assert_eq!(error.expected.len(), 1);
        assert_eq!(error.expected[0].description, "\"b\"");
    }

    #[test]
    fn equal_offset_failures_merge_in_first_occurrence_order() {
        let mut tracker = FailureTracker::default();
        let a = Constant::Expectation {
            kind: "literal".to_string(),
            description: "\"a\"".to_string(),
        };
        let b = Constant::Expectation {
            kind: "literal".to_string(),
            description: "\"b\"".to_string(),
        };
        tracker.record(2, &a);
        tracker.record(2, &b);
        tracker.record(2, &a);
        let error = tracker.into_error("aa");
        assert_eq!(error.expected.len(), 2);
        assert_eq!(error.message, "Expected \"a\" or \"b\" but end of input found");
    }

    #[test]
    fn silent_failures_are_not_recorded() {
        let mut tracker = FailureTracker::default();
        tracker.enter_silent();
        tracker.record(
            0,
            &Constant::Expectation {
                kind: "any".to_string(),
                description: "any character".to_string(),
            },
        );
        tracker.exit_silent();
        assert!(tracker.expected.is_empty());
    }
}
