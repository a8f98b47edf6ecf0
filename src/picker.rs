// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Choosing one entry from a list of versions

use console::{Term, style};

use crate::error::Result;

/// What the user did with a list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Chosen(String),
    Cancelled,
    /// No terminal to ask on; the list went to stdout instead
    NonInteractive,
}

pub trait Picker {
    /// Offer `items` and return the user's choice
    ///
    /// # Errors
    /// Fails when the terminal cannot be written to or read from
    fn select(&self, items: &[String], prompt: &str) -> Result<Selection>;
}

/// Numbered prompt on the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePicker;

impl Picker for ConsolePicker {
    fn select(&self, items: &[String], prompt: &str) -> Result<Selection> {
        let stdout = Term::stdout();
        if !stdout.is_term() {
            for item in items {
                stdout.write_line(item)?;
            }
            return Ok(Selection::NonInteractive);
        }

        let term = Term::stderr();
        if items.is_empty() {
            return Ok(Selection::Cancelled);
        }
        for (index, item) in items.iter().enumerate() {
            term.write_line(&format!("{:>3}) {item}", index + 1))?;
        }
        term.write_str(&format!("{} ", style(prompt).bold()))?;

        let answer = term.read_line()?;
        Ok(interpret_answer(items, &answer))
    }
}

/// Map a typed answer to a selection: a 1-based index or an exact entry
///
/// Anything else, including an empty line, cancels.
#[must_use]
pub fn interpret_answer(items: &[String], answer: &str) -> Selection {
    let answer = answer.trim();
    if answer.is_empty() {
        return Selection::Cancelled;
    }
    if let Some(item) = items.iter().find(|item| item.as_str() == answer) {
        return Selection::Chosen(item.clone());
    }
    answer
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| items.get(i))
        .map_or(Selection::Cancelled, |item| Selection::Chosen(item.clone()))
}
