//! Comma-separated id-list parsing.
//!
//! Selection arguments arrive as ASCII lists like `"12,15,2001"`. Parsing is
//! strict: every component must be a decimal integer of at most
//! [`MAX_ID_DIGITS`] digits. An empty component terminates the list, so a
//! trailing comma is accepted the same way an exhausted input is.

use crate::error::{BvfsError, BvfsResult};

/// Longest accepted id component, in digits.
pub const MAX_ID_DIGITS: usize = 30;

/// Incremental parser over a comma-separated id list.
///
/// Yields one `Result<i64>` per component; iteration ends at the end of the
/// input or at the first empty component.
#[derive(Debug, Clone)]
pub struct IdList<'a> {
    rest: &'a str,
    field: &'static str,
}

impl<'a> IdList<'a> {
    /// `field` names the argument in error messages.
    #[must_use]
    pub fn new(input: &'a str, field: &'static str) -> Self {
        Self {
            rest: input,
            field,
        }
    }
}

impl Iterator for IdList<'_> {
    type Item = BvfsResult<i64>;

    fn next(&mut self) -> Option<Self::Item> {
        let (component, rest) = match self.rest.split_once(',') {
            Some((component, rest)) => (component, rest),
            None => (self.rest, ""),
        };
        if component.is_empty() {
            self.rest = "";
            return None;
        }
        self.rest = rest;

        if component.len() > MAX_ID_DIGITS {
            return Some(Err(BvfsError::invalid_argument(
                self.field,
                component,
                format!("id component exceeds {MAX_ID_DIGITS} digits"),
            )));
        }
        if !component.bytes().all(|b| b.is_ascii_digit()) {
            return Some(Err(BvfsError::invalid_argument(
                self.field,
                component,
                "id component is not a decimal number",
            )));
        }
        Some(component.parse::<i64>().map_err(|_| {
            BvfsError::invalid_argument(self.field, component, "id component does not fit in i64")
        }))
    }
}

/// Parse the whole list, failing on the first bad component.
pub fn parse_id_list(input: &str, field: &'static str) -> BvfsResult<Vec<i64>> {
    IdList::new(input, field).collect()
}

/// Parse a hardlink selection: `(job_id, file_index)` pairs.
///
/// An odd number of ids is a contract violation; hardlink items always come
/// two by two.
pub fn parse_id_pairs(input: &str, field: &'static str) -> BvfsResult<Vec<(i64, i64)>> {
    let ids = parse_id_list(input, field)?;
    if ids.len() % 2 != 0 {
        return Err(BvfsError::invalid_argument(
            field,
            input,
            "expected an even number of ids (jobid,fileindex pairs)",
        ));
    }
    Ok(ids.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect())
}
