//! Page selection parsing
//!
//! Turns user text like `"1-3, 5, 8-10"` into 0-based page indices. This is
//! the only place where 1-based page numbers are converted; every other
//! module works with 0-based indices.
//!
//! Malformed or out-of-range tokens are dropped individually. A selection
//! that yields nothing at all is a validation error, except through
//! `filter_page_list`.

use crate::types::{PagesError, Result};
use std::collections::BTreeSet;

/// Parse a selection into groups, one group per usable token, in token order.
///
/// A range token `a-b` becomes the ascending run `a-1..=b-1` clipped to the
/// document; a bare number `n` becomes `[n-1]`.
pub fn parse_ranges(selection: &str, total_pages: usize) -> Result<Vec<Vec<usize>>> {
    let groups: Vec<Vec<usize>> = selection
        .split(',')
        .filter_map(|token| parse_token(token, total_pages))
        .collect();

    if groups.is_empty() {
        return Err(empty_selection(selection, total_pages));
    }

    Ok(groups)
}

/// Parse a selection into one flat, deduplicated, ascending index list.
pub fn parse_page_list(selection: &str, total_pages: usize) -> Result<Vec<usize>> {
    let pages = filter_page_list(selection, total_pages);
    if pages.is_empty() {
        return Err(empty_selection(selection, total_pages));
    }
    Ok(pages)
}

/// Like `parse_page_list`, but an empty result is an empty list.
///
/// For edits where naming no existing page just leaves the document as is.
pub fn filter_page_list(selection: &str, total_pages: usize) -> Vec<usize> {
    let pages: BTreeSet<usize> = selection
        .split(',')
        .filter_map(|token| parse_token(token, total_pages))
        .flatten()
        .collect();
    pages.into_iter().collect()
}

/// Parse a selection into a flat list in token order, keeping duplicates.
///
/// Used for reordering, where `"3,1-2"` means page 3 first.
pub fn parse_page_sequence(selection: &str, total_pages: usize) -> Result<Vec<usize>> {
    Ok(parse_ranges(selection, total_pages)?.into_iter().flatten().collect())
}

fn parse_token(token: &str, total_pages: usize) -> Option<Vec<usize>> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    let (start, end) = match token.split_once('-') {
        Some((start, end)) => (parse_number(start)?, parse_number(end)?),
        None => {
            let page = parse_number(token)?;
            (page, page)
        }
    };

    if start > end {
        log::debug!("Dropping reversed range {}", token);
        return None;
    }

    let pages: Vec<usize> = (start.max(1)..=end.min(total_pages))
        .map(|page| page - 1)
        .collect();

    if pages.is_empty() {
        log::debug!("Dropping out-of-range token {}", token);
        None
    } else {
        Some(pages)
    }
}

fn parse_number(text: &str) -> Option<usize> {
    text.trim().parse().ok()
}

/// Error for a selection with no usable token, telling "no numbers at all"
/// apart from "numbers, but none inside the document"
fn empty_selection(selection: &str, total_pages: usize) -> PagesError {
    let has_numbers = selection.split(',').any(|token| {
        let token = token.trim();
        match token.split_once('-') {
            Some((start, end)) => parse_number(start).is_some() && parse_number(end).is_some(),
            None => parse_number(token).is_some(),
        }
    });

    if has_numbers {
        PagesError::validation(format!(
            "Pages \"{}\" are outside the document (pages 1-{})",
            selection.trim(),
            total_pages
        ))
    } else {
        PagesError::validation(format!(
            "No page numbers found in \"{}\"",
            selection.trim()
        ))
    }
}
