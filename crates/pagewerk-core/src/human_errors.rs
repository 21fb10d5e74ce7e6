// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the presentation layer.
//
// Every engine error is mapped to plain English with a suggestion and the
// input field the UI should highlight.

use crate::error::PagewerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The user can fix the input and try again.
    Correctable,
    /// The operation was stopped on request.
    Cancelled,
    /// Not fixable by editing the input; likely a bug or pathological file.
    Internal,
}

/// The input the error refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    PageRange,
    SplitSpec(String),
    File(String),
    Image(String),
    Page(u32),
    Batch,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Input to highlight, if any.
    pub field: Option<Field>,
    pub severity: Severity,
}

/// Convert a `PagewerkError` into a `HumanError`.
pub fn humanize_error(err: &PagewerkError) -> HumanError {
    match err {
        PagewerkError::Parse { expression, reason } => HumanError {
            message: "No valid pages selected.".into(),
            suggestion: format!(
                "{reason}. Use \"all\", single pages and ranges like \"1,3,5-7\". (You entered: {expression:?})"
            ),
            field: Some(Field::PageRange),
            severity: Severity::Correctable,
        },

        PagewerkError::InvalidSplit {
            name,
            start,
            end,
            total,
        } => HumanError {
            message: format!("Invalid range: {name}"),
            suggestion: format!(
                "Pages {start}-{end} don't fit this document. Choose pages between 1 and {total}, with the start not after the end."
            ),
            field: Some(Field::SplitSpec(name.clone())),
            severity: Severity::Correctable,
        },

        PagewerkError::Usage(detail) => HumanError {
            message: "This request can't be processed as given.".into(),
            suggestion: detail.clone(),
            field: None,
            severity: Severity::Correctable,
        },

        PagewerkError::UnknownItem(id) => HumanError {
            message: "That file is no longer in the list.".into(),
            suggestion: format!("Refresh the list and try again. (Item: {id})"),
            field: None,
            severity: Severity::Correctable,
        },

        PagewerkError::Intake { file, reason } => HumanError {
            message: "This upload was not accepted.".into(),
            suggestion: format!("{reason}. Remove or shrink it and try again."),
            field: Some(Field::File(file.clone())),
            severity: Severity::Correctable,
        },

        PagewerkError::Decode { file, .. } => HumanError {
            message: format!("We couldn't read {file}."),
            suggestion: "The file may be damaged or not a PDF. Try opening and re-saving it, then upload it again.".into(),
            field: Some(Field::File(file.clone())),
            severity: Severity::Correctable,
        },

        PagewerkError::Convert { item, detail } => HumanError {
            message: format!("We couldn't use the image {item}."),
            suggestion: format!("Try converting it to JPEG or PNG first. ({detail})"),
            field: Some(Field::Image(item.clone())),
            severity: Severity::Correctable,
        },

        PagewerkError::Assemble { file, detail } => HumanError {
            message: format!("Copying pages from {file} failed."),
            suggestion: format!("The document may use features we can't copy. ({detail})"),
            field: Some(Field::File(file.clone())),
            severity: Severity::Internal,
        },

        PagewerkError::Render { page, detail } | PagewerkError::Encode { page, detail } => {
            HumanError {
                message: format!("Page {page} couldn't be turned into an image."),
                suggestion: format!("Try a lower DPI or a different format. ({detail})"),
                field: Some(Field::Page(*page)),
                severity: Severity::Internal,
            }
        }

        PagewerkError::Layout(detail) => HumanError {
            message: "The page layout could not be computed.".into(),
            suggestion: format!("Try a smaller margin or a different page size. ({detail})"),
            field: None,
            severity: Severity::Internal,
        },

        PagewerkError::Cancelled => HumanError {
            message: "The operation was cancelled.".into(),
            suggestion: "Start it again when you're ready.".into(),
            field: None,
            severity: Severity::Cancelled,
        },

        PagewerkError::Io(io_err) => HumanError {
            message: "A file couldn't be read or written.".into(),
            suggestion: format!("Check the path and permissions. ({io_err})"),
            field: None,
            severity: Severity::Correctable,
        },

        PagewerkError::Serialization(err) => HumanError {
            message: "The settings file is not valid.".into(),
            suggestion: format!("Fix the JSON and try again. ({err})"),
            field: None,
            severity: Severity::Correctable,
        },
    }
}
