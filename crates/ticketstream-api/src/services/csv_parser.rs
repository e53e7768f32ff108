//! CSV submission parsing and per-row semantic validation.
//!
//! Rows that fail validation are dropped and reported; the submission as
//! a whole fails only on pre-read checks, missing required columns, the
//! bulk-reject threshold, or the post-parse count limits.

use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::validation::{
    self, cell, column_index, has_allowed_extension, missing_required,
};
use ticketstream_core::model::{MAX_DESCRIPTION_LEN, MAX_TICKET_NUMBER_LEN, MAX_TITLE_LEN};
use ticketstream_core::{BulkConfig, TicketPriority, TicketRecord, TicketStatus};

/// A rejected or annotated row.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 1-based line number (header is line 1).
    pub line_number: usize,
    /// Column the error is attached to.
    pub column: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl RowError {
    fn new(line_number: usize, column: &str, message: impl Into<String>) -> Self {
        Self {
            line_number,
            column: column.to_string(),
            message: message.into(),
            value: None,
        }
    }

    fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Result of parsing a submission.
#[derive(Debug)]
pub struct CsvParseOutcome {
    /// Accepted records in file order.
    pub records: Vec<TicketRecord>,
    /// Row-level errors (rejected rows and default substitutions).
    pub row_errors: Vec<RowError>,
    /// Data rows observed, excluding the header.
    pub rows_seen: usize,
}

/// Submission-level parse failures.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The upload had no content.
    #[error("Uploaded file is empty")]
    EmptyFile,

    /// The filename extension is not accepted.
    #[error("Invalid file type '{filename}': expected one of {:?}", validation::ALLOWED_EXTENSIONS)]
    InvalidFileType { filename: String },

    /// The upload exceeds the size limit.
    #[error("File size {size} bytes exceeds maximum of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    /// The header row is absent or unreadable.
    #[error("CSV file has no readable header row: {cause}")]
    MissingHeader { cause: String },

    /// Required columns are absent; all of them are listed.
    #[error("Missing required columns: {}", missing.join(", "))]
    MissingRequiredColumns { missing: Vec<String> },

    /// Row errors crossed the bulk-reject threshold.
    #[error("Too many validation errors ({errors} across {rows} rows); review the file format")]
    TooManyRowErrors {
        errors: usize,
        rows: usize,
        row_errors: Vec<RowError>,
    },

    /// More accepted records than the batch limit allows.
    #[error("Batch size {count} exceeds maximum allowed {max}")]
    BatchSizeExceeded { count: usize, max: usize },
}

/// Parse and validate a submission.
///
/// `data` is decoded as UTF-8 delimited text with the first row as
/// header. Returns accepted records plus the row-error report; fails
/// only for whole-submission conditions.
pub fn parse_submission(
    filename: &str,
    data: &[u8],
    cfg: &BulkConfig,
) -> Result<CsvParseOutcome, ParseError> {
    if data.is_empty() {
        return Err(ParseError::EmptyFile);
    }
    if !has_allowed_extension(filename) {
        return Err(ParseError::InvalidFileType {
            filename: filename.to_string(),
        });
    }
    if data.len() as u64 > cfg.max_file_size_bytes() {
        return Err(ParseError::FileTooLarge {
            size: data.len() as u64,
            max: cfg.max_file_size_bytes(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| ParseError::MissingHeader {
            cause: e.to_string(),
        })?
        .clone();
    let columns = column_index(&headers);
    let missing = missing_required(&columns);
    if !missing.is_empty() {
        warn!(filename, missing = ?missing, "Submission missing required columns");
        return Err(ParseError::MissingRequiredColumns { missing });
    }

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut seen_ticket_numbers: HashSet<String> = HashSet::new();
    let mut rows_seen = 0usize;

    for (idx, row) in reader.records().enumerate() {
        let line_number = idx + 2;
        rows_seen += 1;

        let row = match row {
            Ok(row) => row,
            Err(e) => {
                row_errors.push(RowError::new(
                    line_number,
                    "row",
                    format!("Failed to parse row: {e}"),
                ));
                continue;
            }
        };

        if let Some(record) = parse_row(
            &row,
            &columns,
            line_number,
            &mut seen_ticket_numbers,
            &mut row_errors,
        ) {
            seen_ticket_numbers.insert(record.ticket_number.clone());
            records.push(record);
        }
    }

    info!(
        filename,
        rows_seen,
        accepted = records.len(),
        row_errors = row_errors.len(),
        "Submission parsed"
    );

    // Bulk-reject: mostly-broken files fail as a whole rather than
    // trickling hundreds of row errors into a tiny accepted set.
    let threshold = (rows_seen as f64 * 0.5).max(10.0);
    if row_errors.len() as f64 > threshold {
        return Err(ParseError::TooManyRowErrors {
            errors: row_errors.len(),
            rows: rows_seen,
            row_errors,
        });
    }

    if records.len() > cfg.max_records {
        return Err(ParseError::BatchSizeExceeded {
            count: records.len(),
            max: cfg.max_records,
        });
    }

    Ok(CsvParseOutcome {
        records,
        row_errors,
        rows_seen,
    })
}

fn parse_row(
    row: &csv::StringRecord,
    columns: &std::collections::HashMap<String, usize>,
    line_number: usize,
    seen: &mut HashSet<String>,
    errors: &mut Vec<RowError>,
) -> Option<TicketRecord> {
    let Some(ticket_number) = cell(row, columns, "ticketnumber") else {
        errors.push(RowError::new(
            line_number,
            "ticketNumber",
            "Ticket number is required",
        ));
        return None;
    };
    if ticket_number.len() > MAX_TICKET_NUMBER_LEN {
        errors.push(
            RowError::new(
                line_number,
                "ticketNumber",
                format!("Ticket number exceeds {MAX_TICKET_NUMBER_LEN} characters"),
            )
            .with_value(ticket_number),
        );
        return None;
    }
    if seen.contains(ticket_number) {
        errors.push(
            RowError::new(line_number, "ticketNumber", "Duplicate ticket number in file")
                .with_value(ticket_number),
        );
        return None;
    }

    let Some(title) = cell(row, columns, "title") else {
        errors.push(RowError::new(line_number, "title", "Title is required"));
        return None;
    };
    if title.len() > MAX_TITLE_LEN {
        errors.push(
            RowError::new(
                line_number,
                "title",
                format!("Title exceeds {MAX_TITLE_LEN} characters"),
            )
            .with_value(title.len().to_string()),
        );
        return None;
    }

    let customer_id = match cell(row, columns, "customerid") {
        Some(raw) => match raw.parse::<i64>() {
            Ok(id) if id > 0 => id,
            Ok(_) => {
                errors.push(
                    RowError::new(line_number, "customerId", "Customer ID must be positive")
                        .with_value(raw),
                );
                return None;
            }
            Err(_) => {
                errors.push(
                    RowError::new(line_number, "customerId", "Invalid customer ID format")
                        .with_value(raw),
                );
                return None;
            }
        },
        None => {
            errors.push(RowError::new(
                line_number,
                "customerId",
                "Customer ID is required",
            ));
            return None;
        }
    };

    let description = cell(row, columns, "description").map(|d| {
        if d.len() > MAX_DESCRIPTION_LEN {
            debug!(line_number, "Description truncated");
            truncate_utf8(d, MAX_DESCRIPTION_LEN).to_string()
        } else {
            d.to_string()
        }
    });

    // Unknown status/priority values fall back to defaults: the row is
    // accepted but the substitution is reported.
    let status = match cell(row, columns, "status") {
        Some(raw) => TicketStatus::from_str(raw).unwrap_or_else(|_| {
            errors.push(
                RowError::new(line_number, "status", "Invalid status value").with_value(raw),
            );
            TicketStatus::default()
        }),
        None => TicketStatus::default(),
    };
    let priority = match cell(row, columns, "priority") {
        Some(raw) => TicketPriority::from_str(raw).unwrap_or_else(|_| {
            errors.push(
                RowError::new(line_number, "priority", "Invalid priority value").with_value(raw),
            );
            TicketPriority::default()
        }),
        None => TicketPriority::default(),
    };

    // Unparseable or non-positive assignees are dropped silently.
    let assignee_id = cell(row, columns, "assignedto")
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|id| *id > 0);

    Some(TicketRecord {
        ticket_number: ticket_number.to_string(),
        title: title.to_string(),
        customer_id,
        description,
        status,
        priority,
        assignee_id,
    })
}

/// Truncate at a char boundary at or below `max_bytes`.
fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> BulkConfig {
        BulkConfig::default()
    }

    fn parse(data: &str) -> Result<CsvParseOutcome, ParseError> {
        parse_submission("tickets.csv", data.as_bytes(), &cfg())
    }

    #[test]
    fn test_happy_path() {
        let outcome = parse(
            "ticketnumber,title,customerid\n\
             TKT-001,Login,1001\n\
             TKT-002,Reset,1002\n\
             TKT-003,Dash,1003\n",
        )
        .unwrap();
        assert_eq!(outcome.rows_seen, 3);
        assert_eq!(outcome.records.len(), 3);
        assert!(outcome.row_errors.is_empty());
        assert_eq!(outcome.records[0].ticket_number, "TKT-001");
        assert_eq!(outcome.records[0].customer_id, 1001);
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(parse(""), Err(ParseError::EmptyFile)));
    }

    #[test]
    fn test_extension_check() {
        let result = parse_submission("tickets.xlsx", b"a,b\n1,2\n", &cfg());
        assert!(matches!(result, Err(ParseError::InvalidFileType { .. })));
    }

    #[test]
    fn test_file_too_large() {
        let cfg = BulkConfig::builder().max_file_size_mib(0).build();
        let result = parse_submission("tickets.csv", b"ticketnumber,title,customerid\n", &cfg);
        assert!(matches!(result, Err(ParseError::FileTooLarge { .. })));
    }

    #[test]
    fn test_missing_columns_lists_all() {
        let result = parse("title,notes\nLogin,x\n");
        match result {
            Err(ParseError::MissingRequiredColumns { missing }) => {
                assert_eq!(missing, vec!["ticketnumber", "customerid"]);
            }
            other => panic!("expected MissingRequiredColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_header_normalization() {
        let outcome = parse(
            "Ticket Number,TITLE,Customer_Id\n\
             TKT-001,Login,1001\n",
        )
        .unwrap();
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn test_invalid_customer_id_drops_row() {
        let outcome = parse(
            "ticketnumber,title,customerid\n\
             TKT-001,Login,1001\n\
             TKT-002,Reset,abc\n\
             TKT-003,Dash,1003\n",
        )
        .unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.row_errors.len(), 1);
        assert_eq!(outcome.row_errors[0].line_number, 3);
        assert_eq!(outcome.row_errors[0].column, "customerId");
    }

    #[test]
    fn test_non_positive_customer_id_rejected() {
        let outcome = parse("ticketnumber,title,customerid\nTKT-001,Login,0\n").unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.row_errors.len(), 1);
    }

    #[test]
    fn test_duplicate_in_file_rejected() {
        let outcome = parse(
            "ticketnumber,title,customerid\n\
             TKT-001,Login,1001\n\
             TKT-001,Again,1002\n",
        )
        .unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.row_errors.len(), 1);
        assert_eq!(outcome.row_errors[0].message, "Duplicate ticket number in file");
    }

    #[test]
    fn test_missing_title_and_number() {
        let outcome = parse(
            "ticketnumber,title,customerid\n\
             ,Login,1001\n\
             TKT-002,,1002\n",
        )
        .unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.row_errors.len(), 2);
        assert_eq!(outcome.row_errors[0].column, "ticketNumber");
        assert_eq!(outcome.row_errors[1].column, "title");
    }

    #[test]
    fn test_title_length_limit() {
        let long_title = "x".repeat(256);
        let outcome = parse(&format!(
            "ticketnumber,title,customerid\nTKT-001,{long_title},1001\n"
        ))
        .unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.row_errors[0].column, "title");
    }

    #[test]
    fn test_description_truncated_not_rejected() {
        let long_desc = "d".repeat(6000);
        let outcome = parse(&format!(
            "ticketnumber,title,customerid,description\nTKT-001,Login,1001,{long_desc}\n"
        ))
        .unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(
            outcome.records[0].description.as_ref().unwrap().len(),
            MAX_DESCRIPTION_LEN
        );
        assert!(outcome.row_errors.is_empty());
    }

    #[test]
    fn test_invalid_status_defaults_with_row_error() {
        let outcome = parse(
            "ticketnumber,title,customerid,status,priority\n\
             TKT-001,Login,1001,ARCHIVED,urgent\n",
        )
        .unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].status, TicketStatus::Open);
        assert_eq!(outcome.records[0].priority, TicketPriority::Medium);
        assert_eq!(outcome.row_errors.len(), 2);
    }

    #[test]
    fn test_valid_enums_accepted() {
        let outcome = parse(
            "ticketnumber,title,customerid,status,priority\n\
             TKT-001,Login,1001,on_hold,CRITICAL\n",
        )
        .unwrap();
        assert_eq!(outcome.records[0].status, TicketStatus::OnHold);
        assert_eq!(outcome.records[0].priority, TicketPriority::Critical);
    }

    #[test]
    fn test_assignee_dropped_when_invalid() {
        let outcome = parse(
            "ticketnumber,title,customerid,assignedto\n\
             TKT-001,Login,1001,7\n\
             TKT-002,Reset,1002,zero\n\
             TKT-003,Dash,1003,-3\n",
        )
        .unwrap();
        assert_eq!(outcome.records[0].assignee_id, Some(7));
        assert_eq!(outcome.records[1].assignee_id, None);
        assert_eq!(outcome.records[2].assignee_id, None);
        assert!(outcome.row_errors.is_empty());
    }

    #[test]
    fn test_bulk_reject_threshold() {
        // 30 rows, 16 bad: errors > max(10, 15) triggers the reject.
        let mut data = String::from("ticketnumber,title,customerid\n");
        for i in 0..14 {
            data.push_str(&format!("TKT-{i:03},Login,1001\n"));
        }
        for _ in 0..16 {
            data.push_str(",missing,1001\n");
        }
        let result = parse(&data);
        match result {
            Err(ParseError::TooManyRowErrors { errors, rows, .. }) => {
                assert_eq!(errors, 16);
                assert_eq!(rows, 30);
            }
            other => panic!("expected TooManyRowErrors, got {other:?}"),
        }
    }

    #[test]
    fn test_under_threshold_passes_with_errors() {
        // 3 rows, 1 bad: threshold is max(10, 1.5) = 10, so parse succeeds.
        let outcome = parse(
            "ticketnumber,title,customerid\n\
             TKT-001,Login,1001\n\
             TKT-002,Reset,abc\n\
             TKT-003,Dash,1003\n",
        )
        .unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.row_errors.len(), 1);
    }

    #[test]
    fn test_batch_size_boundary() {
        let cfg = BulkConfig::builder().max_records(5).build();
        let mut data = String::from("ticketnumber,title,customerid\n");
        for i in 0..5 {
            data.push_str(&format!("TKT-{i:03},Login,1001\n"));
        }
        // Exactly at the limit: accepted.
        assert!(parse_submission("t.csv", data.as_bytes(), &cfg).is_ok());

        data.push_str("TKT-005,Login,1001\n");
        // One more: rejected.
        let result = parse_submission("t.csv", data.as_bytes(), &cfg);
        assert!(matches!(
            result,
            Err(ParseError::BatchSizeExceeded { count: 6, max: 5 })
        ));
    }

    #[test]
    fn test_truncate_utf8_respects_boundaries() {
        let s = "aé";
        assert_eq!(truncate_utf8(s, 2), "a");
        assert_eq!(truncate_utf8(s, 3), "aé");
        assert_eq!(truncate_utf8("abc", 10), "abc");
    }
}
