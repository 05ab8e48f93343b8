//! CSV replay format for the command-line binary.
//!
//! One operation per row. Columns not used by an operation type stay empty:
//!
//! ```text
//! type,actor,tx,product,reference,amount,arg
//! list,10,,101,,100.00,
//! capture,20,,101,REF001,100.00,
//! receipt,20,,,REF001,,received
//! release,1,1,,,,
//! ```

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::UserAccount;
use crate::model::{CaptureRequest, Operation, ReceiptOutcome};
use crate::Amount;

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: csv::Error,
    },

    #[error("line {line}: unrecognized operation type '{op}'")]
    UnrecognizedType { line: usize, op: String },

    #[error("line {line}: {op} is missing {field}")]
    MissingField {
        line: usize,
        op: &'static str,
        field: &'static str,
    },

    #[error("line {line}: receipt outcome must be 'received' or 'not_received', got '{value}'")]
    InvalidOutcome { line: usize, value: String },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    actor: Option<u32>,
    tx: Option<u64>,
    product: Option<u32>,
    reference: Option<String>,
    amount: Option<f64>,
    arg: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    user: u32,
    wallet: String,
    pending: String,
    total: String,
}

impl From<&UserAccount> for OutputRow {
    fn from(account: &UserAccount) -> Self {
        Self {
            user: account.id(),
            wallet: account.wallet_balance().to_string(),
            pending: account.pending_earnings().to_string(),
            total: account.total_earnings().to_string(),
        }
    }
}

/// Parses the operations file. Row errors are yielded in place so the caller
/// can log and keep going.
pub fn read_operations(path: &Path) -> impl Iterator<Item = Result<Operation, CsvError>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("operations file should be readable");

    let rows: Vec<Result<Operation, CsvError>> = reader
        .deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, row)| {
            // Header occupies line 1.
            let line = idx + 2;
            match row {
                Ok(row) => parse_row(line, row),
                Err(source) => Err(CsvError::Parse { line, source }),
            }
        })
        .collect();
    rows.into_iter()
}

fn parse_row(line: usize, row: InputRow) -> Result<Operation, CsvError> {
    match row.r#type.as_str() {
        "list" => Ok(Operation::ListProduct {
            product: require(line, "list", "product", row.product)?,
            seller: require(line, "list", "actor", row.actor)?,
            price: Amount::from_float(require(line, "list", "amount", row.amount)?),
        }),
        "admin" => Ok(Operation::GrantAdmin {
            user: require(line, "admin", "actor", row.actor)?,
        }),
        "capture" => {
            let reference = require(line, "capture", "reference", row.reference)?;
            Ok(Operation::Capture(CaptureRequest {
                provider_tx_id: format!("PSP_{reference}"),
                reference,
                buyer: require(line, "capture", "actor", row.actor)?,
                product: require(line, "capture", "product", row.product)?,
                amount: Amount::from_float(require(line, "capture", "amount", row.amount)?),
                paid_at: Utc::now(),
            }))
        }
        "code" => Ok(Operation::ConfirmCode {
            tx: require(line, "code", "tx", row.tx)?,
            seller: require(line, "code", "actor", row.actor)?,
            code: require(line, "code", "arg", row.arg)?,
        }),
        "receipt" => {
            let value = require(line, "receipt", "arg", row.arg)?;
            let outcome = match value.as_str() {
                "received" => ReceiptOutcome::Received,
                "not_received" => ReceiptOutcome::NotReceived,
                _ => return Err(CsvError::InvalidOutcome { line, value }),
            };
            Ok(Operation::ConfirmReceipt {
                reference: require(line, "receipt", "reference", row.reference)?,
                buyer: require(line, "receipt", "actor", row.actor)?,
                outcome,
                note: None,
            })
        }
        "release" => Ok(Operation::Release {
            tx: require(line, "release", "tx", row.tx)?,
            admin: require(line, "release", "actor", row.actor)?,
        }),
        "refund" => Ok(Operation::Refund {
            tx: require(line, "refund", "tx", row.tx)?,
            admin: require(line, "refund", "actor", row.actor)?,
        }),
        "cancel" => Ok(Operation::Cancel {
            tx: require(line, "cancel", "tx", row.tx)?,
            admin: require(line, "cancel", "actor", row.actor)?,
        }),
        other => Err(CsvError::UnrecognizedType {
            line,
            op: other.to_string(),
        }),
    }
}

fn require<T>(
    line: usize,
    op: &'static str,
    field: &'static str,
    value: Option<T>,
) -> Result<T, CsvError> {
    value.ok_or(CsvError::MissingField { line, op, field })
}

/// Writes final account balances as CSV, ordered by user id.
pub fn write_balances<'a, W: std::io::Write>(
    writer: W,
    accounts: impl IntoIterator<Item = &'a UserAccount>,
) {
    let mut accounts: Vec<&UserAccount> = accounts.into_iter().collect();
    accounts.sort_by_key(|account| account.id());

    let mut writer = csv::Writer::from_writer(writer);
    for account in accounts {
        writer
            .serialize(OutputRow::from(account))
            .expect("balance row should serialize");
    }
    writer.flush().expect("output should be writable");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn parse(content: &str) -> Vec<Result<Operation, CsvError>> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        read_operations(file.path()).collect()
    }

    #[test]
    fn parses_a_full_lifecycle() {
        let ops = parse(
            "type,actor,tx,product,reference,amount,arg\n\
             list,10,,101,,100.00,\n\
             admin,1,,,,,\n\
             capture,20,,101,REF001,100.00,\n\
             code,10,1,,,,1234\n\
             receipt,20,,,REF001,,received\n\
             release,1,1,,,,\n\
             refund,1,2,,,,\n\
             cancel,1,3,,,,\n",
        );

        assert_eq!(ops.len(), 8);
        assert!(matches!(
            ops[0],
            Ok(Operation::ListProduct {
                product: 101,
                seller: 10,
                ..
            })
        ));
        assert!(matches!(ops[1], Ok(Operation::GrantAdmin { user: 1 })));
        match &ops[2] {
            Ok(Operation::Capture(req)) => {
                assert_eq!(req.reference, "REF001");
                assert_eq!(req.provider_tx_id, "PSP_REF001");
                assert_eq!(req.buyer, 20);
                assert_eq!(req.amount, Amount::from_major(100));
            }
            other => panic!("expected capture, got {other:?}"),
        }
        assert!(matches!(
            ops[3],
            Ok(Operation::ConfirmCode { tx: 1, seller: 10, .. })
        ));
        assert!(matches!(
            ops[4],
            Ok(Operation::ConfirmReceipt {
                buyer: 20,
                outcome: ReceiptOutcome::Received,
                ..
            })
        ));
        assert!(matches!(ops[5], Ok(Operation::Release { tx: 1, admin: 1 })));
        assert!(matches!(ops[6], Ok(Operation::Refund { tx: 2, admin: 1 })));
        assert!(matches!(ops[7], Ok(Operation::Cancel { tx: 3, admin: 1 })));
    }

    #[test]
    fn unknown_type_reports_line_number() {
        let ops = parse(
            "type,actor,tx,product,reference,amount,arg\n\
             list,10,,101,,100.00,\n\
             teleport,1,,,,,\n",
        );
        assert!(ops[0].is_ok());
        match &ops[1] {
            Err(CsvError::UnrecognizedType { line: 3, op }) => assert_eq!(op, "teleport"),
            other => panic!("expected unrecognized type, got {other:?}"),
        }
    }

    #[test]
    fn missing_field_is_reported() {
        let ops = parse(
            "type,actor,tx,product,reference,amount,arg\n\
             capture,20,,101,REF001,,\n",
        );
        match &ops[0] {
            Err(CsvError::MissingField {
                line: 2,
                op: "capture",
                field: "amount",
            }) => {}
            other => panic!("expected missing field, got {other:?}"),
        }
    }

    #[test]
    fn invalid_receipt_outcome_is_reported() {
        let ops = parse(
            "type,actor,tx,product,reference,amount,arg\n\
             receipt,20,,,REF001,,maybe\n",
        );
        match &ops[0] {
            Err(CsvError::InvalidOutcome { line: 2, value }) => assert_eq!(value, "maybe"),
            other => panic!("expected invalid outcome, got {other:?}"),
        }
    }

    #[test]
    fn bad_row_does_not_poison_later_rows() {
        let ops = parse(
            "type,actor,tx,product,reference,amount,arg\n\
             capture,not_a_number,,101,REF001,100.00,\n\
             admin,1,,,,,\n",
        );
        assert!(matches!(ops[0], Err(CsvError::Parse { line: 2, .. })));
        assert!(matches!(ops[1], Ok(Operation::GrantAdmin { user: 1 })));
    }

    #[test]
    fn balances_are_written_sorted_by_user() {
        let older = UserAccount::new(30);
        let younger = UserAccount::new(4);

        let mut out = Vec::new();
        write_balances(&mut out, [&older, &younger]);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "user,wallet,pending,total\n\
             4,0.00,0.00,0.00\n\
             30,0.00,0.00,0.00\n"
        );
    }
}
