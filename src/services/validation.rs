use chrono::NaiveDate;

use crate::constants::MSG_POSTING_DATE_FUTURE;
use crate::models::transfer::{TransferDraft, TransferError, TransferField, ValidationMessages};

/// Optional rules that differ between deployments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormRules {
    /// Reject transfers without a remark
    pub require_remark: bool,
}

pub fn quantity_exceeds_message(available: f64) -> String {
    format!("Quantity cannot exceed available stock ({available}).")
}

/// Validate a draft against the quantity currently available in the source location.
///
/// Returns one message per failing field; an empty map means the draft can be submitted.
pub fn validate(
    draft: &TransferDraft,
    available: f64,
    today: NaiveDate,
    rules: FormRules,
) -> ValidationMessages {
    let mut messages = ValidationMessages::new();

    let required = [
        (TransferField::FromWarehouse, &draft.from_warehouse),
        (TransferField::FromBin, &draft.from_bin),
        (TransferField::ToWarehouse, &draft.to_warehouse),
        (TransferField::ToBin, &draft.to_bin),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            messages.insert(field, format!("{} is required.", field.label()));
        }
    }

    if !messages.contains_key(&TransferField::ToBin)
        && !messages.contains_key(&TransferField::FromBin)
        && draft.from_bin == draft.to_bin
    {
        messages.insert(
            TransferField::ToBin,
            "Source and destination bins cannot be the same.".to_string(),
        );
    }

    match draft.quantity {
        Some(quantity) if quantity > 0.0 => {
            if quantity > available {
                messages.insert(TransferField::Quantity, quantity_exceeds_message(available));
            }
        }
        _ => {
            messages.insert(
                TransferField::Quantity,
                "Quantity must be greater than zero.".to_string(),
            );
        }
    }

    if draft.posting_date > today {
        messages.insert(TransferField::PostingDate, MSG_POSTING_DATE_FUTURE.to_string());
    }

    if rules.require_remark && draft.remark.trim().is_empty() {
        messages.insert(TransferField::Remark, "Remark is required.".to_string());
    }

    messages
}

/// `validate` as a `Result`, for callers that must not proceed on a bad draft
pub fn ensure_valid(
    draft: &TransferDraft,
    available: f64,
    today: NaiveDate,
    rules: FormRules,
) -> Result<(), TransferError> {
    let messages = validate(draft, available, today, rules);
    if messages.is_empty() {
        Ok(())
    } else {
        Err(TransferError::ValidationFailed(messages))
    }
}
