use crate::models::transfer::{
    BatchNumberLine, BatchStockRecord, BinActionType, BinAllocation, BinLocation,
    StockTransferLine, StockTransferRequest, TransferError, TransferSummary,
};

/// Resolve a bin code to the ERP's internal bin id
pub fn resolve_bin_abs_entry(
    bin_locations: &[BinLocation],
    bin_code: &str,
) -> Result<i64, TransferError> {
    bin_locations
        .iter()
        .find(|location| location.bin_code == bin_code)
        .map(|location| location.abs_entry)
        .ok_or_else(|| TransferError::UnknownBin {
            bin_code: bin_code.to_string(),
        })
}

/// Build the stock transfer document for a confirmed summary.
///
/// One line is emitted per stock record held in the source warehouse and bin, each
/// carrying a paired from/to bin allocation for the full transfer quantity.
pub fn build_transfer_request(
    summary: &TransferSummary,
    records: &[BatchStockRecord],
    bin_locations: &[BinLocation],
    journal_memo: Option<&str>,
) -> Result<StockTransferRequest, TransferError> {
    let journal_memo = journal_memo
        .filter(|memo| !memo.trim().is_empty())
        .ok_or(TransferError::MissingJournalMemo)?;

    let from_bin_abs_entry = resolve_bin_abs_entry(bin_locations, &summary.from_bin)?;
    let to_bin_abs_entry = resolve_bin_abs_entry(bin_locations, &summary.to_bin)?;

    let lines: Vec<StockTransferLine> = records
        .iter()
        .filter(|record| {
            record.bin_code == summary.from_bin && record.whs_code == summary.from_warehouse
        })
        .map(|record| StockTransferLine {
            item_code: record.item_code.clone(),
            quantity: summary.quantity,
            warehouse_code: summary.to_warehouse.clone(),
            from_warehouse_code: record.whs_code.clone(),
            serial_numbers: Vec::new(),
            batch_numbers: vec![BatchNumberLine {
                batch_number: record.dist_number.clone(),
                quantity: summary.quantity,
            }],
            stock_transfer_lines_bin_allocations: vec![
                BinAllocation {
                    bin_abs_entry: from_bin_abs_entry,
                    bin_action_type: BinActionType::FromWarehouse,
                    quantity: summary.quantity,
                    serial_and_batch_numbers_base_line: 0,
                },
                BinAllocation {
                    bin_abs_entry: to_bin_abs_entry,
                    bin_action_type: BinActionType::ToWarehouse,
                    quantity: summary.quantity,
                    serial_and_batch_numbers_base_line: 0,
                },
            ],
        })
        .collect();

    if lines.is_empty() {
        return Err(TransferError::InvalidInput(format!(
            "No stock records found in bin '{}' of warehouse '{}'",
            summary.from_bin, summary.from_warehouse
        )));
    }

    Ok(StockTransferRequest {
        journal_memo: journal_memo.to_string(),
        comments: summary.remark.clone(),
        doc_date: summary.posting_date,
        from_warehouse: summary.from_warehouse.clone(),
        to_warehouse: summary.to_warehouse.clone(),
        stock_transfer_lines: lines,
    })
}
