//! Transfer form state.
//!
//! The form is a plain value that only changes through [`TransferForm::reduce`].
//! Option lists and the available quantity are computed from the current state on
//! every read, so a selection can never point at a list that has since changed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::{
    MSG_NO_DATA_FOUND, MSG_POSTING_DATE_FUTURE, MSG_QUANTITY_NEGATIVE, MSG_TRANSFER_FAILED,
};
use crate::models::transfer::{
    BatchStockRecord, BinLocation, TransferDraft, TransferField, TransferSummary,
    ValidationMessages,
};
use crate::services::validation::{quantity_exceeds_message, validate, FormRules};

#[derive(Debug, Clone, PartialEq)]
pub enum FormAction {
    BinLocationsLoaded(Vec<BinLocation>),
    JournalMemoLoaded(Option<String>),
    SearchTermChanged(String),
    SearchStarted,
    SearchSucceeded(Vec<BatchStockRecord>),
    SearchFailed(String),
    FromWarehouseSelected(String),
    FromBinSelected(String),
    ToWarehouseSelected(String),
    ToBinSelected(String),
    QuantityChanged(Option<f64>),
    PostingDateChanged { date: NaiveDate, today: NaiveDate },
    RemarkChanged(String),
    TransferRequested { today: NaiveDate, rules: FormRules },
    TransferAborted,
    TransferCompleted { doc_entry: String, today: NaiveDate },
    TransferFailed { today: NaiveDate },
    ErrorRaised(String),
    ClearAll { today: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransferForm {
    pub search_term: String,
    pub records: Vec<BatchStockRecord>,
    pub bin_locations: Vec<BinLocation>,
    pub journal_memo: Option<String>,
    pub draft: TransferDraft,
    pub validation_messages: ValidationMessages,
    pub error_message: Option<String>,
    pub notice: Option<String>,
    pub pending: Option<TransferSummary>,
}

/// What the browser renders
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormView {
    pub search_term: String,
    pub item_code: Option<String>,
    pub item_name: Option<String>,
    pub batch_number: Option<String>,
    pub from_warehouse_options: Vec<String>,
    pub from_bin_options: Vec<String>,
    pub to_warehouse_options: Vec<String>,
    pub to_bin_options: Vec<String>,
    pub draft: TransferDraft,
    pub available_quantity: f64,
    pub validation_messages: ValidationMessages,
    pub error_message: Option<String>,
    pub notice: Option<String>,
    pub confirmation: Option<TransferSummary>,
    pub journal_memo: Option<String>,
}

/// Distinct values in first-seen order
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        if !seen.iter().any(|v| v == value) {
            seen.push(value.to_string());
        }
    }
    seen
}

impl TransferForm {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            search_term: String::new(),
            records: Vec::new(),
            bin_locations: Vec::new(),
            journal_memo: None,
            draft: TransferDraft::new(today),
            validation_messages: ValidationMessages::new(),
            error_message: None,
            notice: None,
            pending: None,
        }
    }

    pub fn source_warehouses(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.whs_code.as_str()))
    }

    pub fn source_bins(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.bin_code.as_str()))
    }

    /// Source bins belonging to the selected source warehouse (bin codes are prefixed by it)
    pub fn source_bin_options(&self) -> Vec<String> {
        let warehouse = self.draft.from_warehouse.as_str();
        self.source_bins()
            .into_iter()
            .filter(|bin| bin.starts_with(warehouse))
            .collect()
    }

    pub fn destination_warehouses(&self) -> Vec<String> {
        distinct(self.bin_locations.iter().map(|l| l.warehouse.as_str()))
    }

    pub fn destination_bin_options(&self) -> Vec<String> {
        let warehouse = self.draft.to_warehouse.as_str();
        distinct(
            self.bin_locations
                .iter()
                .filter(|l| l.warehouse == warehouse)
                .map(|l| l.bin_code.as_str()),
        )
    }

    /// On-hand quantity of the selected bin, or of the whole source warehouse when no
    /// bin is picked. Before any warehouse is picked, the first warehouse of the search
    /// result is used.
    pub fn available_quantity(&self) -> f64 {
        if !self.draft.from_bin.is_empty() {
            return self
                .records
                .iter()
                .filter(|r| r.bin_code == self.draft.from_bin)
                .map(|r| r.on_hand_qty)
                .sum();
        }

        let warehouse = if self.draft.from_warehouse.is_empty() {
            match self.records.first() {
                Some(record) => record.whs_code.as_str(),
                None => return 0.0,
            }
        } else {
            self.draft.from_warehouse.as_str()
        };

        self.records
            .iter()
            .filter(|r| r.whs_code == warehouse)
            .map(|r| r.on_hand_qty)
            .sum()
    }

    pub fn view(&self) -> FormView {
        let first = self.records.first();
        FormView {
            search_term: self.search_term.clone(),
            item_code: first.map(|r| r.item_code.clone()),
            item_name: first.map(|r| r.item_name.clone()),
            batch_number: first.map(|r| r.dist_number.clone()),
            from_warehouse_options: self.source_warehouses(),
            from_bin_options: self.source_bin_options(),
            to_warehouse_options: self.destination_warehouses(),
            to_bin_options: self.destination_bin_options(),
            draft: self.draft.clone(),
            available_quantity: self.available_quantity(),
            validation_messages: self.validation_messages.clone(),
            error_message: self.error_message.clone(),
            notice: self.notice.clone(),
            confirmation: self.pending.clone(),
            journal_memo: self.journal_memo.clone(),
        }
    }

    pub fn reduce(mut self, action: FormAction) -> Self {
        match action {
            FormAction::BinLocationsLoaded(locations) => {
                self.bin_locations = locations;
                self.reconcile_selections()
            }
            FormAction::JournalMemoLoaded(memo) => {
                self.journal_memo = memo;
                self
            }
            FormAction::SearchTermChanged(term) => {
                self.search_term = term;
                self
            }
            FormAction::SearchStarted => {
                self.error_message = None;
                self.notice = None;
                self
            }
            FormAction::SearchSucceeded(records) if records.is_empty() => {
                self.reduce(FormAction::SearchFailed(MSG_NO_DATA_FOUND.to_string()))
            }
            FormAction::SearchSucceeded(records) => {
                self.records = records;
                self.pending = None;
                self.reconcile_selections()
            }
            FormAction::SearchFailed(message) => {
                self.records.clear();
                self.pending = None;
                self.error_message = Some(message);
                self.reconcile_selections()
            }
            FormAction::FromWarehouseSelected(value) => {
                let options = self.source_warehouses();
                self.draft.from_warehouse = self.pick(TransferField::FromWarehouse, value, &options);
                self.pending = None;
                self.reconcile_selections()
            }
            FormAction::FromBinSelected(value) => {
                let options = self.source_bin_options();
                self.draft.from_bin = self.pick(TransferField::FromBin, value, &options);
                self.pending = None;
                self
            }
            FormAction::ToWarehouseSelected(value) => {
                let options = self.destination_warehouses();
                self.draft.to_warehouse = self.pick(TransferField::ToWarehouse, value, &options);
                self.pending = None;
                self.reconcile_selections()
            }
            FormAction::ToBinSelected(value) => {
                let options = self.destination_bin_options();
                self.draft.to_bin = self.pick(TransferField::ToBin, value, &options);
                self.pending = None;
                self
            }
            FormAction::QuantityChanged(quantity) => {
                let available = self.available_quantity();
                self.error_message = match quantity {
                    Some(q) if q < 0.0 => Some(MSG_QUANTITY_NEGATIVE.to_string()),
                    Some(q) if q > available => Some(quantity_exceeds_message(available)),
                    _ => None,
                };
                self.draft.quantity = quantity;
                self.pending = None;
                self
            }
            FormAction::PostingDateChanged { date, today } => {
                self.error_message = if date > today {
                    Some(MSG_POSTING_DATE_FUTURE.to_string())
                } else {
                    None
                };
                self.draft.posting_date = date;
                self.pending = None;
                self
            }
            FormAction::RemarkChanged(remark) => {
                self.draft.remark = remark;
                self.pending = None;
                self
            }
            FormAction::TransferRequested { today, rules } => {
                let messages = validate(&self.draft, self.available_quantity(), today, rules);
                self.pending = if messages.is_empty() {
                    Some(TransferSummary {
                        from_warehouse: self.draft.from_warehouse.clone(),
                        from_bin: self.draft.from_bin.clone(),
                        to_warehouse: self.draft.to_warehouse.clone(),
                        to_bin: self.draft.to_bin.clone(),
                        quantity: self.draft.quantity.unwrap_or_default(),
                        posting_date: self.draft.posting_date,
                        remark: self.draft.remark.clone(),
                    })
                } else {
                    None
                };
                self.validation_messages = messages;
                self
            }
            FormAction::TransferAborted => {
                self.pending = None;
                self
            }
            FormAction::TransferCompleted { doc_entry, today } => {
                let mut form = self.reset(today);
                // each memo is good for one document
                form.journal_memo = None;
                form.notice = Some(format!(
                    "Transfer Completed Successfully. Document Entry: {doc_entry}"
                ));
                form
            }
            FormAction::TransferFailed { today } => {
                let mut form = self.reset(today);
                form.error_message = Some(MSG_TRANSFER_FAILED.to_string());
                form
            }
            FormAction::ErrorRaised(message) => {
                self.error_message = Some(message);
                self
            }
            FormAction::ClearAll { today } => {
                let mut form = self.reset(today);
                form.notice = None;
                form
            }
        }
    }

    /// Accept `value` only when it is one of `options`; an empty value clears the field
    fn pick(&mut self, field: TransferField, value: String, options: &[String]) -> String {
        let value = value.trim().to_string();
        if value.is_empty() || options.contains(&value) {
            return value;
        }
        self.error_message = Some(format!(
            "'{value}' is not an available {} option.",
            field.label()
        ));
        String::new()
    }

    /// Drop selections that are no longer offered after a list or parent selection changed
    fn reconcile_selections(mut self) -> Self {
        if !self.draft.from_warehouse.is_empty()
            && !self.source_warehouses().contains(&self.draft.from_warehouse)
        {
            self.draft.from_warehouse.clear();
        }
        if !self.draft.from_bin.is_empty()
            && !self.source_bin_options().contains(&self.draft.from_bin)
        {
            self.draft.from_bin.clear();
        }
        if !self.draft.to_warehouse.is_empty()
            && !self.destination_warehouses().contains(&self.draft.to_warehouse)
        {
            self.draft.to_warehouse.clear();
        }
        if !self.draft.to_bin.is_empty()
            && !self.destination_bin_options().contains(&self.draft.to_bin)
        {
            self.draft.to_bin.clear();
        }
        self
    }

    /// Back to an empty draft; fetched records and reference data stay
    fn reset(mut self, today: NaiveDate) -> Self {
        self.search_term.clear();
        self.draft = TransferDraft::new(today);
        self.validation_messages.clear();
        self.error_message = None;
        self.pending = None;
        self
    }
}
