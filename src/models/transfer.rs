use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One batch sitting in one bin, as returned by the ERP batch-in-bin lookup
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct BatchStockRecord {
    pub item_code: String,
    #[serde(default)]
    pub item_name: String,
    /// Batch (distribution) number
    pub dist_number: String,
    pub whs_code: String,
    pub bin_code: String,
    #[serde(default)]
    pub on_hand_qty: f64,
}

/// Bin master entry; `abs_entry` is the ERP's internal bin id
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct BinLocation {
    pub warehouse: String,
    pub bin_code: String,
    pub abs_entry: i64,
}

/// The bin location endpoint answers either with a bare array or an OData style envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BinLocationsResponse {
    List(Vec<BinLocation>),
    Envelope { value: Vec<BinLocation> },
}

impl BinLocationsResponse {
    pub fn into_locations(self) -> Vec<BinLocation> {
        match self {
            BinLocationsResponse::List(locations) => locations,
            BinLocationsResponse::Envelope { value } => value,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchSearchRequest<'a> {
    pub batch_number: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct BatchSearchResponse {
    #[serde(default)]
    pub value: Vec<BatchStockRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JournalMemoResponse {
    #[serde(default)]
    pub next_journal_memo: Option<String>,
}

/// Direction of a bin allocation inside a transfer line
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum BinActionType {
    #[serde(rename = "batFromWarehouse")]
    FromWarehouse,
    #[serde(rename = "batToWarehouse")]
    ToWarehouse,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct BinAllocation {
    pub bin_abs_entry: i64,
    pub bin_action_type: BinActionType,
    pub quantity: f64,
    pub serial_and_batch_numbers_base_line: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct BatchNumberLine {
    pub batch_number: String,
    pub quantity: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StockTransferLine {
    pub item_code: String,
    pub quantity: f64,
    pub warehouse_code: String,
    pub from_warehouse_code: String,
    pub serial_numbers: Vec<serde_json::Value>,
    pub batch_numbers: Vec<BatchNumberLine>,
    pub stock_transfer_lines_bin_allocations: Vec<BinAllocation>,
}

/// Stock transfer document posted to the ERP
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StockTransferRequest {
    pub journal_memo: String,
    pub comments: String,
    pub doc_date: NaiveDate,
    pub from_warehouse: String,
    pub to_warehouse: String,
    pub stock_transfer_lines: Vec<StockTransferLine>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StockTransferResponse {
    #[serde(default)]
    pub doc_entry: serde_json::Value,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StockTransferResponse {
    /// Document entry rendered for display; the ERP returns it as a number.
    /// Empty when the response carries no `DocEntry`.
    pub fn doc_entry_display(&self) -> String {
        match &self.doc_entry {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Draft fields in the order the form presents them
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransferField {
    FromWarehouse,
    FromBin,
    ToWarehouse,
    ToBin,
    Quantity,
    PostingDate,
    Remark,
}

impl TransferField {
    pub fn label(&self) -> &'static str {
        match self {
            TransferField::FromWarehouse => "From Warehouse",
            TransferField::FromBin => "From Bin",
            TransferField::ToWarehouse => "To Warehouse",
            TransferField::ToBin => "To Bin",
            TransferField::Quantity => "Quantity",
            TransferField::PostingDate => "Posting Date",
            TransferField::Remark => "Remark",
        }
    }
}

/// Field -> message; a field is present only when it failed validation
pub type ValidationMessages = BTreeMap<TransferField, String>;

/// User-edited transfer fields
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct TransferDraft {
    pub from_warehouse: String,
    pub from_bin: String,
    pub to_warehouse: String,
    pub to_bin: String,
    pub quantity: Option<f64>,
    pub posting_date: NaiveDate,
    pub remark: String,
}

impl TransferDraft {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            from_warehouse: String::new(),
            from_bin: String::new(),
            to_warehouse: String::new(),
            to_bin: String::new(),
            quantity: None,
            posting_date: today,
            remark: String::new(),
        }
    }
}

/// Frozen copy of the draft shown in the confirmation panel
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TransferSummary {
    pub from_warehouse: String,
    pub from_bin: String,
    pub to_warehouse: String,
    pub to_bin: String,
    pub quantity: f64,
    pub posting_date: NaiveDate,
    pub remark: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("No stock found for batch '{search_term}'")]
    NotFound { search_term: String },

    #[error("Validation failed for {} field(s)", .0.len())]
    ValidationFailed(ValidationMessages),

    #[error("ERP request failed: {0}")]
    RequestFailed(String),

    #[error("Transfer form session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Bin '{bin_code}' is not a known bin location")]
    UnknownBin { bin_code: String },

    #[error("Journal memo has not been fetched")]
    MissingJournalMemo,

    #[error("No transfer is awaiting confirmation")]
    NoPendingTransfer,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for TransferError {
    fn from(error: reqwest::Error) -> Self {
        TransferError::RequestFailed(error.to_string())
    }
}
