use crate::constants::{
    ERP_BATCH_IN_BIN_PATH, ERP_BIN_LOCATIONS_PATH, ERP_NEXT_JOURNAL_MEMO_PATH,
    ERP_STOCK_TRANSFER_PATH,
};
use crate::erp::ErpClient;
use crate::models::transfer::{
    BatchSearchRequest, BatchSearchResponse, BatchStockRecord, BinLocation, BinLocationsResponse,
    JournalMemoResponse, StockTransferRequest, StockTransferResponse, TransferError,
};
use tracing::{info, instrument, warn};

/// Typed calls against the ERP endpoints the transfer form needs
pub struct TransferApi {
    erp: ErpClient,
}

impl TransferApi {
    pub fn new(erp: ErpClient) -> Self {
        Self { erp }
    }

    /// All bin locations across warehouses
    #[instrument(skip(self))]
    pub async fn fetch_bin_locations(&self) -> Result<Vec<BinLocation>, TransferError> {
        let response: BinLocationsResponse = self.erp.post_empty(ERP_BIN_LOCATIONS_PATH).await?;
        let locations = response.into_locations();
        info!(count = locations.len(), "Fetched bin locations");
        Ok(locations)
    }

    /// Stock records for a batch number; an empty result is `NotFound`
    #[instrument(skip(self))]
    pub async fn search_batch(
        &self,
        batch_number: &str,
    ) -> Result<Vec<BatchStockRecord>, TransferError> {
        let response: BatchSearchResponse = self
            .erp
            .post_json(ERP_BATCH_IN_BIN_PATH, &BatchSearchRequest { batch_number })
            .await?;

        if response.value.is_empty() {
            return Err(TransferError::NotFound {
                search_term: batch_number.to_string(),
            });
        }

        info!(records = response.value.len(), "Batch search returned stock");
        Ok(response.value)
    }

    /// Next journal memo token; `None` when the ERP has none to hand out
    #[instrument(skip(self))]
    pub async fn next_journal_memo(&self) -> Result<Option<String>, TransferError> {
        let response: JournalMemoResponse =
            self.erp.post_empty(ERP_NEXT_JOURNAL_MEMO_PATH).await?;
        let memo = response.next_journal_memo.filter(|m| !m.trim().is_empty());
        if memo.is_none() {
            warn!("ERP returned no NextJournalMemo");
        }
        Ok(memo)
    }

    #[instrument(skip(self, request), fields(journal_memo = %request.journal_memo, lines = request.stock_transfer_lines.len()))]
    pub async fn post_stock_transfer(
        &self,
        request: &StockTransferRequest,
    ) -> Result<StockTransferResponse, TransferError> {
        let response: StockTransferResponse =
            self.erp.post_json(ERP_STOCK_TRANSFER_PATH, request).await?;
        if response.doc_entry.is_null() {
            warn!("ERP accepted the stock transfer without returning a DocEntry");
        } else {
            info!(doc_entry = %response.doc_entry_display(), "Stock transfer posted");
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockErp;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_bin_locations_from_envelope() {
        let mock = MockErp::with_sample_data();
        let api = TransferApi::new(mock.spawn().await);

        let locations = api.fetch_bin_locations().await.unwrap();
        assert_eq!(locations.len(), 4);
        assert_eq!(locations[2].bin_code, "WH2-B1");
        assert_eq!(locations[2].abs_entry, 21);
    }

    #[tokio::test]
    async fn test_fetch_bin_locations_from_bare_array() {
        let mock = MockErp::default();
        mock.state.lock().unwrap().bin_locations =
            json!([{ "Warehouse": "WH7", "BinCode": "WH7-X1", "AbsEntry": 70 }]);
        let api = TransferApi::new(mock.spawn().await);

        let locations = api.fetch_bin_locations().await.unwrap();
        assert_eq!(locations[0].warehouse, "WH7");
    }

    #[tokio::test]
    async fn test_search_batch_found_and_not_found() {
        let mock = MockErp::with_sample_data();
        let api = TransferApi::new(mock.spawn().await);

        let records = api.search_batch("BATCH001").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].on_hand_qty, 5.0);

        match api.search_batch("NOPE").await {
            Err(TransferError::NotFound { search_term }) => assert_eq!(search_term, "NOPE"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_batch_server_error() {
        let mock = MockErp::with_sample_data();
        mock.state.lock().unwrap().fail_search = true;
        let api = TransferApi::new(mock.spawn().await);

        assert!(matches!(
            api.search_batch("BATCH001").await,
            Err(TransferError::RequestFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_next_journal_memo_sequence() {
        let mock = MockErp::default();
        let api = TransferApi::new(mock.spawn().await);

        assert_eq!(api.next_journal_memo().await.unwrap().as_deref(), Some("JM-0001"));
        assert_eq!(api.next_journal_memo().await.unwrap().as_deref(), Some("JM-0002"));
    }
}
