// Application Constants
// Centralized constants to avoid magic numbers

/// Default server configuration
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 4403;

/// ERP API defaults
pub const DEFAULT_ERP_BASE_URL: &str = "http://localhost:3005/api";
pub const DEFAULT_ERP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// ERP API endpoints (relative to the base URL)
pub const ERP_BIN_LOCATIONS_PATH: &str = "binlocations";
pub const ERP_BATCH_IN_BIN_PATH: &str = "batchinbin";
pub const ERP_NEXT_JOURNAL_MEMO_PATH: &str = "nextavailablejournalmemo";
pub const ERP_STOCK_TRANSFER_PATH: &str = "stocktransfer";

/// Timezone used to decide what "today" is for posting dates
pub const DEFAULT_TIMEZONE: &str = "Asia/Bangkok";

/// Form session housekeeping
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 1800;
pub const SESSION_SWEEP_INTERVAL_SECS: u64 = 60;

/// Search query limits
pub const MAX_SEARCH_QUERY_LENGTH: usize = 100;

/// User-facing form messages
pub const MSG_NO_DATA_FOUND: &str = "No data found for the provided search term.";
pub const MSG_SEARCH_FAILED: &str = "An error occurred while fetching data.";
pub const MSG_SEARCH_TERM_REQUIRED: &str = "Enter a batch number to search.";
pub const MSG_TRANSFER_FAILED: &str = "An error occurred during the transfer.";
pub const MSG_JOURNAL_MEMO_UNAVAILABLE: &str =
    "Journal memo is not available. Start a new transfer form and try again.";
pub const MSG_QUANTITY_NEGATIVE: &str = "Quantity cannot be negative.";
pub const MSG_POSTING_DATE_FUTURE: &str = "Posting date cannot be in the future.";
