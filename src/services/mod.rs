pub mod payload;
pub mod transfer_service;
pub mod validation;

pub use transfer_service::{monitor_sessions, FormSettings, TransferService};
