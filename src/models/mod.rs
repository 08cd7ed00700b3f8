pub mod form;
pub mod transfer;
