pub mod timezone;

pub use timezone::{local_today, parse_timezone};
