pub mod date;
pub mod uuid;

// re-exports
pub use self::date::{format_date, format_timestamp, parse_date, parse_timestamp};
pub use self::uuid::{UuidOptions, UuidStr};
