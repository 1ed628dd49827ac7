//! Database repositories for each table.

pub mod alerts;
pub mod keywords;
pub mod messages;
pub mod warnings;

pub use alerts::AlertsRepo;
pub use keywords::KeywordsRepo;
pub use messages::{format_datetime, parse_datetime, MessagesRepo};
pub use warnings::WarningsRepo;
