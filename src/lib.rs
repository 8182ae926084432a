pub mod calendar;
pub mod clock;
pub mod config;
pub mod engine;
pub mod http;
pub mod ledger;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod sweeper;
pub mod wal;
