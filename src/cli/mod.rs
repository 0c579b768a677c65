//! Command implementations and terminal output

pub mod convert;
pub mod export;
pub mod rates;
pub mod setup;
pub mod ui;
