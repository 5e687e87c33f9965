pub mod convert;
pub mod interactive;
pub mod rates;
pub mod setup;
pub mod spotlight;
pub mod ui;
