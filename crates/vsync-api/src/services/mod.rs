//! Background services.

pub mod export_reaper;

pub use export_reaper::ExportReaper;
