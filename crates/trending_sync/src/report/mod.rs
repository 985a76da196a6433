mod format;
mod pages;
mod template;

pub use pages::{PageBuilder, ReportData, save_pages};
