pub mod aggregate;
pub mod info;

pub use aggregate::{
    BrowserEntry, BrowserResult, FileEntry, ReportData, ReportError, ReportResult, SessionResult,
    SuiteResult, TestEntry, TestError, TestResult, build_report_data,
};
pub use info::{DiffInfo, ImageInfo, TestIdentity, TestInfoStore, global};
