pub mod aggregator;
pub use aggregator::UserAggregator;

pub mod archive;
pub use archive::ArchiveError;

pub mod merge;
pub use merge::{MergedTable, SourceTable, SourceTableError};

pub mod notifier;
pub use notifier::NotificationSender;

pub mod registry;
pub use registry::{JobRegistry, JobState};

pub mod report;
pub use report::{ReportError, ReportJob, ReportService};

pub mod timing;
pub use timing::StageTimer;
