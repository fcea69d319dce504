pub mod error;
pub mod formats;
pub mod pass;
pub mod router;
pub mod scanner;

pub use error::{PassError, RelocationError, TransferError};
pub use formats::MediaFormats;
pub use pass::{BackupReport, BackupRunner, PassProgress, RetryReport};
pub use router::{build_caption, TransferOutcome, TransferRouter};
pub use scanner::{FileEntry, MediaScanner};
