pub mod position;
pub mod record;

pub use position::{BlockAddr, LogicalPosition};
pub use record::JournalRecord;
