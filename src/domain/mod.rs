pub mod cycle;
pub mod item;
pub mod source;

pub use cycle::{CycleReport, CycleTotals, FailureKind, SourceOutcome, SourceReport};
pub use item::{Item, ParsedItem};
pub use source::{Source, SourceKind};
