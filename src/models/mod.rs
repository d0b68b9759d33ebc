pub mod entry;

pub use entry::{BarcodeEntry, EntryDraft, IdGenerator, WireEntry, DEFAULT_COPIES};
