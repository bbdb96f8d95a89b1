//! Parley Context
//!
//! Builds the model input for a chat turn from the project's shared memory.
//! Every chat of a project contributes to one time-ordered history, which is
//! budgeted and wrapped between a system preamble and the new user turn.
//!
//! The crate performs no I/O of its own. Callers hand in chat snapshots and a
//! [`FileDecoder`] for reading stored uploads.

pub mod assembler;
pub mod budget;
pub mod error;
pub mod file;
pub mod history;

pub use assembler::{
    conversation_preamble, file_preamble, AssembledContext, AssemblyRequest, ContextAssembler,
    ContextEntry, EntryRole, InlineImage, NewInput, DEFAULT_FILE_PROMPT, DEFAULT_IMAGE_PROMPT,
    DEFAULT_TEXT_FILE_PROMPT,
};
pub use budget::{BudgetPolicy, LastN, DEFAULT_HISTORY_LIMIT};
pub use error::{ContextBuildError, DecodeError, Result};
pub use file::{FileDecoder, FileDescriptor, MediaCategory};
pub use history::{collect_history, ChatRole, ChatSnapshot, HistoryEntry, ProjectInfo, SnapshotMessage};
