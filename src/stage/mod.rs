//! Staging: turn a resolved dependency set into an on-disk deployment tree.
//!
//! Layout produced under the destination root:
//!
//! ```text
//! dest/
//!   app            root executables, runpath rewritten to $ORIGIN/lib
//!   lib/
//!     libfoo.so.2  resolved libraries, runpath rewritten to $ORIGIN
//! ```

pub mod copy;
pub mod plan;
pub mod runpath;

pub use copy::{stage, CopyOutcome, EntryResult, StageReport};
pub use plan::{build_plan, CopyEntry, CopyPlan, EntryKind};
