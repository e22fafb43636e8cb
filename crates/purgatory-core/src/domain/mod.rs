//! Domain model (IDs, content hashes, candidates, reports, errors).

pub mod candidate;
pub mod content_hash;
pub mod errors;
pub mod ids;
pub mod report;
pub mod state;

pub use self::candidate::{DeletionCandidate, GracePeriod};
pub use self::content_hash::{ContentHash, ContentHashError};
pub use self::errors::{DeleteError, ErrorKind, StoreError, SweepError};
pub use self::ids::{IdParseError, RecordId, RunId};
pub use self::report::{FailedDeletion, SweepOutcome, SweepReport};
pub use self::state::CandidateStatus;
