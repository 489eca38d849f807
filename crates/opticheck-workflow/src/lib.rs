//! opticheck-workflow — Check-in session logic.
//!
//! Ties a recognition attempt to a stored user profile and walks the user
//! through profile review, optional edits, a vitals scan and a report.

pub mod config;
pub mod engine;
pub mod profile;
pub mod schema;
pub mod session;
pub mod store;
pub mod vitals;
pub mod workflow;

pub use config::Config;
pub use engine::{match_identity, verify_identity, MatchError, MatchSettings, VerifyError};
pub use profile::{FieldValue, ProfileRecord, IDENTITY_FIELD};
pub use schema::{FieldKind, ProfileSchema, SchemaError};
pub use session::{SessionState, Stage};
pub use store::{MemoryStore, RecordStore, SheetFile, StoreError, Table, FIRST_DATA_ROW};
pub use vitals::{
    derive_insights, BloodPressure, Insight, SimulatedVitals, StressLevel, VitalsParseError, VitalsSnapshot,
    VitalsSource,
};
pub use workflow::{Action, Notice, NoticeLevel, Outcome, TransitionError, Workflow, LAST_CHECK_IN_FIELD};
