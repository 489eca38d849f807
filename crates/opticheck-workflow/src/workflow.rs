//! Check-in state machine.
//!
//! ```text
//! Verifying ──Recognized(label)──▶ ProfileView ──Edit──▶ ProfileEdit
//!     ▲                              │    ▲  ◀──SubmitEdits / CancelEdit──┘
//!     │                             Scan  Back
//!     │                              ▼    │
//!     │                            Scanning ──ScanElapsed──▶ Report
//!     └──────────── StartOver / EndSession ◀─────────────────────┘
//! ```
//!
//! `EndSession` is accepted on every stage; pending edits are discarded.
//!
//! Store writes are best-effort. A failed write is reported as a notice and
//! never blocks the transition; the in-memory profile keeps the edit.

use crate::profile::{FieldValue, ProfileRecord};
use crate::schema::ProfileSchema;
use crate::session::{SessionState, Stage};
use crate::store::RecordStore;
use crate::vitals::{derive_insights, VitalsSource};
use chrono::Local;
use opticheck_core::MatchResult;
use serde::Serialize;
use thiserror::Error;

/// Store column holding the date of the last completed check-in.
pub const LAST_CHECK_IN_FIELD: &str = "Last Check-in";

/// A user or timer event fed to [`Workflow::apply`].
#[derive(Debug, Clone)]
pub enum Action {
    /// A recognition attempt finished. An unknown result keeps the session in `Verifying`.
    Recognized(MatchResult),
    /// The recognition attempt could not run (camera, models or gallery).
    RecognitionFailed { reason: String, warnings: Vec<String> },
    Edit,
    Scan,
    /// Submitted form values, keyed by field name.
    SubmitEdits(Vec<(String, FieldValue)>),
    CancelEdit,
    Back,
    ScanElapsed,
    CompleteCheckIn,
    StartOver,
    EndSession,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Recognized(_) => "recognized",
            Action::RecognitionFailed { .. } => "recognition failed",
            Action::Edit => "edit",
            Action::Scan => "scan",
            Action::SubmitEdits(_) => "submit edits",
            Action::CancelEdit => "cancel edit",
            Action::Back => "back",
            Action::ScanElapsed => "scan elapsed",
            Action::CompleteCheckIn => "complete check-in",
            Action::StartOver => "start over",
            Action::EndSession => "end session",
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} while on the {stage} screen")]
    InvalidTransition { stage: Stage, action: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// User-facing message produced by a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self { level, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

/// Result of one accepted transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub stage: Stage,
    pub notices: Vec<Notice>,
}

/// Drives [`SessionState`] through the check-in flow.
pub struct Workflow<S, V> {
    store: S,
    vitals: V,
    schema: ProfileSchema,
}

impl<S: RecordStore, V: VitalsSource> Workflow<S, V> {
    pub fn new(store: S, vitals: V, schema: ProfileSchema) -> Self {
        Self { store, vitals, schema }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn schema(&self) -> &ProfileSchema {
        &self.schema
    }

    /// Apply one action. An action that is not legal on the current stage is
    /// rejected and leaves `state` untouched.
    pub fn apply(&mut self, state: &mut SessionState, action: Action) -> Result<Outcome, TransitionError> {
        let span = tracing::info_span!("session", id = %state.session_id);
        let _enter = span.enter();

        let from = state.stage;
        let mut notices = Vec::new();

        match (from, action) {
            (Stage::Verifying, Action::Recognized(result)) => self.on_recognized(state, result, &mut notices),
            (Stage::Verifying, Action::RecognitionFailed { reason, warnings }) => {
                tracing::warn!(%reason, "recognition could not run");
                notices.extend(warnings.into_iter().map(Notice::warning));
                notices.push(Notice::error(format!("Face recognition failed: {reason}")));
            }
            (Stage::ProfileView, Action::Edit) => state.stage = Stage::ProfileEdit,
            (Stage::ProfileView, Action::Scan) => state.stage = Stage::Scanning,
            (Stage::ProfileEdit, Action::SubmitEdits(edits)) => self.on_submit_edits(state, edits, &mut notices),
            (Stage::ProfileEdit, Action::CancelEdit) | (Stage::Scanning, Action::Back) => {
                state.stage = Stage::ProfileView
            }
            (Stage::Scanning, Action::ScanElapsed) => {
                let vitals = self.vitals.generate();
                state.insights = derive_insights(&vitals);
                state.vitals = Some(vitals);
                state.stage = Stage::Report;
            }
            (Stage::Report, Action::CompleteCheckIn) => self.on_complete_check_in(state, &mut notices),
            (Stage::Report, Action::StartOver) | (_, Action::EndSession) => {
                tracing::info!("session ended");
                state.reset();
            }
            (stage, action) => {
                tracing::warn!(%stage, action = action.name(), "rejected transition");
                return Err(TransitionError::InvalidTransition { stage, action: action.name() });
            }
        }

        debug_assert!(state.is_consistent(), "inconsistent session: {state:?}");
        if state.stage != from {
            tracing::info!(from = %from, to = %state.stage, "stage changed");
        }
        Ok(Outcome { stage: state.stage, notices })
    }

    fn on_recognized(&mut self, state: &mut SessionState, result: MatchResult, notices: &mut Vec<Notice>) {
        notices.extend(result.warnings.into_iter().map(Notice::warning));
        let Some(label) = result.label else {
            notices.push(Notice::warning("No identity match found. Please try again."));
            return;
        };

        let profile = match self.store.find_profile(&label) {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                tracing::warn!(%label, "no stored profile, using fallback");
                notices.push(Notice::warning("User data not found. Using a temporary profile."));
                ProfileRecord::fallback(&label)
            }
            Err(e) => {
                tracing::error!(error = %e, %label, "profile fetch failed, using fallback");
                notices.push(Notice::error(format!("Could not load profile: {e}. Using a temporary profile.")));
                ProfileRecord::fallback(&label)
            }
        };

        notices.push(Notice::success(format!("Welcome, {label}")));
        state.identity = Some(label);
        state.profile = Some(profile);
        state.stage = Stage::ProfileView;
    }

    fn on_submit_edits(&mut self, state: &mut SessionState, edits: Vec<(String, FieldValue)>, notices: &mut Vec<Notice>) {
        let Some(profile) = state.profile.as_mut() else {
            return;
        };

        let mut accepted = Vec::new();
        for (field, input) in edits {
            if !profile.contains(&field) {
                tracing::debug!(%field, "ignoring edit to unknown field");
                continue;
            }
            match self.schema.sanitize(profile, &field, &input) {
                Some(value) => {
                    profile.set(&field, value.clone());
                    accepted.push((field, value));
                }
                None => tracing::debug!(%field, "field is not editable"),
            }
        }
        state.stage = Stage::ProfileView;

        let saved = match state.identity.as_deref() {
            Some(label) => self.persist(label, &accepted, notices),
            None => false,
        };
        notices.push(if saved {
            Notice::success("Profile updated")
        } else {
            Notice::warning("Profile updated for this session only")
        });
    }

    fn on_complete_check_in(&mut self, state: &mut SessionState, notices: &mut Vec<Notice>) {
        if state.check_in_complete {
            return;
        }
        state.check_in_complete = true;

        let mut fields = vec![(
            LAST_CHECK_IN_FIELD.to_string(),
            FieldValue::Text(Local::now().format("%Y-%m-%d").to_string()),
        )];
        if let Some(vitals) = &state.vitals {
            fields.extend(vitals.store_fields().into_iter().map(|(name, value)| (name.to_string(), value)));
        }

        let saved = match state.identity.as_deref() {
            Some(label) => self.persist(label, &fields, notices),
            None => false,
        };
        notices.push(if saved {
            Notice::success("Check-in completed")
        } else {
            Notice::warning("Check-in completed, but the record was not fully saved")
        });
    }

    /// Write `fields` to the row for `label`, skipping columns the store
    /// does not have. Returns whether every applicable write succeeded.
    fn persist(&mut self, label: &str, fields: &[(String, FieldValue)], notices: &mut Vec<Notice>) -> bool {
        let row = match self.store.find_row_index(label) {
            Ok(Some(row)) => row,
            Ok(None) => {
                notices.push(Notice::warning(format!("No stored record for {label}; nothing was saved.")));
                return false;
            }
            Err(e) => {
                tracing::error!(error = %e, "row lookup failed");
                notices.push(Notice::error(format!("Could not save: {e}")));
                return false;
            }
        };
        let headers = match self.store.read_header_fields() {
            Ok(headers) => headers,
            Err(e) => {
                tracing::error!(error = %e, "header read failed");
                notices.push(Notice::error(format!("Could not save: {e}")));
                return false;
            }
        };

        let mut all_saved = true;
        for (field, value) in fields {
            if !headers.iter().any(|h| h == field) {
                tracing::debug!(%field, "store has no such column, skipping");
                continue;
            }
            if let Err(e) = self.store.write_cell(row, field, value) {
                tracing::error!(error = %e, %field, row, "cell write failed");
                notices.push(Notice::error(format!("Could not save {field}: {e}")));
                all_saved = false;
            }
        }
        all_saved
    }
}
