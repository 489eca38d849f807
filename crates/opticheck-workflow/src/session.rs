//! Per-session state of the check-in workflow.

use crate::profile::{FieldValue, ProfileRecord, IDENTITY_FIELD};
use crate::vitals::{Insight, VitalsSnapshot};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Screen the session is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Verifying,
    ProfileView,
    ProfileEdit,
    Scanning,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Verifying => "verifying",
            Stage::ProfileView => "profile",
            Stage::ProfileEdit => "profile edit",
            Stage::Scanning => "scanning",
            Stage::Report => "report",
        })
    }
}

/// Everything one check-in session knows.
///
/// Only [`crate::Workflow::apply`] mutates it. Past `Verifying` the session
/// always carries an identity and a profile; in `Report` it also carries a
/// vitals reading and its insights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub(crate) session_id: Uuid,
    pub(crate) stage: Stage,
    pub(crate) identity: Option<String>,
    pub(crate) profile: Option<ProfileRecord>,
    pub(crate) vitals: Option<VitalsSnapshot>,
    pub(crate) insights: Vec<Insight>,
    pub(crate) check_in_complete: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            stage: Stage::Verifying,
            identity: None,
            profile: None,
            vitals: None,
            insights: Vec::new(),
            check_in_complete: false,
        }
    }

    /// Back to a fresh `Verifying` session with a new id.
    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn profile(&self) -> Option<&ProfileRecord> {
        self.profile.as_ref()
    }

    pub fn vitals(&self) -> Option<&VitalsSnapshot> {
        self.vitals.as_ref()
    }

    pub fn insights(&self) -> &[Insight] {
        &self.insights
    }

    pub fn check_in_complete(&self) -> bool {
        self.check_in_complete
    }

    /// Editable fields pre-filled from the current profile, while editing.
    pub fn edit_form(&self) -> Option<Vec<(String, FieldValue)>> {
        if self.stage != Stage::ProfileEdit {
            return None;
        }
        let profile = self.profile.as_ref()?;
        Some(
            profile
                .fields()
                .filter(|(name, _)| *name != IDENTITY_FIELD)
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        )
    }

    /// Whether the stage-dependent invariants hold.
    pub fn is_consistent(&self) -> bool {
        let identified = self.identity.is_some() && self.profile.is_some();
        match self.stage {
            Stage::Verifying => self.identity.is_none() && self.profile.is_none() && self.vitals.is_none(),
            Stage::ProfileView | Stage::ProfileEdit | Stage::Scanning => identified && self.vitals.is_none(),
            Stage::Report => identified && self.vitals.is_some() && !self.insights.is_empty(),
        }
    }
}
