use tracing::debug;

use crate::error::MechaLungError;
use crate::models::{PatientDraft, PatientRecord};

/// Which presentation is active.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewMode {
    List,
    Create,
    /// Snapshot of the record taken when editing began.
    Edit(PatientRecord),
}

impl ViewMode {
    pub fn name(&self) -> &'static str {
        match self {
            ViewMode::List => "list",
            ViewMode::Create => "create",
            ViewMode::Edit(_) => "edit",
        }
    }
}

/// State of the open create/edit form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormState {
    /// The user's latest input; kept across failed submits.
    pub draft: PatientDraft,
    pub error: Option<String>,
    pub submitting: bool,
}

/// Where a submit should be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTarget {
    Create,
    Update(i64),
}

/// List / Create / Edit state machine.
///
/// Pure state: the async roster call happens between [`begin_submit`] and
/// [`finish_submit`], driven by the caller.
///
/// [`begin_submit`]: ViewController::begin_submit
/// [`finish_submit`]: ViewController::finish_submit
#[derive(Debug, Clone, PartialEq)]
pub struct ViewController {
    mode: ViewMode,
    form: Option<FormState>,
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewController {
    pub fn new() -> Self {
        Self {
            mode: ViewMode::List,
            form: None,
        }
    }

    pub fn mode(&self) -> &ViewMode {
        &self.mode
    }

    pub fn form(&self) -> Option<&FormState> {
        self.form.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        self.form.as_ref().is_some_and(|f| f.submitting)
    }

    pub fn open_create(&mut self) -> Result<(), MechaLungError> {
        self.require_list("add a patient")?;
        self.mode = ViewMode::Create;
        self.form = Some(FormState::default());
        debug!("View: list -> create");
        Ok(())
    }

    pub fn open_edit(&mut self, target: PatientRecord) -> Result<(), MechaLungError> {
        self.require_list("edit a patient")?;
        debug!("View: list -> edit({})", target.id);
        self.form = Some(FormState {
            draft: target.details.clone(),
            ..FormState::default()
        });
        self.mode = ViewMode::Edit(target);
        Ok(())
    }

    /// Close the form without saving. Refused while a submit is outstanding.
    pub fn cancel(&mut self) -> Result<(), MechaLungError> {
        if matches!(self.mode, ViewMode::List) {
            return Err(self.invalid("cancel"));
        }
        if self.is_submitting() {
            return Err(MechaLungError::Busy("Saving the patient".to_string()));
        }
        self.close();
        Ok(())
    }

    /// Record the submitted input and mark the form busy.
    pub fn begin_submit(&mut self, draft: PatientDraft) -> Result<SubmitTarget, MechaLungError> {
        let target = match &self.mode {
            ViewMode::List => return Err(self.invalid("submit")),
            ViewMode::Create => SubmitTarget::Create,
            ViewMode::Edit(record) => SubmitTarget::Update(record.id),
        };
        let form = self.form.get_or_insert_with(FormState::default);
        if form.submitting {
            return Err(MechaLungError::Busy("Saving the patient".to_string()));
        }
        form.draft = draft;
        form.error = None;
        form.submitting = true;
        Ok(target)
    }

    /// Resolve an outstanding submit: success returns to the list, failure
    /// keeps the form open with the message and the user's input.
    pub fn finish_submit(&mut self, error: Option<String>) {
        let Some(form) = self.form.as_mut() else {
            // Reset while the request was in flight.
            return;
        };
        form.submitting = false;
        match error {
            None => self.close(),
            Some(message) => form.error = Some(message),
        }
    }

    /// Force the list view, discarding any form.
    pub fn reset(&mut self) {
        self.close();
    }

    fn close(&mut self) {
        debug!("View: {} -> list", self.mode.name());
        self.mode = ViewMode::List;
        self.form = None;
    }

    fn require_list(&self, action: &'static str) -> Result<(), MechaLungError> {
        match self.mode {
            ViewMode::List => Ok(()),
            _ => Err(self.invalid(action)),
        }
    }

    fn invalid(&self, action: &'static str) -> MechaLungError {
        MechaLungError::InvalidTransition {
            action,
            mode: self.mode.name(),
        }
    }
}
