//! Incident creation dialog: form state plus the open/cancel/submit cycle.

use std::future::Future;

use shared::{
    domain::{Category, Priority},
    protocol::CreateIncidentRequest,
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogState {
    #[default]
    Closed,
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentForm {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: Option<Category>,
}

impl Default for IncidentForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            priority: Priority::Medium,
            category: None,
        }
    }
}

impl IncidentForm {
    /// A title made only of whitespace counts as empty.
    pub fn validate(&self) -> Result<(), FormError> {
        if self.title.trim().is_empty() {
            return Err(FormError::TitleRequired);
        }
        Ok(())
    }

    pub fn to_request(&self) -> CreateIncidentRequest {
        CreateIncidentRequest {
            title: self.title.trim().to_string(),
            description: self.description.clone(),
            priority: self.priority,
            category: self.category,
            assignee: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("the incident dialog is not open")]
    NotOpen,
    #[error("title is required")]
    TitleRequired,
}

#[derive(Debug, Default)]
pub struct IncidentDialog {
    state: DialogState,
    form: IncidentForm,
}

impl IncidentDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == DialogState::Open
    }

    /// Opening always starts from a blank form.
    pub fn open(&mut self) {
        self.form = IncidentForm::default();
        self.state = DialogState::Open;
    }

    pub fn cancel(&mut self) {
        self.reset();
    }

    pub fn form(&self) -> &IncidentForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> Result<&mut IncidentForm, FormError> {
        if !self.is_open() {
            return Err(FormError::NotOpen);
        }
        Ok(&mut self.form)
    }

    /// Validates the form and hands back the request to send. The dialog
    /// stays open; a validation failure leaves it untouched.
    pub fn begin_submit(&self) -> Result<CreateIncidentRequest, FormError> {
        if !self.is_open() {
            return Err(FormError::NotOpen);
        }
        self.form.validate()?;
        Ok(self.form.to_request())
    }

    /// Closes and clears the dialog once the create call settled, whatever
    /// its outcome.
    pub fn complete_submit(&mut self) {
        self.reset();
    }

    /// Runs `send` with the validated request, then closes the dialog.
    /// `send` is never invoked when validation fails.
    pub async fn submit<F, Fut, T>(&mut self, send: F) -> Result<T, FormError>
    where
        F: FnOnce(CreateIncidentRequest) -> Fut,
        Fut: Future<Output = T>,
    {
        let request = self.begin_submit()?;
        let outcome = send(request).await;
        self.complete_submit();
        Ok(outcome)
    }

    fn reset(&mut self) {
        self.state = DialogState::Closed;
        self.form = IncidentForm::default();
    }
}
