use std::sync::Arc;

use tracing::{info, warn};

use super::ConfirmPrompt;
use crate::api::{AdminApi, Circle, CircleDraft};
use crate::error::{AppError, AppResult};
use crate::form::FormErrors;

pub const NAME_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 500;

pub const DELETE_PROMPT: ConfirmPrompt =
    ConfirmPrompt { title: "Delete circle?", text: "This cannot be undone", confirm_label: "Delete" };

impl CircleDraft {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into() }
    }

    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        match self.name.chars().count() {
            0 => errors.push("name", "Name is required"),
            n if n > NAME_MAX => errors.push("name", "Name must be less than 100 characters"),
            _ => {}
        }
        match self.description.chars().count() {
            0 => errors.push("description", "Description is required"),
            n if n > DESCRIPTION_MAX => errors.push("description", "Description must be less than 500 characters"),
            _ => {}
        }
        errors.into_result(())
    }
}

/// The create/edit dialog. `editing` names the circle being edited, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircleForm {
    pub editing: Option<String>,
    pub draft: CircleDraft,
}

impl CircleForm {
    pub fn title(&self) -> &'static str {
        if self.editing.is_some() { "Edit Circle" } else { "Create New Circle" }
    }
}

pub struct CircleBoard<A> {
    api: Arc<A>,
    circles: Vec<Circle>,
    form: Option<CircleForm>,
    last_error: Option<String>,
}

impl<A: AdminApi> CircleBoard<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api, circles: Vec::new(), form: None, last_error: None }
    }

    pub fn circles(&self) -> &[Circle] {
        &self.circles
    }

    pub fn get(&self, circle_id: &str) -> Option<&Circle> {
        self.circles.iter().find(|c| c.id == circle_id)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn form(&self) -> Option<&CircleForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut CircleForm> {
        self.form.as_mut()
    }

    pub async fn load(&mut self) -> AppResult<()> {
        match self.api.list_circles().await {
            Ok(circles) => {
                self.circles = circles;
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.message().to_string());
                Err(e)
            }
        }
    }

    pub fn open_create(&mut self) -> &mut CircleForm {
        self.form.insert(CircleForm::default())
    }

    /// Opens the dialog pre-filled from the local copy of `circle_id`.
    pub fn open_edit(&mut self, circle_id: &str) -> AppResult<&mut CircleForm> {
        let circle = self
            .get(circle_id)
            .ok_or_else(|| AppError::not_found("unknown_circle".to_string(), format!("no circle with id {circle_id}")))?;
        let form = CircleForm {
            editing: Some(circle.id.clone()),
            draft: CircleDraft::new(circle.name.clone(), circle.description.clone()),
        };
        Ok(self.form.insert(form))
    }

    pub fn close(&mut self) {
        self.form = None;
    }

    /// Validate and send the open dialog. The dialog stays open on any failure.
    pub async fn submit(&mut self) -> AppResult<&'static str> {
        let Some(form) = self.form.clone() else {
            return Err(AppError::user("no_form", "no circle form is open"));
        };
        form.draft.validate()?;
        let result = match &form.editing {
            Some(id) => self.api.update_circle(id, &form.draft).await.map(|saved| {
                for c in self.circles.iter_mut().filter(|c| c.id == *id) {
                    *c = saved.clone();
                }
                "Circle updated successfully!"
            }),
            None => self.api.create_circle(&form.draft).await.map(|saved| {
                self.circles.push(saved);
                "Circle created successfully!"
            }),
        };
        match result {
            Ok(message) => {
                info!(circle = %form.draft.name, editing = form.editing.is_some(), "circle saved");
                self.close();
                Ok(message)
            }
            Err(e) => {
                warn!(error = %e, "circle save failed");
                Err(e)
            }
        }
    }

    pub async fn delete(&mut self, circle_id: &str) -> AppResult<&'static str> {
        if let Err(e) = self.api.delete_circle(circle_id).await {
            warn!(circle_id, error = %e, "circle delete failed");
            return Err(e);
        }
        self.circles.retain(|c| c.id != circle_id);
        info!(circle_id, "circle deleted");
        Ok("Circle deleted successfully")
    }
}
