// lib.rs - Listy City shared core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod config;
pub mod event;
pub mod model;
pub mod sync;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::{SelectionPolicy, SyncConfig};
pub use crux_core::{render::Render, App as CruxApp};
pub use event::Event;
pub use model::{City, ControlState, Form, Model};

use capabilities::DocumentError;
use config::ConfigError;
use model::ValidationError;

pub const ADD_FORM_TITLE: &str = "Add City";
pub const EDIT_FORM_TITLE: &str = "City Details";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The request or subscription did not reach the store.
    Transport,
    PermissionDenied,
    /// The record vanished from the live list before the action ran.
    NotFound,
    Validation,
    Config,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Transport => "TRANSPORT_ERROR",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION_ERROR",
            Self::Config => "CONFIG_ERROR",
        }
    }

    /// Whether the user can sensibly trigger the same action again.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transport)
    }

    #[must_use]
    pub const fn toast_kind(self) -> ToastKind {
        match self {
            Self::Transport | Self::PermissionDenied | Self::Config => ToastKind::Error,
            Self::NotFound | Self::Validation => ToastKind::Warning,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn not_found(name: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("{name} is no longer in the list"))
            .with_context("name", name)
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Transport => {
                "Unable to reach the server. Please check your connection and try again.".into()
            }
            ErrorKind::PermissionDenied => {
                "You don't have permission to change the city list.".into()
            }
            ErrorKind::NotFound => "That city is no longer in the list.".into(),
            ErrorKind::Validation | ErrorKind::Config => self.message.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

impl From<DocumentError> for AppError {
    fn from(e: DocumentError) -> Self {
        let kind = match &e {
            DocumentError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            DocumentError::NotFound { .. } => ErrorKind::NotFound,
            DocumentError::Unavailable { .. }
            | DocumentError::Aborted { .. }
            | DocumentError::Unknown { .. } => ErrorKind::Transport,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Config, e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            duration_ms: kind.default_duration_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CityItem {
    /// Document key; taps and deletes address the record by this.
    pub key: String,
    pub name: String,
    pub province: String,
    pub is_selected: bool,
    pub is_deleting: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteControlView {
    pub visible: bool,
    pub armed: bool,
    pub label: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormView {
    pub title: String,
    pub name: String,
    pub province: String,
    pub is_edit: bool,
}

impl From<&Form> for FormView {
    fn from(form: &Form) -> Self {
        match form {
            Form::Add => Self {
                title: ADD_FORM_TITLE.into(),
                name: String::new(),
                province: String::new(),
                is_edit: false,
            },
            Form::Edit { original, .. } => Self {
                title: EDIT_FORM_TITLE.into(),
                name: original.name.clone(),
                province: original.province.clone(),
                is_edit: true,
            },
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub cities: Vec<CityItem>,
    pub revision: u64,
    pub policy: SelectionPolicy,
    pub delete_control: DeleteControlView,
    pub form: Option<FormView>,
    pub toast: Option<ToastView>,
    pub sync_error: Option<UserFacingError>,
    pub pending_writes: usize,
}

pub mod app {
    use super::*;
    use crate::capabilities::{BatchWrite, DocumentOutput, DocumentResult};
    use crate::model::{validate_key, OpId, PendingWrite, WriteKind};
    use tracing::{debug, error, info, warn};

    #[derive(Default)]
    pub struct App;

    impl App {
        fn track(model: &mut Model, kind: WriteKind) -> OpId {
            let op_id = OpId::generate();
            debug!(op_id = %op_id, kind = kind.label(), "write issued");
            model.pending_writes.insert(op_id.clone(), PendingWrite { kind });
            op_id
        }

        fn completion(op_id: OpId) -> impl FnOnce(DocumentResult) -> Event + Send + 'static {
            move |result| Event::WriteCompleted { op_id, result }
        }

        fn create_city(city: City, model: &mut Model, caps: &Capabilities) -> AppResult<()> {
            city.validate()?;
            if model.cities.contains(&city.name) {
                return Err(ValidationError::Duplicate(city.name).into());
            }

            let op_id = Self::track(
                model,
                WriteKind::Create {
                    name: city.name.clone(),
                },
            );
            caps.documents.set(
                model.config.collection.clone(),
                city.name.clone(),
                city.to_fields(),
                Self::completion(op_id),
            );
            Ok(())
        }

        /// `existing_key` addresses the stored record; a new name different
        /// from it moves the record to a new key.
        fn update_city(
            existing_key: &str,
            name: String,
            province: String,
            model: &mut Model,
            caps: &Capabilities,
        ) -> AppResult<()> {
            let city = City::new(name, province);
            city.validate()?;
            if !model.cities.contains(existing_key) {
                return Err(AppError::not_found(existing_key));
            }

            let collection = model.config.collection.clone();

            if city.name == existing_key {
                let op_id = Self::track(
                    model,
                    WriteKind::Update {
                        name: city.name.clone(),
                    },
                );
                caps.documents.set(
                    collection,
                    city.name.clone(),
                    city.to_fields(),
                    Self::completion(op_id),
                );
                return Ok(());
            }

            if model.cities.contains(&city.name) {
                return Err(ValidationError::Duplicate(city.name).into());
            }

            let from = existing_key.to_string();
            let to = city.name.clone();

            if model.config.atomic_rename {
                let op_id = Self::track(model, WriteKind::Rename { from: from.clone(), to: to.clone() });
                let writes = vec![
                    BatchWrite::Delete { key: from },
                    BatchWrite::Set {
                        key: to,
                        fields: city.to_fields(),
                    },
                ];
                caps.documents.commit(collection, writes, Self::completion(op_id));
            } else {
                let delete_id = Self::track(
                    model,
                    WriteKind::RenameDelete {
                        from: from.clone(),
                        to: to.clone(),
                    },
                );
                caps.documents.delete(collection.clone(), from.clone(), Self::completion(delete_id));

                let set_id = Self::track(model, WriteKind::RenameSet { from, to: to.clone() });
                caps.documents.set(collection, to, city.to_fields(), Self::completion(set_id));
            }
            Ok(())
        }

        fn delete_city(key: &str, model: &mut Model, caps: &Capabilities) -> AppResult<()> {
            validate_key(key)?;
            if !model.cities.contains(key) {
                return Err(AppError::not_found(key));
            }
            if model.delete_in_flight(key) {
                debug!(key = %key, "delete already in flight");
                return Ok(());
            }

            let op_id = Self::track(
                model,
                WriteKind::Delete {
                    key: key.to_string(),
                },
            );
            caps.documents
                .delete(model.config.collection.clone(), key.to_string(), Self::completion(op_id));
            Ok(())
        }

        fn report(model: &mut Model, error: &AppError) {
            warn!(code = error.code(), message = %error.message, "action rejected");
            if error.kind == ErrorKind::NotFound {
                model.drop_stale_selection();
            }
            model.show_toast(error.user_facing_message(), error.kind.toast_kind());
        }

        fn handle_tap(key: &str, model: &mut Model, caps: &Capabilities) {
            let Some(city) = model.cities.get(key).cloned() else {
                Self::report(model, &AppError::not_found(key));
                return;
            };

            match model.config.policy {
                SelectionPolicy::SingleSelect => {
                    model.control = ControlState::Targeted {
                        key: key.to_string(),
                    };
                    model.form = Some(Form::Edit {
                        key: key.to_string(),
                        original: city,
                    });
                }
                SelectionPolicy::DeleteMode if model.control.is_delete_armed() => {
                    if let Err(e) = Self::delete_city(key, model, caps) {
                        Self::report(model, &e);
                    }
                }
                SelectionPolicy::DeleteMode => {
                    model.form = Some(Form::Edit {
                        key: key.to_string(),
                        original: city,
                    });
                }
            }
        }

        fn handle_snapshot(result: DocumentResult, model: &mut Model) {
            match result {
                Ok(DocumentOutput::Snapshot(docs)) => {
                    let changes = model.cities.apply_snapshot(&docs);
                    model.sync_error = None;
                    if model.drop_stale_selection() {
                        debug!("selected city left the collection");
                    }
                    info!(
                        collection = %model.config.collection,
                        count = model.cities.len(),
                        added = changes.added.len(),
                        removed = changes.removed.len(),
                        changed = changes.changed.len(),
                        "city list refreshed"
                    );
                }
                Ok(other) => {
                    warn!(output = ?other, "subscription delivered a non-snapshot output");
                }
                Err(e) => {
                    error!(collection = %model.config.collection, error = %e, "snapshot listener failed");
                    let error = AppError::from(e);
                    model.show_toast(error.user_facing_message(), ToastKind::Warning);
                    model.sync_error = Some(error);
                }
            }
        }

        fn handle_write_completed(op_id: &OpId, result: DocumentResult, model: &mut Model) {
            let Some(pending) = model.pending_writes.remove(op_id) else {
                warn!(op_id = %op_id, "completion for unknown write");
                return;
            };

            match (pending.kind, result) {
                (WriteKind::Delete { key }, Ok(_)) => {
                    model.forget_deleted(&key);
                    model.show_toast(format!("Deleted {key}"), ToastKind::Success);
                    info!(op_id = %op_id, key = %key, "city deleted");
                }
                (WriteKind::Delete { key }, Err(e)) => {
                    warn!(op_id = %op_id, key = %key, error = %e, "delete failed");
                    model.show_toast(format!("Delete failed: {}", e.message()), ToastKind::Error);
                }
                (WriteKind::Create { name }, Ok(_)) => {
                    debug!(op_id = %op_id, name = %name, "city written");
                }
                (WriteKind::Create { name }, Err(e)) => {
                    warn!(op_id = %op_id, name = %name, error = %e, "create failed");
                    model.show_toast(format!("Add failed: {}", e.message()), ToastKind::Error);
                }
                (WriteKind::Update { name }, Ok(_)) => {
                    debug!(op_id = %op_id, name = %name, "city updated");
                }
                (WriteKind::Update { name }, Err(e)) => {
                    warn!(op_id = %op_id, name = %name, error = %e, "update failed");
                    model.show_toast(format!("Update failed: {}", e.message()), ToastKind::Error);
                }
                (WriteKind::Rename { from, to }, Ok(_)) => {
                    info!(op_id = %op_id, from = %from, to = %to, "city renamed");
                }
                (WriteKind::Rename { from, to }, Err(e)) => {
                    warn!(op_id = %op_id, from = %from, to = %to, error = %e, "rename failed");
                    model.show_toast(format!("Update failed: {}", e.message()), ToastKind::Error);
                }
                (WriteKind::RenameDelete { from, to } | WriteKind::RenameSet { from, to }, Ok(_)) => {
                    debug!(op_id = %op_id, from = %from, to = %to, "rename step written");
                }
                (WriteKind::RenameDelete { from, to }, Err(e)) => {
                    warn!(op_id = %op_id, from = %from, to = %to, error = %e, "partial rename: old document was not removed");
                    model.show_toast(format!("Update failed: {}", e.message()), ToastKind::Error);
                }
                (WriteKind::RenameSet { from, to }, Err(e)) => {
                    warn!(op_id = %op_id, from = %from, to = %to, error = %e, "partial rename: new document was not written");
                    model.show_toast(format!("Update failed: {}", e.message()), ToastKind::Error);
                }
            }
        }

        fn delete_control(model: &Model) -> DeleteControlView {
            match model.config.policy {
                SelectionPolicy::SingleSelect => DeleteControlView {
                    visible: model.control.target().is_some(),
                    armed: false,
                    label: "Delete".into(),
                },
                SelectionPolicy::DeleteMode => {
                    let armed = model.control.is_delete_armed();
                    DeleteControlView {
                        visible: true,
                        armed,
                        label: if armed { "Done" } else { "Delete mode" }.into(),
                    }
                }
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            if event.is_user_initiated() {
                debug!(event = event.name(), "user action");
            }

            match event {
                Event::Noop => {}

                Event::Configure(config) => {
                    if model.subscribed {
                        warn!("configuration ignored, subscription already running");
                        return;
                    }
                    match config.validate() {
                        Ok(()) => {
                            info!(collection = %config.collection, policy = ?config.policy, "configured");
                            model.control = ControlState::Idle;
                            model.config = config;
                        }
                        Err(e) => {
                            error!(error = %e, "rejected configuration");
                            model.show_error(&AppError::from(e));
                        }
                    }
                    caps.render.render();
                }

                Event::AppStarted => {
                    if model.subscribed {
                        debug!("already subscribed");
                        return;
                    }
                    model.subscribed = true;
                    info!(collection = %model.config.collection, "subscribing to collection");
                    caps.documents
                        .subscribe(model.config.collection.clone(), Event::SnapshotReceived);
                    caps.render.render();
                }

                Event::AddPressed => {
                    model.form = Some(Form::Add);
                    caps.render.render();
                }

                Event::FormSubmitted { name, province } => {
                    let Some(form) = model.form.clone() else {
                        warn!("form submitted while no form is open");
                        return;
                    };
                    let outcome = match form {
                        Form::Add => Self::create_city(City::new(name, province), model, caps),
                        Form::Edit { key, .. } => {
                            Self::update_city(&key, name, province, model, caps)
                        }
                    };
                    match outcome {
                        Ok(()) => model.form = None,
                        Err(e) => Self::report(model, &e),
                    }
                    caps.render.render();
                }

                Event::FormDismissed => {
                    model.form = None;
                    caps.render.render();
                }

                Event::CityTapped { name } => {
                    Self::handle_tap(&name, model, caps);
                    caps.render.render();
                }

                Event::DeletePressed => {
                    if model.config.policy != SelectionPolicy::SingleSelect {
                        debug!("delete control acts as a toggle in delete-mode");
                        return;
                    }
                    match model.control.target().map(str::to_owned) {
                        Some(name) => {
                            if let Err(e) = Self::delete_city(&name, model, caps) {
                                Self::report(model, &e);
                            }
                        }
                        None => model.show_toast("Select a city to delete", ToastKind::Info),
                    }
                    caps.render.render();
                }

                Event::DeleteModeToggled => {
                    if model.config.policy != SelectionPolicy::DeleteMode {
                        debug!("delete-mode toggle ignored under single-select");
                        return;
                    }
                    model.control = model.control.toggled();
                    debug!(armed = model.control.is_delete_armed(), "delete-mode toggled");
                    caps.render.render();
                }

                Event::CreateCity(city) => {
                    if let Err(e) = Self::create_city(city, model, caps) {
                        Self::report(model, &e);
                    }
                    caps.render.render();
                }

                Event::UpdateCity {
                    existing_name,
                    name,
                    province,
                } => {
                    if let Err(e) = Self::update_city(&existing_name, name, province, model, caps) {
                        Self::report(model, &e);
                    }
                    caps.render.render();
                }

                Event::DeleteCity { name } => {
                    if let Err(e) = Self::delete_city(&name, model, caps) {
                        Self::report(model, &e);
                    }
                    caps.render.render();
                }

                Event::DismissToast => {
                    model.clear_toast();
                    caps.render.render();
                }

                Event::SnapshotReceived(result) => {
                    Self::handle_snapshot(result, model);
                    caps.render.render();
                }

                Event::WriteCompleted { op_id, result } => {
                    Self::handle_write_completed(&op_id, result, model);
                    caps.render.render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let target = model.control.target();

            let cities = model
                .cities
                .entries()
                .iter()
                .map(|entry| CityItem {
                    key: entry.key.clone(),
                    name: entry.city.name.clone(),
                    province: entry.city.province.clone(),
                    is_selected: target == Some(entry.key.as_str()),
                    is_deleting: model.delete_in_flight(&entry.key),
                })
                .collect();

            ViewModel {
                cities,
                revision: model.cities.revision(),
                policy: model.config.policy,
                delete_control: Self::delete_control(model),
                form: model.form.as_ref().map(FormView::from),
                toast: model.active_toast.as_ref().map(ToastView::from),
                sync_error: model.sync_error.as_ref().map(UserFacingError::from),
                pending_writes: model.pending_writes.len(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_tests {
        use super::*;

        #[test]
        fn document_errors_map_to_kinds() {
            let transport = AppError::from(DocumentError::unavailable("offline"));
            assert_eq!(transport.kind, ErrorKind::Transport);
            assert!(transport.is_retryable());

            let denied = AppError::from(DocumentError::PermissionDenied {
                message: "rules".into(),
            });
            assert_eq!(denied.kind, ErrorKind::PermissionDenied);
            assert!(!denied.is_retryable());

            let missing = AppError::from(DocumentError::NotFound { key: "x".into() });
            assert_eq!(missing.code(), "NOT_FOUND");
        }

        #[test]
        fn validation_message_is_shown_verbatim() {
            let err = AppError::from(ValidationError::EmptyName);
            assert_eq!(err.user_facing_message(), "City name cannot be empty");
            assert_eq!(err.kind.toast_kind(), ToastKind::Warning);
        }

        #[test]
        fn not_found_carries_name() {
            let err = AppError::not_found("Kelowna");
            assert_eq!(err.context.get("name").map(String::as_str), Some("Kelowna"));
            assert_eq!(err.to_string(), "[NOT_FOUND] Kelowna is no longer in the list");
        }
    }

    mod view_tests {
        use super::*;

        #[test]
        fn add_form_view_is_blank() {
            let view = FormView::from(&Form::Add);
            assert_eq!(view.title, ADD_FORM_TITLE);
            assert!(view.name.is_empty());
            assert!(!view.is_edit);
        }

        #[test]
        fn edit_form_view_prefills() {
            let view = FormView::from(&Form::Edit {
                key: "Kelowna".into(),
                original: City::new("Kelowna", "BC"),
            });
            assert_eq!(view.title, EDIT_FORM_TITLE);
            assert_eq!(view.name, "Kelowna");
            assert_eq!(view.province, "BC");
            assert!(view.is_edit);
        }

        #[test]
        fn toast_view_carries_every_message_field() {
            let toast = ToastMessage::new("Deleted Kelowna", ToastKind::Success);
            let view = ToastView::from(&toast);
            assert_eq!(
                view,
                ToastView {
                    message: toast.message,
                    kind: toast.kind,
                    duration_ms: toast.duration_ms,
                }
            );
        }

        #[test]
        fn toast_durations_by_kind() {
            assert_eq!(ToastMessage::new("x", ToastKind::Success).duration_ms, 2000);
            assert_eq!(ToastMessage::new("x", ToastKind::Error).duration_ms, 5000);
        }
    }
}
