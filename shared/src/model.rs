use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::capabilities::Document;
use crate::config::SyncConfig;
use crate::sync::CityList;
use crate::{AppError, ToastKind, ToastMessage};

pub const MAX_KEY_BYTES: usize = 1500;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("City name cannot be empty")]
    EmptyName,
    #[error("City name is too long ({len} > {max} bytes)")]
    TooLong { len: usize, max: usize },
    #[error("City name cannot contain '/'")]
    ContainsSlash,
    #[error("'{0}' is a reserved name")]
    Reserved(String),
    #[error("City name contains control characters")]
    ControlCharacter,
    #[error("A city named {0} already exists")]
    Duplicate(String),
}

/// Checks that `key` can be used as a remote document key.
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    if key.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }

    if key.len() > MAX_KEY_BYTES {
        return Err(ValidationError::TooLong {
            len: key.len(),
            max: MAX_KEY_BYTES,
        });
    }

    if key.contains('/') {
        return Err(ValidationError::ContainsSlash);
    }

    if key == "." || key == ".." || (key.len() > 4 && key.starts_with("__") && key.ends_with("__")) {
        return Err(ValidationError::Reserved(key.to_string()));
    }

    if key.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacter);
    }

    Ok(())
}

/// A city record. Records written by this core keep `name` equal to their
/// document key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct City {
    pub name: String,
    pub province: String,
}

impl City {
    pub fn new(name: impl Into<String>, province: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            province: province.into(),
        }
    }

    /// Reads a city out of a remote document without schema validation.
    #[must_use]
    pub fn from_document(doc: &Document) -> Self {
        Self {
            name: doc.string_field("name"),
            province: doc.string_field("province"),
        }
    }

    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("name".into(), Value::String(self.name.clone()));
        fields.insert("province".into(), Value::String(self.province.clone()));
        fields
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_key(&self.name)
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.province)
    }
}

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(OpId);

/// Who the next tap or delete press acts on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ControlState {
    #[default]
    Idle,
    /// Single-select: the record at `key` is armed for the delete control.
    Targeted { key: String },
    /// Delete-mode: the next tapped city is deleted.
    DeleteArmed,
}

impl ControlState {
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Targeted { key } => Some(key),
            Self::Idle | Self::DeleteArmed => None,
        }
    }

    #[must_use]
    pub const fn is_delete_armed(&self) -> bool {
        matches!(self, Self::DeleteArmed)
    }

    /// Flips delete-mode. A single-select target is dropped on the way in.
    #[must_use]
    pub fn toggled(&self) -> Self {
        match self {
            Self::DeleteArmed => Self::Idle,
            Self::Idle | Self::Targeted { .. } => Self::DeleteArmed,
        }
    }

    /// State after the record at `key` was deleted remotely.
    #[must_use]
    pub fn after_delete(&self, key: &str) -> Self {
        match self {
            Self::Targeted { key: target } if target == key => Self::Idle,
            Self::DeleteArmed => Self::Idle,
            other => other.clone(),
        }
    }
}

/// The add/edit form the shell shows as a modal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Form {
    Add,
    Edit { key: String, original: City },
}

impl Form {
    /// Document key of the record being edited, if any.
    #[must_use]
    pub fn editing(&self) -> Option<&str> {
        match self {
            Self::Add => None,
            Self::Edit { key, .. } => Some(key),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    Create { name: String },
    Update { name: String },
    Rename { from: String, to: String },
    /// First half of a non-atomic rename.
    RenameDelete { from: String, to: String },
    /// Second half of a non-atomic rename.
    RenameSet { from: String, to: String },
    Delete { key: String },
}

impl WriteKind {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Rename { .. } => "rename",
            Self::RenameDelete { .. } => "rename_delete",
            Self::RenameSet { .. } => "rename_set",
            Self::Delete { .. } => "delete",
        }
    }
}

/// A write handed to the shell whose result has not come back yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingWrite {
    pub kind: WriteKind,
}

#[derive(Debug, Default)]
pub struct Model {
    pub config: SyncConfig,
    pub subscribed: bool,
    pub cities: CityList,
    pub control: ControlState,
    pub form: Option<Form>,
    pub pending_writes: HashMap<OpId, PendingWrite>,
    pub sync_error: Option<AppError>,
    pub active_toast: Option<ToastMessage>,
}

impl Model {
    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.active_toast = Some(ToastMessage::new(message, kind));
    }

    pub fn show_error(&mut self, error: &AppError) {
        self.show_toast(error.user_facing_message(), ToastKind::Error);
    }

    pub fn clear_toast(&mut self) {
        self.active_toast = None;
    }

    /// Drops a target or an open editor whose record is no longer in the
    /// live list.
    pub fn drop_stale_selection(&mut self) -> bool {
        let stale_target = self
            .control
            .target()
            .is_some_and(|key| !self.cities.contains(key));
        let stale_form = self
            .form
            .as_ref()
            .and_then(Form::editing)
            .is_some_and(|key| !self.cities.contains(key));

        if stale_target {
            self.control = ControlState::Idle;
        }
        if stale_form {
            self.form = None;
        }
        stale_target || stale_form
    }

    /// Forgets every selection pointing at `key` after it was deleted.
    pub fn forget_deleted(&mut self, key: &str) {
        self.control = self.control.after_delete(key);
        if self.form.as_ref().and_then(Form::editing) == Some(key) {
            self.form = None;
        }
    }

    #[must_use]
    pub fn delete_in_flight(&self, key: &str) -> bool {
        self.pending_writes
            .values()
            .any(|w| matches!(&w.kind, WriteKind::Delete { key: k } if k == key))
    }
}
