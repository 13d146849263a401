use serde::{Deserialize, Serialize};

use crate::capabilities::DocumentResult;
use crate::config::SyncConfig;
use crate::model::{City, OpId};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub enum Event {
    #[default]
    Noop,

    /// Must arrive before `AppStarted` to take effect.
    Configure(SyncConfig),
    AppStarted,

    // Form
    AddPressed,
    FormSubmitted {
        name: String,
        province: String,
    },
    FormDismissed,

    // List interaction. `name` here and in `DeleteCity`/`UpdateCity::existing_name`
    // is the record's document key, as shown in `CityItem::key`.
    CityTapped {
        name: String,
    },
    DeletePressed,
    DeleteModeToggled,

    // Direct operations
    CreateCity(City),
    UpdateCity {
        existing_name: String,
        name: String,
        province: String,
    },
    DeleteCity {
        name: String,
    },

    DismissToast,

    // Capability responses
    #[serde(skip)]
    SnapshotReceived(DocumentResult),
    #[serde(skip)]
    WriteCompleted { op_id: OpId, result: DocumentResult },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Configure(_) => "configure",
            Self::AppStarted => "app_started",
            Self::AddPressed => "add_pressed",
            Self::FormSubmitted { .. } => "form_submitted",
            Self::FormDismissed => "form_dismissed",
            Self::CityTapped { .. } => "city_tapped",
            Self::DeletePressed => "delete_pressed",
            Self::DeleteModeToggled => "delete_mode_toggled",
            Self::CreateCity(_) => "create_city",
            Self::UpdateCity { .. } => "update_city",
            Self::DeleteCity { .. } => "delete_city",
            Self::DismissToast => "dismiss_toast",
            Self::SnapshotReceived(_) => "snapshot_received",
            Self::WriteCompleted { .. } => "write_completed",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::AddPressed
                | Self::FormSubmitted { .. }
                | Self::FormDismissed
                | Self::CityTapped { .. }
                | Self::DeletePressed
                | Self::DeleteModeToggled
                | Self::CreateCity(_)
                | Self::UpdateCity { .. }
                | Self::DeleteCity { .. }
                | Self::DismissToast
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_events_are_flagged() {
        assert!(Event::DeletePressed.is_user_initiated());
        assert!(!Event::AppStarted.is_user_initiated());
        assert!(!Event::SnapshotReceived(Ok(crate::capabilities::DocumentOutput::Written))
            .is_user_initiated());
    }

    #[test]
    fn shell_events_deserialize() {
        let event: Event = serde_json::from_str(r#"{"CityTapped":{"name":"Kelowna"}}"#).unwrap();
        assert_eq!(event, Event::CityTapped { name: "Kelowna".into() });
        assert_eq!(event.name(), "city_tapped");
    }
}
