//! Client-side core of the service-desk portal: fetching module data,
//! keeping the view state consistent and driving incident creation.

pub mod dialog;
pub mod error;
pub mod notify;
pub mod sync;
pub mod transport;

pub use dialog::{DialogState, FormError, IncidentDialog, IncidentForm};
pub use error::ClientError;
pub use notify::{CollectingNotifier, Notification, NotificationLevel, Notifier, TracingNotifier};
pub use sync::{spawn_cycle, CycleEvent, LoadTicket, SyncController, ViewState};
pub use transport::{HttpServiceDesk, RouteStyle, ServiceDeskApi, DEFAULT_REQUEST_TIMEOUT};

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
