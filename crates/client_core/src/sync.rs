//! Module-driven data synchronization.
//!
//! Selecting a module starts a load cycle: one GET per resource the module
//! needs, all in flight at once. Every cycle is tagged with a generation;
//! results belonging to a superseded cycle are dropped without touching the
//! view state.

use std::sync::Arc;

use futures::{stream::FuturesUnordered, StreamExt};
use shared::{
    domain::{Module, Resource},
    protocol::{ConfigurationItem, CreateIncidentRequest, DashboardStats, Incident, ServiceRequest},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dialog::{FormError, IncidentDialog},
    error::ClientError,
    notify::{Notification, Notifier},
    transport::ServiceDeskApi,
};

/// Everything a front-end needs to render the active module.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    active_module: Module,
    loading: bool,
    incidents: Vec<Incident>,
    requests: Vec<ServiceRequest>,
    cmdb: Vec<ConfigurationItem>,
    stats: Option<DashboardStats>,
    generation: u64,
    pending: usize,
}

impl ViewState {
    pub fn active_module(&self) -> Module {
        self.active_module
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn requests(&self) -> &[ServiceRequest] {
        &self.requests
    }

    pub fn cmdb(&self) -> &[ConfigurationItem] {
        &self.cmdb
    }

    pub fn stats(&self) -> Option<&DashboardStats> {
        self.stats.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts a new cycle for `module`, superseding any cycle still running.
    pub fn begin(&mut self, module: Module) -> LoadTicket {
        let resources = module.required_resources();
        self.generation += 1;
        self.active_module = module;
        self.pending = resources.len();
        self.loading = !resources.is_empty();
        LoadTicket {
            generation: self.generation,
            module,
            resources,
        }
    }

    /// Folds one settled fetch into the state. The slot is only replaced on
    /// success; `loading` clears once the last fetch of the cycle settles.
    pub fn apply(&mut self, ticket: &LoadTicket, outcome: ResourceOutcome) -> ApplyOutcome {
        if ticket.generation != self.generation {
            return ApplyOutcome::Stale;
        }
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 {
            self.loading = false;
        }

        let ResourceOutcome { resource, result } = outcome;
        match result {
            Ok(data) => {
                self.store(data);
                ApplyOutcome::Updated(resource)
            }
            Err(error) => ApplyOutcome::Failed(resource, error),
        }
    }

    fn store(&mut self, data: ResourceData) {
        match data {
            ResourceData::Incidents(items) => self.incidents = items,
            ResourceData::Requests(items) => self.requests = items,
            ResourceData::Cmdb(items) => self.cmdb = items,
            ResourceData::Stats(stats) => self.stats = stats,
        }
    }
}

/// Identifies one load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub module: Module,
    pub resources: &'static [Resource],
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceData {
    Incidents(Vec<Incident>),
    Requests(Vec<ServiceRequest>),
    Cmdb(Vec<ConfigurationItem>),
    Stats(Option<DashboardStats>),
}

#[derive(Debug)]
pub struct ResourceOutcome {
    pub resource: Resource,
    pub result: Result<ResourceData, ClientError>,
}

#[derive(Debug)]
pub enum ApplyOutcome {
    Updated(Resource),
    Failed(Resource, ClientError),
    Stale,
}

pub async fn fetch_resource(api: &dyn ServiceDeskApi, resource: Resource) -> ResourceOutcome {
    let result = match resource {
        Resource::Incidents => api.list_incidents().await.map(ResourceData::Incidents),
        Resource::Requests => api.list_requests().await.map(ResourceData::Requests),
        Resource::Cmdb => api.list_cmdb().await.map(ResourceData::Cmdb),
        Resource::Stats => api.fetch_stats().await.map(ResourceData::Stats),
    };
    ResourceOutcome { resource, result }
}

fn fetch_all(
    api: &Arc<dyn ServiceDeskApi>,
    resources: &'static [Resource],
) -> FuturesUnordered<impl std::future::Future<Output = ResourceOutcome> + Send + 'static> {
    resources
        .iter()
        .map(|&resource| {
            let api = Arc::clone(api);
            async move { fetch_resource(api.as_ref(), resource).await }
        })
        .collect()
}

/// One settled fetch of a detached cycle.
#[derive(Debug)]
pub struct CycleEvent {
    pub ticket: LoadTicket,
    pub outcome: ResourceOutcome,
}

/// Runs the fetches of `ticket` on the runtime and reports each one over
/// `events` as it settles.
pub fn spawn_cycle(
    api: Arc<dyn ServiceDeskApi>,
    ticket: LoadTicket,
    events: mpsc::UnboundedSender<CycleEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut fetches = fetch_all(&api, ticket.resources);
        while let Some(outcome) = fetches.next().await {
            if events.send(CycleEvent { ticket, outcome }).is_err() {
                debug!(generation = ticket.generation, "cycle receiver dropped");
                break;
            }
        }
    })
}

pub struct SyncController<N: Notifier> {
    api: Arc<dyn ServiceDeskApi>,
    notifier: N,
    state: ViewState,
}

impl<N: Notifier> SyncController<N> {
    pub fn new(api: Arc<dyn ServiceDeskApi>, notifier: N) -> Self {
        Self {
            api,
            notifier,
            state: ViewState::default(),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Switches to `module` and waits for its cycle to settle.
    pub async fn select_module(&mut self, module: Module) {
        let ticket = self.state.begin(module);
        info!(
            module = %module,
            generation = ticket.generation,
            resources = ticket.resources.len(),
            "load cycle started"
        );
        let mut fetches = fetch_all(&self.api, ticket.resources);
        while let Some(outcome) = fetches.next().await {
            self.settle(&ticket, outcome);
        }
        info!(module = %module, generation = ticket.generation, "load cycle finished");
    }

    pub async fn refresh(&mut self) {
        self.select_module(self.state.active_module).await;
    }

    /// Sends `request`; on success notifies and refreshes the active module.
    pub async fn create_incident(&mut self, request: &CreateIncidentRequest) -> bool {
        match self.api.create_incident(request).await {
            Ok(()) => {
                info!(title = %request.title, priority = %request.priority, "incident created");
                self.notifier
                    .notify(Notification::success("Incident created successfully"));
                self.refresh().await;
                true
            }
            Err(error) => {
                warn!(%error, "incident creation failed");
                self.notifier.notify(Notification::error(format!(
                    "Failed to create incident: {error}"
                )));
                false
            }
        }
    }

    /// Submits the dialog. Validation failures never reach the network and
    /// leave the dialog open; otherwise the dialog closes whatever the
    /// outcome. Returns whether the incident was created.
    pub async fn submit_dialog(&mut self, dialog: &mut IncidentDialog) -> Result<bool, FormError> {
        let request = dialog.begin_submit()?;
        let created = self.create_incident(&request).await;
        dialog.complete_submit();
        Ok(created)
    }

    /// Starts a cycle for `module` without waiting for it; results arrive on
    /// `events` and must be fed back through [`Self::handle_event`].
    pub fn begin_detached(
        &mut self,
        module: Module,
        events: mpsc::UnboundedSender<CycleEvent>,
    ) -> LoadTicket {
        let ticket = self.state.begin(module);
        debug!(module = %module, generation = ticket.generation, "detached cycle started");
        spawn_cycle(Arc::clone(&self.api), ticket, events);
        ticket
    }

    pub fn refresh_detached(&mut self, events: mpsc::UnboundedSender<CycleEvent>) -> LoadTicket {
        self.begin_detached(self.state.active_module, events)
    }

    /// Returns false when the event belonged to a superseded cycle.
    pub fn handle_event(&mut self, event: CycleEvent) -> bool {
        self.settle(&event.ticket, event.outcome)
    }

    fn settle(&mut self, ticket: &LoadTicket, outcome: ResourceOutcome) -> bool {
        match self.state.apply(ticket, outcome) {
            ApplyOutcome::Updated(resource) => {
                debug!(%resource, generation = ticket.generation, "resource loaded");
                true
            }
            ApplyOutcome::Failed(resource, error) => {
                warn!(%resource, %error, "resource load failed");
                self.notifier.notify(Notification::error(format!(
                    "Failed to load {resource}: {error}"
                )));
                true
            }
            ApplyOutcome::Stale => {
                debug!(
                    generation = ticket.generation,
                    current = self.state.generation,
                    "discarding stale cycle result"
                );
                false
            }
        }
    }
}
