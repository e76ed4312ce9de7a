use chrono::{DateTime, Duration, Utc};
use shared::{
    domain::{CiStatus, IncidentStatus, Priority, RequestStatus},
    error::ApiError,
    protocol::{
        ConfigurationItem, CreateConfigurationItem, CreateIncidentRequest, CreateServiceRequest,
        CreatedConfigurationItem, CreatedIncident, CreatedServiceRequest, DashboardStats,
        Incident, ServiceRequest,
    },
};
use storage::{NewConfigurationItem, NewIncident, NewServiceRequest, Storage};
use tracing::info;

const MAX_TITLE_CHARS: usize = 200;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

/// Hours allowed to resolve an incident of the given priority.
pub fn sla_window(priority: Priority) -> Duration {
    let hours = match priority {
        Priority::Critical => 2,
        Priority::High => 4,
        Priority::Medium => 8,
        Priority::Low => 24,
    };
    Duration::hours(hours)
}

pub async fn list_incidents(ctx: &ApiContext) -> Result<Vec<Incident>, ApiError> {
    ctx.storage.list_incidents().await.map_err(internal)
}

pub async fn create_incident(
    ctx: &ApiContext,
    req: CreateIncidentRequest,
) -> Result<CreatedIncident, ApiError> {
    create_incident_at(ctx, req, Utc::now()).await
}

pub async fn create_incident_at(
    ctx: &ApiContext,
    req: CreateIncidentRequest,
    now: DateTime<Utc>,
) -> Result<CreatedIncident, ApiError> {
    let title = validate_title(&req.title)?;
    let incident = ctx
        .storage
        .insert_incident(&NewIncident {
            title,
            description: non_empty(req.description),
            priority: req.priority,
            status: IncidentStatus::New,
            category: req.category,
            assignee: req.assignee.and_then(non_empty),
            sla_deadline: Some(now + sla_window(req.priority)),
            created_at: now,
        })
        .await
        .map_err(internal)?;
    info!(
        incident_id = %incident.incident_id,
        priority = %incident.priority,
        "incident created"
    );

    Ok(CreatedIncident {
        incident_id: incident.incident_id,
        title: incident.title,
        priority: incident.priority,
        status: incident.status,
        created_at: incident.created_at,
    })
}

pub async fn list_service_requests(ctx: &ApiContext) -> Result<Vec<ServiceRequest>, ApiError> {
    ctx.storage.list_service_requests().await.map_err(internal)
}

pub async fn create_service_request(
    ctx: &ApiContext,
    req: CreateServiceRequest,
) -> Result<CreatedServiceRequest, ApiError> {
    let title = validate_title(&req.title)?;
    let request = ctx
        .storage
        .insert_service_request(&NewServiceRequest {
            title,
            description: req.description.and_then(non_empty),
            priority: req.priority,
            status: RequestStatus::New,
            category: req.category.and_then(non_empty),
            requester: req.requester.and_then(non_empty),
            assignee: req.assignee.and_then(non_empty),
            created_at: Utc::now(),
        })
        .await
        .map_err(internal)?;
    info!(request_id = %request.request_id, "service request created");

    Ok(CreatedServiceRequest {
        request_id: request.request_id,
        title: request.title.unwrap_or_default(),
        priority: req.priority,
        status: request.status,
        created_at: request.created_at.unwrap_or_else(Utc::now),
    })
}

pub async fn list_cmdb_items(ctx: &ApiContext) -> Result<Vec<ConfigurationItem>, ApiError> {
    ctx.storage.list_cmdb_items().await.map_err(internal)
}

pub async fn create_cmdb_item(
    ctx: &ApiContext,
    req: CreateConfigurationItem,
) -> Result<CreatedConfigurationItem, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }
    let item = ctx
        .storage
        .insert_cmdb_item(&NewConfigurationItem {
            name: name.to_string(),
            ci_type: req.ci_type,
            status: req.status,
            location: req.location.and_then(non_empty),
            owner: req.owner.and_then(non_empty),
            description: req.description.and_then(non_empty),
            ip_address: req.ip_address.and_then(non_empty),
            serial_number: req.serial_number.and_then(non_empty),
            purchase_date: None,
            warranty_expiry: None,
            created_at: Utc::now(),
        })
        .await
        .map_err(internal)?;
    info!(ci_id = %item.ci_id, "configuration item created");

    Ok(CreatedConfigurationItem {
        ci_id: item.ci_id,
        name: item.name,
        ci_type: item.ci_type,
        status: item.status,
        created_at: item.updated_at,
    })
}

pub async fn dashboard_stats(ctx: &ApiContext) -> Result<DashboardStats, ApiError> {
    dashboard_stats_at(ctx, Utc::now()).await
}

pub async fn dashboard_stats_at(
    ctx: &ApiContext,
    now: DateTime<Utc>,
) -> Result<DashboardStats, ApiError> {
    let incidents = ctx.storage.list_incidents().await.map_err(internal)?;
    let requests = ctx.storage.list_service_requests().await.map_err(internal)?;
    let items = ctx.storage.list_cmdb_items().await.map_err(internal)?;
    Ok(compute_stats(&incidents, &requests, &items, now))
}

/// Aggregates dashboard counters.
///
/// An incident meets its SLA while its deadline is still ahead or once it is
/// resolved or closed. Incidents without a deadline are left out of the
/// percentage; with none at all the percentage is 100.
pub fn compute_stats(
    incidents: &[Incident],
    requests: &[ServiceRequest],
    items: &[ConfigurationItem],
    now: DateTime<Utc>,
) -> DashboardStats {
    let open_incidents = incidents
        .iter()
        .filter(|incident| !incident.status.is_terminal())
        .count() as u64;
    let active_requests = requests
        .iter()
        .filter(|request| !request.status.is_terminal())
        .count() as u64;
    let active_ci = items
        .iter()
        .filter(|item| item.status == CiStatus::Active)
        .count() as u64;

    let (met, total) = incidents
        .iter()
        .filter_map(|incident| incident.sla_deadline.map(|deadline| (incident, deadline)))
        .fold((0u64, 0u64), |(met, total), (incident, deadline)| {
            let on_time = deadline > now || incident.status.is_terminal();
            (met + u64::from(on_time), total + 1)
        });
    let sla_percentage = if total == 0 {
        100.0
    } else {
        (met as f64 / total as f64 * 1000.0).round() / 10.0
    };

    DashboardStats {
        open_incidents,
        sla_percentage,
        active_requests,
        active_ci,
    }
}

fn validate_title(raw: &str) -> Result<String, ApiError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ApiError::validation("title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::validation(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(title.to_string())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::internal(err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
