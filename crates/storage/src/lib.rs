use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::debug;

use shared::{
    domain::{Category, CiStatus, CiType, IncidentStatus, Priority, RequestStatus},
    protocol::{ConfigurationItem, Incident, ServiceRequest},
};

const INCIDENT_ID_PREFIX: &str = "INC";
const REQUEST_ID_PREFIX: &str = "REQ";
const CI_ID_PREFIX: &str = "CI";

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct NewIncident {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: IncidentStatus,
    pub category: Option<Category>,
    pub assignee: Option<String>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewServiceRequest {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: RequestStatus,
    pub category: Option<String>,
    pub requester: Option<String>,
    pub assignee: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewConfigurationItem {
    pub name: String,
    pub ci_type: CiType,
    pub status: CiStatus,
    pub location: Option<String>,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub ip_address: Option<String>,
    pub serial_number: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_expiry: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        // Every connection to `sqlite::memory:` opens its own empty database.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };
        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Inserts an incident under the next sequential `INC-NNN` identifier.
    pub async fn insert_incident(&self, incident: &NewIncident) -> Result<Incident> {
        // One statement: the write lock is taken before the row count is read.
        let incident_id: String = sqlx::query_scalar(
            "INSERT INTO incidents
             (incident_id, title, description, priority, status, category, assignee, sla_deadline, created_at)
             SELECT ? || '-' || printf('%03d', COUNT(*) + 1), ?, ?, ?, ?, ?, ?, ?, ?
             FROM incidents
             RETURNING incident_id",
        )
        .bind(INCIDENT_ID_PREFIX)
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.priority.as_str())
        .bind(incident.status.as_str())
        .bind(incident.category.map(Category::as_str))
        .bind(&incident.assignee)
        .bind(incident.sla_deadline)
        .bind(incident.created_at)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert incident")?;
        debug!(%incident_id, "stored incident");

        Ok(Incident {
            incident_id,
            title: incident.title.clone(),
            description: incident.description.clone(),
            priority: incident.priority,
            status: incident.status,
            category: incident.category,
            assignee: incident.assignee.clone(),
            sla_deadline: incident.sla_deadline,
            created_at: incident.created_at,
            updated_at: None,
            resolved_at: None,
        })
    }

    /// All incidents, newest first.
    pub async fn list_incidents(&self) -> Result<Vec<Incident>> {
        let rows = sqlx::query(
            "SELECT incident_id, title, description, priority, status, category, assignee,
                    sla_deadline, created_at, updated_at, resolved_at
             FROM incidents
             ORDER BY created_at DESC, incident_id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(incident_from_row).collect()
    }

    pub async fn update_incident_status(
        &self,
        incident_id: &str,
        status: IncidentStatus,
        assignee: Option<&str>,
    ) -> Result<bool> {
        let now = Utc::now();
        let resolved_at = status.is_terminal().then_some(now);
        let updated = sqlx::query(
            "UPDATE incidents
             SET status = ?, assignee = COALESCE(?, assignee), updated_at = ?,
                 resolved_at = COALESCE(?, resolved_at)
             WHERE incident_id = ?",
        )
        .bind(status.as_str())
        .bind(assignee)
        .bind(now)
        .bind(resolved_at)
        .bind(incident_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    /// Inserts a service request under the next sequential `REQ-NNN` identifier.
    pub async fn insert_service_request(&self, request: &NewServiceRequest) -> Result<ServiceRequest> {
        let request_id: String = sqlx::query_scalar(
            "INSERT INTO service_requests
             (request_id, title, description, priority, status, category, requester, assignee, created_at)
             SELECT ? || '-' || printf('%03d', COUNT(*) + 1), ?, ?, ?, ?, ?, ?, ?, ?
             FROM service_requests
             RETURNING request_id",
        )
        .bind(REQUEST_ID_PREFIX)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.priority.as_str())
        .bind(request.status.as_str())
        .bind(&request.category)
        .bind(&request.requester)
        .bind(&request.assignee)
        .bind(request.created_at)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert service request")?;
        debug!(%request_id, "stored service request");

        Ok(ServiceRequest {
            request_id,
            status: request.status,
            title: Some(request.title.clone()),
            description: request.description.clone(),
            priority: Some(request.priority),
            category: request.category.clone(),
            requester: request.requester.clone(),
            assignee: request.assignee.clone(),
            created_at: Some(request.created_at),
            updated_at: None,
            completed_at: None,
        })
    }

    /// All service requests, newest first.
    pub async fn list_service_requests(&self) -> Result<Vec<ServiceRequest>> {
        let rows = sqlx::query(
            "SELECT request_id, title, description, priority, status, category, requester,
                    assignee, created_at, updated_at, completed_at
             FROM service_requests
             ORDER BY created_at DESC, request_id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(service_request_from_row).collect()
    }

    /// Inserts a configuration item under the next sequential `CI-NNN` identifier.
    pub async fn insert_cmdb_item(&self, item: &NewConfigurationItem) -> Result<ConfigurationItem> {
        let ci_id: String = sqlx::query_scalar(
            "INSERT INTO cmdb_items
             (ci_id, name, type, status, location, owner, description, ip_address, serial_number,
              purchase_date, warranty_expiry, created_at, updated_at)
             SELECT ? || '-' || printf('%03d', COUNT(*) + 1), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
             FROM cmdb_items
             RETURNING ci_id",
        )
        .bind(CI_ID_PREFIX)
        .bind(&item.name)
        .bind(item.ci_type.as_str())
        .bind(item.status.as_str())
        .bind(&item.location)
        .bind(&item.owner)
        .bind(&item.description)
        .bind(&item.ip_address)
        .bind(&item.serial_number)
        .bind(item.purchase_date)
        .bind(item.warranty_expiry)
        .bind(item.created_at)
        .bind(item.created_at)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert configuration item")?;
        debug!(%ci_id, "stored configuration item");

        Ok(ConfigurationItem {
            ci_id,
            name: item.name.clone(),
            ci_type: item.ci_type,
            status: item.status,
            location: item.location.clone(),
            owner: item.owner.clone(),
            description: item.description.clone(),
            ip_address: item.ip_address.clone(),
            serial_number: item.serial_number.clone(),
            purchase_date: item.purchase_date,
            warranty_expiry: item.warranty_expiry,
            created_at: Some(item.created_at),
            updated_at: item.created_at,
        })
    }

    /// All configuration items ordered by name.
    pub async fn list_cmdb_items(&self) -> Result<Vec<ConfigurationItem>> {
        let rows = sqlx::query(
            "SELECT ci_id, name, type, status, location, owner, description, ip_address,
                    serial_number, purchase_date, warranty_expiry, created_at, updated_at
             FROM cmdb_items
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(cmdb_item_from_row).collect()
    }
}

fn parse_label<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|err| anyhow!("invalid {column} value in storage: {err}"))
}

fn parse_optional_label<T>(row: &SqliteRow, column: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| {
        value
            .parse()
            .map_err(|err| anyhow!("invalid {column} value in storage: {err}"))
    })
    .transpose()
}

fn incident_from_row(row: &SqliteRow) -> Result<Incident> {
    Ok(Incident {
        incident_id: row.try_get("incident_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        priority: parse_label(row, "priority")?,
        status: parse_label(row, "status")?,
        category: parse_optional_label(row, "category")?,
        assignee: row.try_get("assignee")?,
        sla_deadline: row.try_get("sla_deadline")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

fn service_request_from_row(row: &SqliteRow) -> Result<ServiceRequest> {
    Ok(ServiceRequest {
        request_id: row.try_get("request_id")?,
        status: parse_label(row, "status")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        priority: parse_optional_label(row, "priority")?,
        category: row.try_get("category")?,
        requester: row.try_get("requester")?,
        assignee: row.try_get("assignee")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn cmdb_item_from_row(row: &SqliteRow) -> Result<ConfigurationItem> {
    Ok(ConfigurationItem {
        ci_id: row.try_get("ci_id")?,
        name: row.try_get("name")?,
        ci_type: parse_label(row, "type")?,
        status: parse_label(row, "status")?,
        location: row.try_get("location")?,
        owner: row.try_get("owner")?,
        description: row.try_get("description")?,
        ip_address: row.try_get("ip_address")?,
        serial_number: row.try_get("serial_number")?,
        purchase_date: row.try_get("purchase_date")?,
        warranty_expiry: row.try_get("warranty_expiry")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

/// File path behind a `sqlite:` url; `None` for in-memory and non-sqlite urls.
pub fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
