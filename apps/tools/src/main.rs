use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use server_api::{create_cmdb_item, create_incident, create_service_request, ApiContext};
use shared::{
    domain::{Category, CiStatus, CiType, IncidentStatus, Priority},
    protocol::{CreateConfigurationItem, CreateIncidentRequest, CreateServiceRequest},
};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/service_desk.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill an empty database with the demo incidents and configuration items.
    SeedDemo,
    CreateIncident {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "Medium")]
        priority: Priority,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        assignee: Option<String>,
    },
    CreateRequest {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "Medium")]
        priority: Priority,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        requester: Option<String>,
    },
    CreateCi {
        #[arg(long)]
        name: String,
        #[arg(long = "type", default_value = "Other")]
        ci_type: CiType,
        #[arg(long, default_value = "Active")]
        status: CiStatus,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        ip_address: Option<String>,
        #[arg(long)]
        serial_number: Option<String>,
    },
    SetIncidentStatus {
        incident_id: String,
        status: IncidentStatus,
        #[arg(long)]
        assignee: Option<String>,
    },
}

struct DemoIncident {
    title: &'static str,
    priority: Priority,
    category: Category,
    status: IncidentStatus,
    assignee: Option<&'static str>,
}

const DEMO_INCIDENTS: &[DemoIncident] = &[
    DemoIncident {
        title: "Mail server outage",
        priority: Priority::Critical,
        category: Category::Software,
        status: IncidentStatus::InProgress,
        assignee: Some("Ivanov I."),
    },
    DemoIncident {
        title: "CRM is slow",
        priority: Priority::High,
        category: Category::Software,
        status: IncidentStatus::Assigned,
        assignee: Some("Petrova A."),
    },
    DemoIncident {
        title: "No access to file storage",
        priority: Priority::Medium,
        category: Category::Access,
        status: IncidentStatus::Pending,
        assignee: None,
    },
    DemoIncident {
        title: "Accounting printer does not print",
        priority: Priority::Low,
        category: Category::Hardware,
        status: IncidentStatus::Resolved,
        assignee: Some("Sidorov P."),
    },
];

/// (name, type, status, location, owner)
const DEMO_CIS: &[(&str, CiType, CiStatus, &str, &str)] = &[
    ("MAIL-SRV-01", CiType::Server, CiStatus::Active, "DC-1", "IT department"),
    ("CRM-APP-PROD", CiType::Application, CiStatus::Active, "Cloud", "Sales"),
    ("SWITCH-FL3-02", CiType::Network, CiStatus::Active, "Office, floor 3", "IT department"),
    ("WS-ACC-15", CiType::Workstation, CiStatus::InRepair, "Accounting", "Accounting"),
];

#[derive(Debug, PartialEq, Eq)]
struct SeedSummary {
    incidents: usize,
    cmdb_items: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    let ctx = ApiContext { storage };

    match cli.command {
        Command::SeedDemo => {
            let summary = seed_demo(&ctx).await?;
            println!(
                "seeded {} incidents and {} configuration items",
                summary.incidents, summary.cmdb_items
            );
        }
        Command::CreateIncident {
            title,
            description,
            priority,
            category,
            assignee,
        } => {
            let created = create_incident(
                &ctx,
                CreateIncidentRequest {
                    title,
                    description: description.unwrap_or_default(),
                    priority,
                    category,
                    assignee,
                },
            )
            .await?;
            println!("created incident_id={}", created.incident_id);
        }
        Command::CreateRequest {
            title,
            description,
            priority,
            category,
            requester,
        } => {
            let created = create_service_request(
                &ctx,
                CreateServiceRequest {
                    title,
                    description,
                    priority,
                    category,
                    requester,
                    assignee: None,
                },
            )
            .await?;
            println!("created request_id={}", created.request_id);
        }
        Command::CreateCi {
            name,
            ci_type,
            status,
            location,
            owner,
            ip_address,
            serial_number,
        } => {
            let created = create_cmdb_item(
                &ctx,
                CreateConfigurationItem {
                    name,
                    ci_type,
                    status,
                    location,
                    owner,
                    description: None,
                    ip_address,
                    serial_number,
                },
            )
            .await?;
            println!("created ci_id={}", created.ci_id);
        }
        Command::SetIncidentStatus {
            incident_id,
            status,
            assignee,
        } => {
            let updated = ctx
                .storage
                .update_incident_status(&incident_id, status, assignee.as_deref())
                .await?;
            if !updated {
                bail!("no incident with id {incident_id}");
            }
            println!("{incident_id} is now {status}");
        }
    }

    Ok(())
}

async fn seed_demo(ctx: &ApiContext) -> Result<SeedSummary> {
    let existing_incidents = ctx.storage.list_incidents().await?.len();
    let existing_items = ctx.storage.list_cmdb_items().await?.len();
    if existing_incidents > 0 || existing_items > 0 {
        bail!(
            "database already holds {existing_incidents} incidents and {existing_items} configuration items; refusing to seed"
        );
    }

    for demo in DEMO_INCIDENTS {
        let created = create_incident(
            ctx,
            CreateIncidentRequest {
                title: demo.title.to_string(),
                description: String::new(),
                priority: demo.priority,
                category: Some(demo.category),
                assignee: None,
            },
        )
        .await?;
        if demo.status != IncidentStatus::New || demo.assignee.is_some() {
            ctx.storage
                .update_incident_status(&created.incident_id, demo.status, demo.assignee)
                .await?;
        }
        info!(incident_id = %created.incident_id, status = %demo.status, "seeded incident");
    }

    for &(name, ci_type, status, location, owner) in DEMO_CIS {
        let created = create_cmdb_item(
            ctx,
            CreateConfigurationItem {
                name: name.to_string(),
                ci_type,
                status,
                location: Some(location.to_string()),
                owner: Some(owner.to_string()),
                description: None,
                ip_address: None,
                serial_number: None,
            },
        )
        .await?;
        info!(ci_id = %created.ci_id, name, "seeded configuration item");
    }

    Ok(SeedSummary {
        incidents: DEMO_INCIDENTS.len(),
        cmdb_items: DEMO_CIS.len(),
    })
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
