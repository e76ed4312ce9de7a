use super::*;
use clap::Parser;
use server_api::dashboard_stats;

async fn memory_ctx() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext { storage }
}

#[tokio::test]
async fn seed_demo_fills_an_empty_database() {
    let ctx = memory_ctx().await;
    let summary = seed_demo(&ctx).await.expect("seed");
    assert_eq!(
        summary,
        SeedSummary {
            incidents: 4,
            cmdb_items: 4
        }
    );

    let incidents = ctx.storage.list_incidents().await.expect("incidents");
    assert_eq!(incidents.len(), 4);
    let printer = incidents
        .iter()
        .find(|i| i.title == "Accounting printer does not print")
        .expect("printer incident");
    assert_eq!(printer.status, IncidentStatus::Resolved);
    assert_eq!(printer.assignee.as_deref(), Some("Sidorov P."));
    assert!(printer.resolved_at.is_some());

    let items = ctx.storage.list_cmdb_items().await.expect("cmdb");
    let names: Vec<_> = items.iter().map(|ci| ci.name.as_str()).collect();
    assert_eq!(
        names,
        ["CRM-APP-PROD", "MAIL-SRV-01", "SWITCH-FL3-02", "WS-ACC-15"]
    );

    let stats = dashboard_stats(&ctx).await.expect("stats");
    assert_eq!(stats.open_incidents, 3);
    assert_eq!(stats.active_ci, 3);
}

#[tokio::test]
async fn seed_demo_refuses_non_empty_database() {
    let ctx = memory_ctx().await;
    seed_demo(&ctx).await.expect("first seed");
    let err = seed_demo(&ctx).await.expect_err("second seed must fail");
    assert!(err.to_string().contains("refusing to seed"));
    assert_eq!(ctx.storage.list_incidents().await.expect("list").len(), 4);
}

#[test]
fn cli_accepts_legacy_labels() {
    let cli = Cli::try_parse_from([
        "tools",
        "create-ci",
        "--name",
        "WS-HR-02",
        "--type",
        "Рабочая станция",
        "--status",
        "В ремонте",
    ])
    .expect("parse");
    match cli.command {
        Command::CreateCi {
            name,
            ci_type,
            status,
            ..
        } => {
            assert_eq!(name, "WS-HR-02");
            assert_eq!(ci_type, CiType::Workstation);
            assert_eq!(status, CiStatus::InRepair);
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn set_incident_status_takes_positional_arguments() {
    let cli = Cli::try_parse_from([
        "tools",
        "--database-url",
        "sqlite::memory:",
        "set-incident-status",
        "INC-003",
        "Closed",
    ])
    .expect("parse");
    assert_eq!(cli.database_url, "sqlite::memory:");
    assert!(matches!(
        cli.command,
        Command::SetIncidentStatus {
            status: IncidentStatus::Closed,
            ..
        }
    ));
}
