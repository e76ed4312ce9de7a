use chrono::Utc;
use shared::domain::{Category, CiStatus, CiType, IncidentStatus, Priority};
use storage::{NewConfigurationItem, NewIncident, Storage};

fn new_incident(title: &str) -> NewIncident {
    NewIncident {
        title: title.to_string(),
        description: None,
        priority: Priority::High,
        status: IncidentStatus::New,
        category: Some(Category::Network),
        assignee: None,
        sla_deadline: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn records_and_id_sequence_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("nested").join("desk.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    {
        let storage = Storage::new(&database_url).await.expect("first open");
        let first = storage
            .insert_incident(&new_incident("Core switch reboot loop"))
            .await
            .expect("insert incident");
        assert_eq!(first.incident_id, "INC-001");
        storage
            .insert_cmdb_item(&NewConfigurationItem {
                name: "CORE-SW-01".to_string(),
                ci_type: CiType::Network,
                status: CiStatus::Active,
                location: Some("DC-1".to_string()),
                owner: None,
                description: None,
                ip_address: Some("10.0.0.2".to_string()),
                serial_number: None,
                purchase_date: None,
                warranty_expiry: None,
                created_at: Utc::now(),
            })
            .await
            .expect("insert ci");
        storage.pool().close().await;
    }

    let storage = Storage::new(&database_url).await.expect("reopen");
    let incidents = storage.list_incidents().await.expect("list incidents");
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].category, Some(Category::Network));

    let second = storage
        .insert_incident(&new_incident("Uplink flapping"))
        .await
        .expect("insert after reopen");
    assert_eq!(second.incident_id, "INC-002");

    let items = storage.list_cmdb_items().await.expect("list cmdb");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].ci_id, "CI-001");
    assert_eq!(items[0].ip_address.as_deref(), Some("10.0.0.2"));
}
