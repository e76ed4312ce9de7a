use super::*;

fn new_incident(title: &str, created_at: DateTime<Utc>) -> NewIncident {
    NewIncident {
        title: title.to_string(),
        description: None,
        priority: Priority::Medium,
        status: IncidentStatus::New,
        category: Some(Category::Network),
        assignee: None,
        sla_deadline: Some(created_at + chrono::Duration::hours(8)),
        created_at,
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn incident_ids_are_sequential_and_zero_padded() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let now = Utc::now();
    let first = storage
        .insert_incident(&new_incident("Mail outage", now))
        .await
        .expect("first");
    let second = storage
        .insert_incident(&new_incident("Slow CRM", now))
        .await
        .expect("second");
    assert_eq!(first.incident_id, "INC-001");
    assert_eq!(second.incident_id, "INC-002");
}

#[tokio::test]
async fn lists_incidents_newest_first_with_labels_intact() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let earlier = Utc::now() - chrono::Duration::hours(2);
    let later = Utc::now();
    storage
        .insert_incident(&new_incident("older", earlier))
        .await
        .expect("older");
    storage
        .insert_incident(&new_incident("newer", later))
        .await
        .expect("newer");

    let incidents = storage.list_incidents().await.expect("list");
    assert_eq!(incidents.len(), 2);
    assert_eq!(incidents[0].title, "newer");
    assert_eq!(incidents[1].title, "older");
    assert_eq!(incidents[0].category, Some(Category::Network));
    assert_eq!(incidents[0].status, IncidentStatus::New);
    assert!(incidents[0].sla_deadline.is_some());
}

#[tokio::test]
async fn resolving_incident_stamps_resolved_at() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let incident = storage
        .insert_incident(&new_incident("Printer", Utc::now()))
        .await
        .expect("insert");

    let updated = storage
        .update_incident_status(&incident.incident_id, IncidentStatus::Resolved, Some("Sidorov P."))
        .await
        .expect("update");
    assert!(updated);

    let incidents = storage.list_incidents().await.expect("list");
    assert_eq!(incidents[0].status, IncidentStatus::Resolved);
    assert_eq!(incidents[0].assignee.as_deref(), Some("Sidorov P."));
    assert!(incidents[0].resolved_at.is_some());

    let missing = storage
        .update_incident_status("INC-999", IncidentStatus::Closed, None)
        .await
        .expect("update missing");
    assert!(!missing);
}

#[tokio::test]
async fn cmdb_items_are_ordered_by_name() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    for name in ["WS-ACC-15", "CRM-APP-PROD", "MAIL-SRV-01"] {
        storage
            .insert_cmdb_item(&NewConfigurationItem {
                name: name.to_string(),
                ci_type: CiType::Server,
                status: CiStatus::Active,
                location: Some("DC-1".into()),
                owner: None,
                description: None,
                ip_address: None,
                serial_number: None,
                purchase_date: NaiveDate::from_ymd_opt(2024, 3, 1),
                warranty_expiry: None,
                created_at: Utc::now(),
            })
            .await
            .expect("insert ci");
    }

    let items = storage.list_cmdb_items().await.expect("list");
    let names: Vec<_> = items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, ["CRM-APP-PROD", "MAIL-SRV-01", "WS-ACC-15"]);
    assert_eq!(items[0].ci_id, "CI-002");
    assert_eq!(items[1].purchase_date, NaiveDate::from_ymd_opt(2024, 3, 1));
}

#[tokio::test]
async fn stores_and_lists_service_requests() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let stored = storage
        .insert_service_request(&NewServiceRequest {
            title: "New laptop".into(),
            description: None,
            priority: Priority::Low,
            status: RequestStatus::New,
            category: Some("Equipment".into()),
            requester: Some("Petrova A.".into()),
            assignee: None,
            created_at: Utc::now(),
        })
        .await
        .expect("insert");
    assert_eq!(stored.request_id, "REQ-001");

    let requests = storage.list_service_requests().await.expect("list");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].priority, Some(Priority::Low));
    assert_eq!(requests[0].requester.as_deref(), Some("Petrova A."));
}

#[test]
fn sqlite_path_skips_memory_urls() {
    assert!(sqlite_path("sqlite::memory:").is_none());
    assert_eq!(
        sqlite_path("sqlite://./data/desk.db?mode=rwc"),
        Some(PathBuf::from("./data/desk.db"))
    );
}

#[test]
fn sqlite_path_treats_shared_cache_memory_urls_as_memory() {
    assert!(sqlite_path("sqlite://file::memory:?cache=shared").is_none());
    assert!(sqlite_path("postgres://localhost/desk").is_none());
    assert_eq!(
        sqlite_path("sqlite:data/desk.db"),
        Some(PathBuf::from("data/desk.db"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_on_file_database_get_distinct_ids() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("concurrent.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    let storage = Storage::new(&database_url).await.expect("db");

    let now = Utc::now();
    let handles = (0..8)
        .map(|n| {
            let storage = storage.clone();
            tokio::spawn(async move {
                storage
                    .insert_incident(&new_incident(&format!("parallel {n}"), now))
                    .await
            })
        })
        .collect::<Vec<_>>();

    let mut ids = Vec::new();
    for handle in handles {
        let stored = handle.await.expect("join").expect("insert");
        ids.push(stored.incident_id);
    }
    ids.sort();
    let expected = (1..=8).map(|n| format!("INC-{n:03}")).collect::<Vec<_>>();
    assert_eq!(ids, expected);
    assert_eq!(storage.list_incidents().await.expect("list").len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ci_and_request_inserts_do_not_fail() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("mixed.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    let storage = Storage::new(&database_url).await.expect("db");

    let mut handles = Vec::new();
    for n in 0..4 {
        let ci_storage = storage.clone();
        handles.push(tokio::spawn(async move {
            ci_storage
                .insert_cmdb_item(&NewConfigurationItem {
                    name: format!("SRV-{n}"),
                    ci_type: CiType::Server,
                    status: CiStatus::Active,
                    location: None,
                    owner: None,
                    description: None,
                    ip_address: None,
                    serial_number: None,
                    purchase_date: None,
                    warranty_expiry: None,
                    created_at: Utc::now(),
                })
                .await
                .map(|item| item.ci_id)
        }));
        let request_storage = storage.clone();
        handles.push(tokio::spawn(async move {
            request_storage
                .insert_service_request(&NewServiceRequest {
                    title: format!("Laptop {n}"),
                    description: None,
                    priority: Priority::Low,
                    status: RequestStatus::New,
                    category: None,
                    requester: None,
                    assignee: None,
                    created_at: Utc::now(),
                })
                .await
                .map(|request| request.request_id)
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.expect("join").expect("insert"));
    }
    ids.sort();
    assert_eq!(
        ids,
        ["CI-001", "CI-002", "CI-003", "CI-004", "REQ-001", "REQ-002", "REQ-003", "REQ-004"]
    );
}
