#![cfg(feature = "integration-tests")]

use common::domain::{
    DeviceStateRepository, Entry, EntryMeasurements, EntryReading, EntryRepository, EntryStatus,
    ListEntriesRepoInput, UpsertDeviceStateRepoInput,
};
use common::postgres::{
    ensure_schema, PostgresClient, PostgresConfig, PostgresDeviceStateRepository,
    PostgresEntryRepository,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

async fn setup_test_db() -> (ContainerAsync<Postgres>, PostgresClient) {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let client = PostgresClient::new(&PostgresConfig {
        host: host.to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_pool_size: 5,
    })
    .expect("Failed to create client");

    ensure_schema(&client).await.expect("Schema setup failed");
    // Idempotent
    ensure_schema(&client).await.expect("Second schema setup failed");

    (postgres, client)
}

fn ok_entry(uuid: &str, device_id: &str, created_date: i64, soil: &str) -> Entry {
    Entry {
        entry_uuid: uuid.to_string(),
        device_id: device_id.to_string(),
        created_date,
        reading: EntryReading::Ok(EntryMeasurements {
            accl_x: Decimal::from_str("0.1").unwrap(),
            accl_y: Decimal::from_str("-0.02").unwrap(),
            accl_z: Decimal::from_str("0.98").unwrap(),
            gyro_x: Decimal::from_str("1.5").unwrap(),
            gyro_y: Decimal::ZERO,
            gyro_z: Decimal::from_str("-3.25").unwrap(),
            roll: 88,
            pitch: 6,
            rain: Decimal::from_str("12.7").unwrap(),
            soil: Decimal::from_str(soil).unwrap(),
        }),
    }
}

fn error_entry(uuid: &str, device_id: &str, created_date: i64) -> Entry {
    Entry {
        entry_uuid: uuid.to_string(),
        device_id: device_id.to_string(),
        created_date,
        reading: EntryReading::SensorError,
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_insert_and_list_entries() {
    let (_container, client) = setup_test_db().await;
    let repo = PostgresEntryRepository::new(client);

    let first = ok_entry("e-1", "D1", 100, "512");
    assert!(repo.insert_entry(first.clone()).await.unwrap());
    assert!(repo.insert_entry(ok_entry("e-2", "D1", 200, "600")).await.unwrap());
    assert!(repo.insert_entry(error_entry("e-3", "D1", 300)).await.unwrap());
    assert!(repo.insert_entry(ok_entry("e-4", "D2", 400, "10")).await.unwrap());

    let mut ok_entries = repo
        .list_entries(ListEntriesRepoInput {
            device_id: "D1".to_string(),
            status: EntryStatus::Ok,
            limit: 10,
        })
        .await
        .unwrap();
    ok_entries.sort_by_key(|e| e.created_date);

    assert_eq!(ok_entries.len(), 2);
    assert_eq!(ok_entries[0], first);
    assert_eq!(ok_entries[1].entry_uuid, "e-2");

    let errors = repo
        .list_entries(ListEntriesRepoInput {
            device_id: "D1".to_string(),
            status: EntryStatus::SensorError,
            limit: 10,
        })
        .await
        .unwrap();

    assert_eq!(errors, vec![error_entry("e-3", "D1", 300)]);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_list_entries_respects_limit() {
    let (_container, client) = setup_test_db().await;
    let repo = PostgresEntryRepository::new(client);

    for i in 0..15 {
        let entry = ok_entry(&format!("e-{}", i), "D1", 100 + i, "100");
        repo.insert_entry(entry).await.unwrap();
    }

    let sample = repo
        .list_entries(ListEntriesRepoInput {
            device_id: "D1".to_string(),
            status: EntryStatus::Ok,
            limit: 10,
        })
        .await
        .unwrap();

    assert_eq!(sample.len(), 10);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_redelivered_entry_is_not_overwritten() {
    let (_container, client) = setup_test_db().await;
    let repo = PostgresEntryRepository::new(client);

    assert!(repo.insert_entry(ok_entry("e-1", "D1", 100, "512")).await.unwrap());
    assert!(!repo.insert_entry(ok_entry("e-1", "D1", 999, "1")).await.unwrap());

    let stored = repo
        .list_entries(ListEntriesRepoInput {
            device_id: "D1".to_string(),
            status: EntryStatus::Ok,
            limit: 10,
        })
        .await
        .unwrap();

    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].created_date, 100);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_device_state_upsert() {
    let (_container, client) = setup_test_db().await;
    let repo = PostgresDeviceStateRepository::new(client);

    assert!(repo.get_device_state("D1").await.unwrap().is_none());

    repo.upsert_device_state(UpsertDeviceStateRepoInput {
        device_id: "D1".to_string(),
        risk_factor: Decimal::from_str("0.1515838707447826736446545358").unwrap(),
        last_updated: 1_000,
    })
    .await
    .unwrap();

    let created = repo.get_device_state("D1").await.unwrap().unwrap();
    assert_eq!(
        created.risk_factor,
        Decimal::from_str("0.1515838707447826736446545358").unwrap()
    );
    assert_eq!(created.last_updated, 1_000);

    repo.upsert_device_state(UpsertDeviceStateRepoInput {
        device_id: "D1".to_string(),
        risk_factor: Decimal::ZERO,
        last_updated: 2_000,
    })
    .await
    .unwrap();

    let updated = repo.get_device_state("D1").await.unwrap().unwrap();
    assert_eq!(updated.risk_factor, Decimal::ZERO);
    assert_eq!(updated.last_updated, 2_000);
}
