//! Device monitoring views over the sync ledger

mod helpers;

use helpers::{origin, TestCore};
use roster_core::{
	domain::{ConnectionStatus, NewContact},
	infra::sync::SyncRequest,
};

async fn seed(t: &TestCore, count: usize) {
	let rows = (0..count)
		.map(|i| NewContact::new(format!("Row{i}"), "Seed"))
		.collect();
	t.core
		.contacts()
		.bulk_import(rows, &origin("AG001"))
		.await
		.unwrap();
}

async fn pull(t: &TestCore, device: &str, agent: &str, since: i64) {
	t.core
		.delta()
		.resolve(&SyncRequest {
			device_id: device.into(),
			agent_code: agent.into(),
			last_known_version: since,
		})
		.await
		.unwrap();
}

#[tokio::test]
async fn test_health_is_full_with_no_devices() {
	let t = TestCore::new().await;
	let health = t.core.devices().health_summary(None).await.unwrap();

	assert_eq!(health.total_devices, 0);
	assert_eq!(health.health_percentage, 100.0);
	assert_eq!(health.outdated_threshold, 100);
}

#[tokio::test]
async fn test_outdated_threshold_is_strict() {
	let t = TestCore::new().await;
	t.register_agent("AG001").await;

	pull(&t, "eleven", "AG001", 0).await;
	seed(&t, 1).await;
	pull(&t, "exactly-ten", "AG001", 0).await;
	seed(&t, 10).await;
	assert_eq!(t.core.current_version().await.unwrap(), 11);

	let statuses = t.core.devices().all_device_status().await.unwrap();
	let behind = |device: &str| {
		statuses
			.iter()
			.find(|s| s.device_id == device)
			.map(|s| s.versions_behind)
			.unwrap()
	};
	assert_eq!(behind("exactly-ten"), 10);
	assert_eq!(behind("eleven"), 11);

	let outdated = t.core.devices().outdated_devices(Some(10)).await.unwrap();
	let ids: Vec<_> = outdated.iter().map(|s| s.device_id.as_str()).collect();
	assert_eq!(ids, vec!["eleven"]);

	let outdated = t.core.devices().outdated_devices(Some(9)).await.unwrap();
	let ids: Vec<_> = outdated.iter().map(|s| s.device_id.as_str()).collect();
	assert_eq!(ids, vec!["eleven", "exactly-ten"]);

	let health = t.core.devices().health_summary(Some(10)).await.unwrap();
	assert_eq!(health.outdated, 1);
	assert_eq!(health.total_devices, 2);
	assert_eq!(health.online, 2);
	assert_eq!(health.health_percentage, 100.0);
}

#[tokio::test]
async fn test_default_threshold_comes_from_config() {
	let t = TestCore::with(|config| config.monitoring.outdated_threshold = 2).await;
	pull(&t, "d1", "AG001", 0).await;
	seed(&t, 3).await;

	assert_eq!(t.core.devices().outdated_devices(None).await.unwrap().len(), 1);
	assert_eq!(t.core.devices().health_summary(None).await.unwrap().outdated, 1);
}

#[tokio::test]
async fn test_statuses_join_agent_metadata() {
	let t = TestCore::new().await;
	t.register_agent("AG001").await;
	seed(&t, 2).await;

	pull(&t, "phone-1", "AG001", 0).await;
	pull(&t, "phone-2", "UNKNOWN", 0).await;

	let statuses = t.core.devices().all_device_status().await.unwrap();
	assert_eq!(statuses.len(), 2);

	let known = statuses.iter().find(|s| s.device_id == "phone-1").unwrap();
	assert_eq!(known.agent_name.as_deref(), Some("Agent AG001"));
	assert!(known.agent_active);
	assert_eq!(known.versions_behind, 0);
	assert_eq!(known.connection_status, ConnectionStatus::Online);

	let orphan = statuses.iter().find(|s| s.device_id == "phone-2").unwrap();
	assert_eq!(orphan.agent_name, None);
	assert!(!orphan.agent_active);

	let by_agent = t.core.devices().device_status_by_agent("AG001").await.unwrap();
	assert_eq!(by_agent.len(), 1);
}

#[tokio::test]
async fn test_sync_statistics() {
	let t = TestCore::new().await;
	seed(&t, 4).await;
	pull(&t, "d1", "AG001", 0).await;
	pull(&t, "d2", "AG002", 4).await;
	seed(&t, 1).await;

	let stats = t.core.devices().sync_statistics().await.unwrap();
	assert_eq!(stats.total_devices, 2);
	assert_eq!(stats.total_agents, 2);
	assert_eq!(stats.synced_last_hour, 2);
	assert_eq!(stats.failed_syncs, 0);
	assert_eq!(stats.max_versions_behind, 1);
	assert_eq!(stats.total_changes_delivered, 4);
	assert_eq!(stats.current_version, 5);
}

#[tokio::test]
async fn test_health_and_statuses_share_one_version() {
	let t = TestCore::new().await;
	seed(&t, 3).await;
	pull(&t, "d1", "AG001", 0).await;
	pull(&t, "d2", "AG001", 2).await;
	seed(&t, 2).await;

	let devices = t.core.devices();
	let health = devices.health_summary(Some(1)).await.unwrap();
	assert_eq!(health.current_version, 5);
	assert_eq!(health.outdated, 2);

	let stats = devices.sync_statistics().await.unwrap();
	assert_eq!(stats.current_version, health.current_version);
	assert_eq!(stats.max_versions_behind, 2);

	for status in devices.all_device_status().await.unwrap() {
		assert_eq!(status.current_version, health.current_version);
		assert_eq!(status.last_sync_version, 3);
		assert_eq!(status.versions_behind, 2);
	}
}
