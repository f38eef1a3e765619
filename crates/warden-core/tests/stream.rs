//! Stream mode synchronization

mod common;

use std::sync::Arc;

use common::{ScriptedLapi, raw, stream, stream_config, warden};
use warden_core::{RefreshOptions, WardenConfig};
use warden_types::lapi_adapter::DecisionStream;
use warden_types::types::Remediation;

#[tokio::test]
async fn test_cold_cache_bypasses_without_upstream() {
	let lapi = ScriptedLapi::with_live(vec![raw("cscli", "ban", "ip", "1.2.3.4", "1h")]);
	let warden = warden(lapi.clone(), stream_config());

	assert!(!warden.is_warm().await.unwrap());
	let resolution = warden.get_ip_remediation("1.2.3.4").await.unwrap();
	assert_eq!(resolution.remediation, Remediation::Bypass);
	assert_eq!(&*resolution.origin, "clean");
	assert_eq!(lapi.live_calls(), 0);
	assert!(lapi.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_first_fetch_only_once() {
	let lapi = Arc::new(ScriptedLapi::default());
	let warden = warden(lapi.clone(), stream_config());

	// empty diffs still warm the cache
	warden.refresh_decisions(RefreshOptions::default()).await.unwrap();
	assert!(warden.is_warm().await.unwrap());
	warden.refresh_decisions(RefreshOptions::default()).await.unwrap();
	warden.refresh_decisions(RefreshOptions::default()).await.unwrap();

	assert_eq!(lapi.first_fetch_flags(), vec![true, false, false]);
}

#[tokio::test]
async fn test_failed_fetch_keeps_state() {
	let lapi = Arc::new(ScriptedLapi::default());
	let warden = warden(lapi.clone(), stream_config());

	lapi.push_stream(None);
	assert!(warden.refresh_decisions(RefreshOptions::default()).await.is_err());
	assert!(!warden.is_warm().await.unwrap());

	lapi.push_stream(Some(stream(vec![raw("cscli", "ban", "ip", "1.2.3.4", "1h")], Vec::new())));
	warden.refresh_decisions(RefreshOptions::default()).await.unwrap();

	lapi.push_stream(None);
	assert!(warden.refresh_decisions(RefreshOptions::default()).await.is_err());
	assert!(warden.is_warm().await.unwrap());
	let resolution = warden.get_ip_remediation("1.2.3.4").await.unwrap();
	assert_eq!(resolution.remediation, Remediation::Ban);

	// a failed cycle is still a first fetch when retried
	assert_eq!(lapi.first_fetch_flags(), vec![true, true, false]);
}

#[tokio::test]
async fn test_null_lists_are_empty() {
	let lapi = Arc::new(ScriptedLapi::default());
	let warden = warden(lapi.clone(), stream_config());

	lapi.push_stream(Some(DecisionStream { new: None, deleted: None }));
	let outcome = warden.refresh_decisions(RefreshOptions::default()).await.unwrap();
	assert!(outcome.new.is_empty());
	assert!(outcome.deleted.is_empty());
	assert!(warden.is_warm().await.unwrap());
}

#[tokio::test]
async fn test_outcome_lists_changes() {
	let lapi = Arc::new(ScriptedLapi::default());
	let warden = warden(lapi.clone(), stream_config());

	let ban = raw("cscli", "ban", "ip", "1.2.3.4", "1h");
	lapi.push_stream(Some(stream(
		vec![ban.clone(), raw("cscli", "ban", "ip", "5.6.7.8", "garbage")],
		Vec::new(),
	)));
	let outcome = warden.refresh_decisions(RefreshOptions::default()).await.unwrap();
	assert_eq!(outcome.new.len(), 1);
	assert_eq!(&*outcome.new[0].id, "cscli-ban-ip-1.2.3.4");

	// deleted decisions often come with an already elapsed duration
	let mut deleted = ban;
	deleted.duration = "-10m".into();
	lapi.push_stream(Some(stream(Vec::new(), vec![deleted])));
	let outcome = warden.refresh_decisions(RefreshOptions::default()).await.unwrap();
	assert!(outcome.new.is_empty());
	assert_eq!(outcome.deleted.len(), 1);

	let resolution = warden.get_ip_remediation("1.2.3.4").await.unwrap();
	assert_eq!(resolution.remediation, Remediation::Bypass);
}

#[tokio::test]
async fn test_reissued_decision_survives_diff() {
	let lapi = Arc::new(ScriptedLapi::default());
	let warden = warden(lapi.clone(), stream_config());

	let ban = raw("cscli", "ban", "ip", "1.2.3.4", "1h");
	lapi.push_stream(Some(stream(vec![ban.clone()], Vec::new())));
	warden.refresh_decisions(RefreshOptions::default()).await.unwrap();

	lapi.push_stream(Some(stream(vec![ban.clone()], vec![ban])));
	warden.refresh_decisions(RefreshOptions::default()).await.unwrap();

	let resolution = warden.get_ip_remediation("1.2.3.4").await.unwrap();
	assert_eq!(resolution.remediation, Remediation::Ban);
}

#[tokio::test]
async fn test_clear_cache_restarts_first_fetch() {
	let lapi = Arc::new(ScriptedLapi::default());
	let warden = warden(lapi.clone(), stream_config());

	lapi.push_stream(Some(stream(vec![raw("cscli", "ban", "ip", "1.2.3.4", "1h")], Vec::new())));
	warden.refresh_decisions(RefreshOptions::default()).await.unwrap();
	warden.clear_cache().await.unwrap();

	assert!(!warden.is_warm().await.unwrap());
	let resolution = warden.get_ip_remediation("1.2.3.4").await.unwrap();
	assert_eq!(resolution.remediation, Remediation::Bypass);

	warden.refresh_decisions(RefreshOptions::default()).await.unwrap();
	assert_eq!(lapi.first_fetch_flags(), vec![true, true]);
}

#[tokio::test]
async fn test_filters_fall_back_to_config() {
	let lapi = Arc::new(ScriptedLapi::default());
	let config = WardenConfig {
		stream_origins: Some(vec!["cscli".into(), "crowdsec".into()]),
		scenarios_containing: Some(vec!["ssh".into()]),
		..stream_config()
	};
	let warden = warden(lapi.clone(), config);

	warden.refresh_decisions(RefreshOptions::default()).await.unwrap();
	warden
		.refresh_decisions(RefreshOptions { origins: Some(vec!["lists".into()]), scopes: Some(vec!["ip".into()]) })
		.await
		.unwrap();

	let queries = lapi.queries.lock().unwrap();
	assert_eq!(queries[0].origins.as_deref().unwrap().len(), 2);
	assert!(queries[0].scopes.is_none());
	assert_eq!(queries[1].origins, Some(vec![Box::<str>::from("lists")]));
	assert_eq!(queries[1].scopes, Some(vec![Box::<str>::from("ip")]));
	assert!(queries.iter().all(|query| query.scenarios_containing.is_some()));
}

// vim: ts=4
