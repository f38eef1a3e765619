//! Exercises the client against a local stand-in decision service

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use warden::error::Error;
use warden::lapi_adapter::{
	DecisionStreamQuery, HealthError, HealthStatus, LapiClient, MetricItem, MetricsMeta,
	MetricsWindow, OsInfo, RemediationComponent, UsageMetricsReport,
};
use warden_lapi_client_hyper::{LapiClientHyper, LapiClientOpts};

const API_KEY: &str = "test-key";

#[derive(Default)]
struct Upstream {
	/// Status forced on every route, 0 for normal behaviour
	forced_status: AtomicU16,
	queries: Mutex<Vec<HashMap<String, String>>>,
	user_agents: Mutex<Vec<String>>,
	reports: Mutex<Vec<serde_json::Value>>,
}

type Shared = Arc<Upstream>;

fn guard(upstream: &Upstream, headers: &HeaderMap) -> Option<Response> {
	if let Some(agent) = headers.get("user-agent").and_then(|v| v.to_str().ok()) {
		upstream.user_agents.lock().unwrap().push(agent.to_string());
	}
	let forced = upstream.forced_status.load(Ordering::SeqCst);
	if forced != 0 {
		return Some(StatusCode::from_u16(forced).unwrap().into_response());
	}
	if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
		return Some(StatusCode::FORBIDDEN.into_response());
	}
	None
}

async fn decisions(
	State(upstream): State<Shared>,
	headers: HeaderMap,
	Query(query): Query<HashMap<String, String>>,
) -> Response {
	if let Some(res) = guard(&upstream, &headers) {
		return res;
	}
	match query.get("ip").map(String::as_str) {
		Some("1.2.3.4") => Json(serde_json::json!([{
			"origin": "cscli",
			"type": "ban",
			"scope": "Ip",
			"value": "1.2.3.4",
			"duration": "3h59m49.48s",
			"scenario": "manual 'ban' from 'localhost'"
		}]))
		.into_response(),
		_ => Json(serde_json::Value::Null).into_response(),
	}
}

async fn stream(
	State(upstream): State<Shared>,
	headers: HeaderMap,
	Query(query): Query<HashMap<String, String>>,
) -> Response {
	if let Some(res) = guard(&upstream, &headers) {
		return res;
	}
	upstream.queries.lock().unwrap().push(query);
	Json(serde_json::json!({
		"new": [{ "origin": "CAPI", "type": "ban", "scope": "Range", "value": "10.0.0.0/24", "duration": "24h", "scenario": "ssh-bf" }],
		"deleted": null
	}))
	.into_response()
}

async fn usage_metrics(
	State(upstream): State<Shared>,
	headers: HeaderMap,
	Json(report): Json<serde_json::Value>,
) -> Response {
	if let Some(res) = guard(&upstream, &headers) {
		return res;
	}
	upstream.reports.lock().unwrap().push(report);
	StatusCode::CREATED.into_response()
}

async fn slow() -> StatusCode {
	tokio::time::sleep(Duration::from_secs(5)).await;
	StatusCode::OK
}

async fn start() -> (SocketAddr, Shared) {
	let upstream = Shared::default();
	let app = Router::new()
		.route("/v1/decisions", get(decisions))
		.route("/v1/decisions/stream", get(stream))
		.route("/v1/usage-metrics", post(usage_metrics))
		.route("/slow/v1/decisions", get(slow))
		.with_state(upstream.clone());

	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	(addr, upstream)
}

fn client(url: String, api_key: &str) -> LapiClientHyper {
	LapiClientHyper::new(&LapiClientOpts {
		url: url.into(),
		api_key: api_key.into(),
		timeout_ms: 2_000,
		user_agent: "warden-test/1.0".into(),
	})
	.unwrap()
}

fn ip(raw: &str) -> IpAddr {
	raw.parse().unwrap()
}

#[tokio::test]
async fn test_decisions_matching_ip() {
	let (addr, upstream) = start().await;
	let client = client(format!("http://{}/", addr), API_KEY);

	let decisions = client.get_decisions_matching_ip(&ip("1.2.3.4")).await.unwrap();
	assert_eq!(decisions.len(), 1);
	assert_eq!(decisions[0].origin, "cscli");
	assert_eq!(decisions[0].kind, "ban");
	assert_eq!(decisions[0].duration, "3h59m49.48s");

	// `null` body
	let decisions = client.get_decisions_matching_ip(&ip("5.6.7.8")).await.unwrap();
	assert!(decisions.is_empty());

	assert_eq!(upstream.user_agents.lock().unwrap()[0], "warden-test/1.0");
}

#[tokio::test]
async fn test_wrong_key_is_unauthorized() {
	let (addr, _) = start().await;
	let client = client(format!("http://{}/", addr), "wrong");

	let res = client.get_decisions_matching_ip(&ip("1.2.3.4")).await;
	assert!(matches!(res, Err(Error::Unauthorized)));

	let health = client.check_connection_health().await;
	assert_eq!(health.status, HealthStatus::Error);
	assert_eq!(health.error, Some(HealthError::InvalidApiToken));
}

#[tokio::test]
async fn test_stream_query_and_body() {
	let (addr, upstream) = start().await;
	let client = client(format!("http://{}", addr), API_KEY);

	let query = DecisionStreamQuery {
		is_first_fetch: true,
		origins: Some(vec!["CAPI".into(), "cscli".into()]),
		scenarios_not_containing: Some(vec!["http".into()]),
		..DecisionStreamQuery::default()
	};
	let stream = client.get_decision_stream(&query).await.unwrap();
	let new = stream.new.unwrap();
	assert_eq!(new.len(), 1);
	assert_eq!(new[0].scope, "Range");
	assert!(stream.deleted.is_none());

	let queries = upstream.queries.lock().unwrap();
	assert_eq!(queries[0]["startup"], "true");
	assert_eq!(queries[0]["origins"], "CAPI,cscli");
	assert_eq!(queries[0]["scenarios_not_containing"], "http");
	assert!(!queries[0].contains_key("scopes"));
}

#[tokio::test]
async fn test_push_usage_metrics() {
	let (addr, upstream) = start().await;
	let client = client(format!("http://{}/", addr), API_KEY);

	let report = UsageMetricsReport {
		remediation_components: vec![RemediationComponent {
			name: "warden".into(),
			version: "0.3.2".into(),
			kind: "bouncer".into(),
			utc_startup_timestamp: 1_700_000_000,
			feature_flags: Vec::new(),
			os: OsInfo { name: "linux".into(), version: "unknown".into() },
			metrics: vec![MetricsWindow {
				meta: MetricsMeta { window_size_seconds: 60, utc_now_timestamp: 1_700_000_060 },
				items: vec![MetricItem {
					name: "processed".into(),
					value: 4,
					unit: "request".into(),
					labels: None,
				}],
			}],
		}],
	};

	assert_eq!(client.push_usage_metrics(&report).await.unwrap(), 201);
	let reports = upstream.reports.lock().unwrap();
	assert_eq!(reports[0]["remediation_components"][0]["type"], "bouncer");
	assert_eq!(reports[0]["remediation_components"][0]["metrics"][0]["items"][0]["value"], 4);
}

#[tokio::test]
async fn test_health() {
	let (addr, upstream) = start().await;
	let client = client(format!("http://{}/", addr), API_KEY);
	assert_eq!(client.check_connection_health().await.status, HealthStatus::Ok);

	upstream.forced_status.store(503, Ordering::SeqCst);
	let health = client.check_connection_health().await;
	assert_eq!(health.error, Some(HealthError::SecurityEngineServerError));
	assert!(matches!(
		client.get_decisions_matching_ip(&ip("1.2.3.4")).await,
		Err(Error::UpstreamStatus(503))
	));

	upstream.forced_status.store(404, Ordering::SeqCst);
	let health = client.check_connection_health().await;
	assert_eq!(health.error, Some(HealthError::UnexpectedStatus));
}

#[tokio::test]
async fn test_unreachable() {
	// grab a free port, then close it
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let client = client(format!("http://{}/", addr), API_KEY);
	let health = client.check_connection_health().await;
	assert_eq!(health.error, Some(HealthError::SecurityEngineUnreachable));
	assert!(matches!(
		client.get_decisions_matching_ip(&ip("1.2.3.4")).await,
		Err(Error::NetworkError(_))
	));
}

#[tokio::test]
async fn test_timeout() {
	let (addr, _) = start().await;
	let client = LapiClientHyper::new(&LapiClientOpts {
		url: format!("http://{}/slow/", addr).into(),
		api_key: API_KEY.into(),
		timeout_ms: 200,
		..LapiClientOpts::default()
	})
	.unwrap();

	assert!(matches!(
		client.get_decisions_matching_ip(&ip("1.2.3.4")).await,
		Err(Error::Timeout)
	));
}

// vim: ts=4
