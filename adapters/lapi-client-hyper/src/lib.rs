//! Hyper decision service client
//!
//! Implements [`LapiClient`] over HTTP/1.1, with rustls for `https` endpoints.
//! Every request carries the `X-Api-Key` header and is bounded by the
//! configured timeout, response body included.

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode, header};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use url::Url;

use warden::decision::RawDecision;
use warden::lapi_adapter::{
	ConnectionHealth, DecisionStream, DecisionStreamQuery, HealthError, LapiClient,
	UsageMetricsReport,
};
use warden::prelude::*;

pub const DEFAULT_USER_AGENT: &str = concat!("warden/v", env!("CARGO_PKG_VERSION"));

/// Address probed by the health check
const HEALTH_PROBE_IP: &str = "127.0.0.1";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LapiClientOpts {
	/// Base URL of the decision service, e.g. `http://127.0.0.1:8080/`
	pub url: Box<str>,
	pub api_key: Box<str>,
	pub timeout_ms: u64,
	pub user_agent: Box<str>,
}

impl Default for LapiClientOpts {
	fn default() -> Self {
		Self {
			url: "http://127.0.0.1:8080/".into(),
			api_key: "".into(),
			timeout_ms: 10_000,
			user_agent: DEFAULT_USER_AGENT.into(),
		}
	}
}

enum Transport {
	Http(Client<HttpConnector, Full<Bytes>>),
	Https(Client<HttpsConnector<HttpConnector>, Full<Bytes>>),
}

impl Transport {
	async fn request(
		&self,
		req: Request<Full<Bytes>>,
	) -> Result<hyper::Response<hyper::body::Incoming>, hyper_util::client::legacy::Error> {
		match self {
			Transport::Http(client) => client.request(req).await,
			Transport::Https(client) => client.request(req).await,
		}
	}
}

pub struct LapiClientHyper {
	base: Url,
	api_key: Box<str>,
	user_agent: Box<str>,
	timeout: Duration,
	transport: Transport,
}

impl fmt::Debug for LapiClientHyper {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LapiClientHyper")
			.field("url", &self.base.as_str())
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

impl LapiClientHyper {
	pub fn new(opts: &LapiClientOpts) -> WdResult<Self> {
		if opts.api_key.is_empty() {
			return Err(Error::ConfigError("decision service api key is required".into()));
		}

		let mut base = Url::parse(&opts.url).map_err(|e| {
			Error::ConfigError(format!("invalid decision service url {}: {}", opts.url, e))
		})?;
		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());
			base.set_path(&path);
		}

		let transport = match base.scheme() {
			"http" => Transport::Http(Client::builder(TokioExecutor::new()).build(HttpConnector::new())),
			"https" => {
				let connector = HttpsConnectorBuilder::new()
					.with_native_roots()
					.map_err(|_| Error::ConfigError("no native root CA certificates found".into()))?
					.https_only()
					.enable_http1()
					.build();
				Transport::Https(Client::builder(TokioExecutor::new()).build(connector))
			}
			scheme => {
				return Err(Error::ConfigError(format!(
					"unsupported decision service scheme: {}",
					scheme
				)));
			}
		};

		Ok(Self {
			base,
			api_key: opts.api_key.clone(),
			user_agent: opts.user_agent.clone(),
			timeout: Duration::from_millis(opts.timeout_ms),
			transport,
		})
	}

	fn endpoint(&self, path: &str, query: &[(&str, String)]) -> WdResult<Url> {
		let mut url = self
			.base
			.join(path)
			.map_err(|e| Error::Internal(format!("invalid endpoint {}: {}", path, e)))?;
		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query);
		}
		Ok(url)
	}

	async fn send(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> WdResult<(StatusCode, Bytes)> {
		let mut builder = Request::builder()
			.method(method.clone())
			.uri(url.as_str())
			.header("X-Api-Key", &*self.api_key)
			.header(header::USER_AGENT, &*self.user_agent)
			.header(header::ACCEPT, "application/json");
		if body.is_some() {
			builder = builder.header(header::CONTENT_TYPE, "application/json");
		}
		let req = builder
			.body(Full::new(Bytes::from(body.unwrap_or_default())))
			.map_err(|e| Error::Internal(format!("request build error: {}", e)))?;

		let exchange = async {
			let res = self
				.transport
				.request(req)
				.await
				.map_err(|e| Error::NetworkError(e.to_string()))?;
			let status = res.status();
			let body = res
				.into_body()
				.collect()
				.await
				.map_err(|e| Error::NetworkError(e.to_string()))?
				.to_bytes();
			Ok::<_, Error>((status, body))
		};

		let (status, body) = tokio::time::timeout(self.timeout, exchange)
			.await
			.map_err(|_| Error::Timeout)??;
		debug!(method = %method, path = url.path(), status = status.as_u16(), "Decision service call");
		Ok((status, body))
	}
}

fn check_status(status: StatusCode) -> WdResult<()> {
	match status {
		s if s.is_success() => Ok(()),
		StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Unauthorized),
		s => Err(Error::UpstreamStatus(s.as_u16())),
	}
}

/// Health verdict of a probe's HTTP status
pub fn health_from_status(status: u16) -> ConnectionHealth {
	match status {
		200..=299 => ConnectionHealth::ok(),
		401 | 403 => ConnectionHealth::error(HealthError::InvalidApiToken),
		500..=599 => ConnectionHealth::error(HealthError::SecurityEngineServerError),
		_ => ConnectionHealth::error(HealthError::UnexpectedStatus),
	}
}

/// Query string of a stream request; empty filters are left out
pub fn stream_query(query: &DecisionStreamQuery) -> Vec<(&'static str, String)> {
	let mut pairs = vec![("startup", query.is_first_fetch.to_string())];
	let filters = [
		("origins", &query.origins),
		("scopes", &query.scopes),
		("scenarios_containing", &query.scenarios_containing),
		("scenarios_not_containing", &query.scenarios_not_containing),
	];
	for (name, values) in filters {
		if let Some(values) = values.as_deref().filter(|values| !values.is_empty()) {
			pairs.push((name, values.join(",")));
		}
	}
	pairs
}

#[async_trait]
impl LapiClient for LapiClientHyper {
	async fn check_connection_health(&self) -> ConnectionHealth {
		let url = match self.endpoint("v1/decisions", &[("ip", HEALTH_PROBE_IP.to_string())]) {
			Ok(url) => url,
			Err(e) => {
				warn!(error = %e, "Health probe could not be built");
				return ConnectionHealth::error(HealthError::UnexpectedStatus);
			}
		};

		match self.send(Method::GET, url, None).await {
			Ok((status, _)) => health_from_status(status.as_u16()),
			Err(e @ (Error::NetworkError(_) | Error::Timeout)) => {
				warn!(error = %e, "Decision service unreachable");
				ConnectionHealth::error(HealthError::SecurityEngineUnreachable)
			}
			Err(e) => {
				warn!(error = %e, "Health probe failed");
				ConnectionHealth::error(HealthError::UnexpectedStatus)
			}
		}
	}

	async fn get_decisions_matching_ip(&self, ip: &IpAddr) -> WdResult<Vec<RawDecision>> {
		let url = self.endpoint("v1/decisions", &[("ip", ip.to_string())])?;
		let (status, body) = self.send(Method::GET, url, None).await?;
		check_status(status)?;

		if body.is_empty() {
			return Ok(Vec::new());
		}
		// no match is answered with `null`
		let decisions: Option<Vec<RawDecision>> = serde_json::from_slice(&body)?;
		Ok(decisions.unwrap_or_default())
	}

	async fn get_decision_stream(&self, query: &DecisionStreamQuery) -> WdResult<DecisionStream> {
		let url = self.endpoint("v1/decisions/stream", &stream_query(query))?;
		let (status, body) = self.send(Method::GET, url, None).await?;
		check_status(status)?;

		if body.is_empty() {
			return Ok(DecisionStream::default());
		}
		Ok(serde_json::from_slice(&body)?)
	}

	async fn push_usage_metrics(&self, report: &UsageMetricsReport) -> WdResult<u16> {
		let url = self.endpoint("v1/usage-metrics", &[])?;
		let body = serde_json::to_vec(report)?;
		let (status, _) = self.send(Method::POST, url, Some(body)).await?;
		Ok(status.as_u16())
	}
}


// vim: ts=4
