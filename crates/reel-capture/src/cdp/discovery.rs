//! Debug target discovery over the browser's HTTP endpoint.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::CaptureError;
use crate::types::duration_ms;

/// One entry of the `/json` target list.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// Target identifier.
    #[serde(default)]
    pub id: String,
    /// Target kind (`page`, `service_worker`, ...).
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Current URL of the target.
    #[serde(default)]
    pub url: String,
    /// Socket endpoint, absent when another client is already attached.
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

/// Discovery endpoint for a local debug port.
pub fn discovery_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}/json")
}

/// Poll the discovery endpoint until it lists a target, then return that
/// target's socket URL.
///
/// Connection errors and empty or unparsable lists are retried every
/// `poll_interval` until `timeout` elapses. A request still in flight at the
/// deadline is abandoned.
pub async fn wait_until_ready(
    client: &reqwest::Client,
    port: u16,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<String, CaptureError> {
    let url = discovery_url(port);
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match tokio::time::timeout_at(deadline, poll_once(client, &url)).await {
            Ok(Some(ws_url)) => {
                debug!(port, attempts, ws_url = %ws_url, "debug target ready");
                return Ok(ws_url);
            }
            Ok(None) => {}
            Err(_) => trace!(attempts, "discovery request outlived the deadline"),
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }

    Err(CaptureError::DiscoveryTimeout {
        port,
        timeout_ms: duration_ms(timeout),
    })
}

async fn poll_once(client: &reqwest::Client, url: &str) -> Option<String> {
    let resp = match client.get(url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            trace!(error = %e, "discovery endpoint not reachable yet");
            return None;
        }
    };
    if !resp.status().is_success() {
        trace!(status = %resp.status(), "discovery endpoint not ready");
        return None;
    }
    let targets: Vec<TargetInfo> = resp.json().await.ok()?;
    select_target(&targets).map(String::from)
}

/// Pick the first listed target that exposes a socket endpoint.
pub fn select_target(targets: &[TargetInfo]) -> Option<&str> {
    targets
        .iter()
        .find_map(|t| t.web_socket_debugger_url.as_deref())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn target(id: &str, ws: Option<&str>) -> TargetInfo {
        TargetInfo {
            id: id.into(),
            kind: "page".into(),
            url: "about:blank".into(),
            web_socket_debugger_url: ws.map(String::from),
        }
    }

    #[test]
    fn select_first_target_with_socket() {
        let targets = vec![
            target("A", None),
            target("B", Some("ws://127.0.0.1:9222/devtools/page/B")),
            target("C", Some("ws://127.0.0.1:9222/devtools/page/C")),
        ];
        assert_eq!(
            select_target(&targets),
            Some("ws://127.0.0.1:9222/devtools/page/B")
        );
        assert_eq!(select_target(&[]), None);
    }

    #[test]
    fn target_info_parses_devtools_listing() {
        let raw = json!([{
            "description": "",
            "devtoolsFrontendUrl": "/devtools/inspector.html?ws=127.0.0.1:9222/devtools/page/X",
            "id": "X",
            "title": "about:blank",
            "type": "page",
            "url": "about:blank",
            "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/X"
        }]);
        let targets: Vec<TargetInfo> = serde_json::from_value(raw).unwrap();
        assert_eq!(targets[0].kind, "page");
        assert_eq!(select_target(&targets), Some("ws://127.0.0.1:9222/devtools/page/X"));
    }

    #[tokio::test]
    async fn ready_endpoint_returns_socket_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "P", "type": "page", "url": "about:blank",
                 "webSocketDebuggerUrl": "ws://127.0.0.1:1/devtools/page/P"}
            ])))
            .mount(&server)
            .await;

        let port = server.address().port();
        let client = reqwest::Client::new();
        let ws = wait_until_ready(&client, port, Duration::from_secs(2), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(ws, "ws://127.0.0.1:1/devtools/page/P");
    }

    #[tokio::test]
    async fn empty_list_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let port = server.address().port();
        let client = reqwest::Client::new();
        let timeout = Duration::from_millis(300);
        let err = wait_until_ready(&client, port, timeout, Duration::from_millis(20))
            .await
            .unwrap_err();
        match err {
            CaptureError::DiscoveryTimeout { port: p, timeout_ms } => {
                assert_eq!(p, port);
                assert_eq!(timeout_ms, 300);
            }
            other => panic!("expected DiscoveryTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn hung_endpoint_times_out_on_schedule() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let port = server.address().port();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap();
        let started = std::time::Instant::now();
        let timeout = Duration::from_millis(300);
        let err = wait_until_ready(&client, port, timeout, Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, CaptureError::DiscoveryTimeout { timeout_ms: 300, .. }));
        assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn unreachable_port_times_out() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = reqwest::Client::new();
        let timeout = Duration::from_millis(200);
        let err = wait_until_ready(&client, port, timeout, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::DiscoveryTimeout { .. }));
    }
}
