use crate::error::{Result, SupervisorError};
use crate::traffic::{ClientTraffic, Traffic, TrafficDelta};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::time::Duration;

const JSON_UTF8: &str = "application/json; charset=UTF-8";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrafficReport<'a> {
    client_traffics: &'a [ClientTraffic],
    inbound_traffics: &'a [Traffic],
}

/// Posts each delta to an external HTTP endpoint
///
/// One attempt per call; failures are returned to the caller, which logs
/// and drops them. The next cycle reports a fresh delta anyway.
#[derive(Debug, Clone)]
pub struct TrafficReporter {
    client: reqwest::Client,
}

impl TrafficReporter {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SupervisorError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub async fn report(&self, url: &str, delta: &TrafficDelta) -> Result<()> {
        if url.trim().is_empty() {
            return Err(SupervisorError::ConfigError(
                "external traffic inform URI is empty".to_string(),
            ));
        }

        let body = TrafficReport {
            client_traffics: &delta.clients,
            inbound_traffics: &delta.inbounds,
        };

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, JSON_UTF8)
            .json(&body)
            .send()
            .await
            .map_err(|e| SupervisorError::ExternalApiUnreachable(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SupervisorError::ExternalApiNonSuccess(status.as_u16()));
        }

        tracing::debug!("Successfully informed external API about traffic");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accepts one request, answers with `status`, and returns the raw request
    async fn one_shot_server(status: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/traffic", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (url, handle)
    }

    fn sample_delta() -> TrafficDelta {
        TrafficDelta::new(
            vec![Traffic {
                is_inbound: true,
                tag: "inbound-443".to_string(),
                up: 100,
                down: 200,
                ..Default::default()
            }],
            vec![ClientTraffic {
                email: "a@example.com".to_string(),
                up: 10,
                down: 20,
                ..Default::default()
            }],
        )
    }

    #[tokio::test]
    async fn test_report_success() {
        let (url, server) = one_shot_server("200 OK").await;
        let reporter = TrafficReporter::new(Duration::from_secs(5)).unwrap();

        reporter.report(&url, &sample_delta()).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /traffic HTTP/1.1"));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/json; charset=utf-8"));

        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["clientTraffics"][0]["email"], "a@example.com");
        assert_eq!(json["inboundTraffics"][0]["Tag"], "inbound-443");
    }

    #[tokio::test]
    async fn test_report_non_success_status() {
        let (url, server) = one_shot_server("500 Internal Server Error").await;
        let reporter = TrafficReporter::new(Duration::from_secs(5)).unwrap();

        let result = reporter.report(&url, &sample_delta()).await;

        assert!(matches!(result, Err(SupervisorError::ExternalApiNonSuccess(500))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_report_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/traffic", listener.local_addr().unwrap());
        drop(listener);

        let reporter = TrafficReporter::new(Duration::from_secs(5)).unwrap();
        let result = reporter.report(&url, &sample_delta()).await;

        assert!(matches!(result, Err(SupervisorError::ExternalApiUnreachable(_))));
    }

    #[tokio::test]
    async fn test_report_times_out() {
        // Accepts but never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/traffic", listener.local_addr().unwrap());
        let _server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let reporter = TrafficReporter::new(Duration::from_millis(200)).unwrap();
        let started = std::time::Instant::now();
        let result = reporter.report(&url, &sample_delta()).await;

        assert!(matches!(result, Err(SupervisorError::ExternalApiUnreachable(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_report_empty_url() {
        let reporter = TrafficReporter::new(Duration::from_secs(5)).unwrap();
        let result = reporter.report("  ", &sample_delta()).await;

        assert!(matches!(result, Err(SupervisorError::ConfigError(_))));
    }
}
