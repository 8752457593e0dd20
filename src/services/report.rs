use crate::backends::ClusterClient;
use crate::error::PipelineError;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub attempts: u32,
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    /// Delay before retry number `retry` (1-based): initial doubled, capped.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// One HTTP reachability check against a found endpoint.
pub trait EndpointProbe {
    /// Status code on any response; `Err` when nothing answered.
    fn probe(&self, url: &str) -> Result<u16, String>;
}

pub struct HttpProbe {
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    pub fn new() -> crate::error::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| PipelineError::Config(format!("http client: {}", e)))?;
        Ok(Self { client })
    }
}

impl EndpointProbe for HttpProbe {
    fn probe(&self, url: &str) -> Result<u16, String> {
        self.client
            .get(url)
            .send()
            .map(|r| r.status().as_u16())
            .map_err(|e| e.to_string())
    }
}

#[derive(Debug, Default)]
pub struct EndpointReport {
    pub endpoint: Option<String>,
    pub reachable: Option<bool>,
    pub warnings: Vec<String>,
}

/// Wait for the service's load-balancer address, then optionally probe it.
/// Nothing here is fatal; problems become warnings.
pub fn report_endpoint(
    cluster: &dyn ClusterClient,
    probe: Option<&dyn EndpointProbe>,
    service: &str,
    backoff: Backoff,
    sleep: &mut dyn FnMut(Duration),
) -> EndpointReport {
    let mut report = EndpointReport::default();
    let attempts = backoff.attempts.max(1);

    let mut address = None;
    for attempt in 1..=attempts {
        match cluster.service_address(service) {
            Ok(Some(a)) => {
                address = Some(a);
                break;
            }
            Ok(None) => tracing::debug!(service, attempt, "load balancer address not assigned yet"),
            Err(e) => tracing::warn!(service, attempt, error = %e, "could not read service"),
        }
        if attempt < attempts {
            sleep(backoff.delay(attempt));
        }
    }

    let Some(address) = address else {
        let warning = PipelineError::EndpointNotReady {
            service: service.to_string(),
            attempts,
        };
        tracing::warn!("{}", warning);
        report.warnings.push(warning.to_string());
        return report;
    };

    let url = format!("http://{}/", address);
    tracing::info!(%url, "endpoint assigned");
    if let Some(probe) = probe {
        match probe.probe(&url) {
            Ok(status) => {
                tracing::info!(%url, status, "endpoint answered");
                report.reachable = Some(true);
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "endpoint did not answer yet");
                report.reachable = Some(false);
                report
                    .warnings
                    .push(format!("{} did not answer: {}", url, e));
            }
        }
    }
    report.endpoint = Some(url);
    report
}
