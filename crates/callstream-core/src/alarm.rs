//! Alarm raising: a trait boundary around the external alarm CLI invoked on
//! storage and child-process failures.

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::AppResult;

/// Raises an operational alarm to an external collaborator. Implementations
/// must not block the caller's event loop; failures here are logged, never
/// propagated, since an alarm-raising failure must not mask the original
/// error.
#[async_trait]
pub trait AlarmRaiser: Send + Sync {
    async fn raise(&self, component: &str, message: &str);
}

/// Shells out to the external alarm CLI located under `HTTPD_HOME`, using
/// the `APLI` application identifier, both read once from configuration at
/// startup.
pub struct ProcessAlarmRaiser {
    httpd_home: String,
    apli: String,
}

impl ProcessAlarmRaiser {
    #[must_use]
    pub fn new(httpd_home: impl Into<String>, apli: impl Into<String>) -> Self {
        Self {
            httpd_home: httpd_home.into(),
            apli: apli.into(),
        }
    }

    async fn invoke(&self, component: &str, message: &str) -> AppResult<()> {
        let path = format!("{}/bin/raise_alarm", self.httpd_home);
        Command::new(path)
            .arg("-a")
            .arg(&self.apli)
            .arg("-c")
            .arg(component)
            .arg("-m")
            .arg(message)
            .status()
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AlarmRaiser for ProcessAlarmRaiser {
    async fn raise(&self, component: &str, message: &str) {
        if let Err(err) = self.invoke(component, message).await {
            log::warn!("failed to raise alarm for {component}: {err}");
        }
    }
}

/// A no-op raiser, used in tests and for the memory-storage demo path.
#[derive(Default)]
pub struct NoopAlarmRaiser;

#[async_trait]
impl AlarmRaiser for NoopAlarmRaiser {
    async fn raise(&self, component: &str, message: &str) {
        log::debug!("alarm (noop): {component}: {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_raiser_never_panics() {
        let raiser = NoopAlarmRaiser;
        raiser.raise("persister", "storage write failed").await;
    }
}
