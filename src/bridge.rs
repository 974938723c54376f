//! Invoke-and-read-file integration with the out-of-process generators.
//!
//! A generator is started with its configured command line, awaited until it
//! exits (bounded by a timeout), and its output file is then read as one JSON
//! document. Anything short of a clean exit and a non-empty document is an
//! error, and the caller keeps whatever value it had before.

use crate::config::GeneratorConfig;
use crate::error::{AggregatorError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Generator output that can be checked for emptiness.
pub trait Payload {
    fn is_empty_payload(&self) -> bool;
}

impl<T> Payload for Vec<T> {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Payload for BTreeMap<K, V> {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

/// Something that produces a side-data payload on demand.
#[async_trait]
pub trait Generator<T>: Send + Sync {
    async fn generate(&self) -> Result<T>;
}

#[derive(Debug, Clone)]
pub struct ProcessBridge {
    config: GeneratorConfig,
}

impl ProcessBridge {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Runs the generator to completion and parses what it wrote.
    ///
    /// # Errors
    /// * `Timeout` if the process outlives the configured limit (it is killed)
    /// * `Process` if it cannot be started or exits unsuccessfully
    /// * `Io` / `Json` if the output file is missing or malformed
    /// * `EmptyOutput` if the document parses but holds nothing
    pub async fn run<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Payload,
    {
        self.execute().await?;

        let path = &self.config.output_path;
        let content = tokio::fs::read_to_string(path).await?;
        let parsed: T = serde_json::from_str(&content)?;

        if parsed.is_empty_payload() {
            return Err(AggregatorError::EmptyOutput { path: path.clone() });
        }

        Ok(parsed)
    }

    async fn execute(&self) -> Result<()> {
        let program = &self.config.program;
        debug!("Starting generator {} {:?}", program, self.config.args);

        let mut child = Command::new(program)
            .args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AggregatorError::Process {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        let status = match tokio::time::timeout(self.config.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill generator {}: {}", program, e);
                }
                return Err(AggregatorError::Timeout {
                    program: program.clone(),
                    secs: self.config.timeout.as_secs(),
                });
            }
        };

        if !status.success() {
            return Err(AggregatorError::Process {
                program: program.clone(),
                reason: format!("exited with {}", status),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl<T> Generator<T> for ProcessBridge
where
    T: DeserializeOwned + Payload + Send + 'static,
{
    async fn generate(&self) -> Result<T> {
        self.run().await
    }
}
