//! Docker Engine implementation of [`LogSource`] built on bollard.

use crate::error::{DlogError, Result};
use crate::source::{Container, FrameStream, LogFrame, LogSource, WindowOptions};
use async_trait::async_trait;
use bollard::container::{ListContainersOptions, LogOutput, LogsOptions};
use bollard::Docker;
use futures::StreamExt;

/// Log source backed by the local Docker daemon.
pub struct DockerSource {
    client: Docker,
}

impl DockerSource {
    /// Connect to the daemon via the environment's default endpoint and
    /// verify it responds.
    pub async fn connect() -> Result<Self> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| DlogError::source_unavailable(e.to_string()))?;
        client
            .ping()
            .await
            .map_err(|e| DlogError::source_unavailable(e.to_string()))?;
        Ok(Self { client })
    }

    fn map_stream_error(container_id: &str, err: bollard::errors::Error) -> DlogError {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => DlogError::container_gone(container_id),
            other => DlogError::source_unavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl LogSource for DockerSource {
    async fn list(&self) -> Result<Vec<Container>> {
        let summaries = self
            .client
            .list_containers(Some(ListContainersOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(|e| DlogError::source_unavailable(e.to_string()))?;

        let containers = summaries
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                let name = c
                    .names
                    .unwrap_or_default()
                    .join(", ")
                    .trim_start_matches('/')
                    .to_string();
                Some(Container { id, name })
            })
            .collect();
        Ok(containers)
    }

    async fn open_window(&self, container_id: &str, options: WindowOptions) -> Result<FrameStream> {
        let logs_options = LogsOptions::<String> {
            follow: options.follow,
            stdout: options.stdout,
            stderr: options.stderr,
            timestamps: options.timestamps,
            since: options.since.unwrap_or(0),
            until: options.until.unwrap_or(0),
            tail: options
                .tail
                .map(|n| n.to_string())
                .unwrap_or_else(|| "all".to_string()),
        };

        let id = container_id.to_string();
        let stream = self
            .client
            .logs(container_id, Some(logs_options))
            .map(move |item| match item {
                Ok(LogOutput::StdOut { message }) => Ok(LogFrame::stdout(message.to_vec())),
                Ok(LogOutput::StdErr { message }) => Ok(LogFrame::stderr(message.to_vec())),
                // TTY containers deliver a single console stream; treat it as
                // stdout so the record still reaches the sink.
                Ok(LogOutput::Console { message }) => Ok(LogFrame::stdout(message.to_vec())),
                Ok(LogOutput::StdIn { .. }) => Ok(LogFrame::stdout(Vec::new())),
                Err(e) => Err(Self::map_stream_error(&id, e)),
            });

        Ok(Box::pin(stream))
    }
}
