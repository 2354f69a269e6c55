use std::future::Future;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

use crate::ingestion::IngestionError;
use crate::shutdown::ShutdownTrigger;

type TaskResult<T> = Result<T, JoinError>;

/// Owns the long-running tasks and stops them in a fixed order.
///
/// Teardown always runs ingestion first, then the HTTP server, whichever
/// event started it. The caller closes the store pool and telemetry after
/// `run` returns, once nothing can reach them anymore.
pub struct Coordinator {
    ingestion: JoinHandle<Result<(), IngestionError>>,
    ingestion_trigger: ShutdownTrigger,
    server: JoinHandle<std::io::Result<()>>,
    server_trigger: ShutdownTrigger,
}

impl Coordinator {
    pub fn new(
        ingestion: JoinHandle<Result<(), IngestionError>>,
        ingestion_trigger: ShutdownTrigger,
        server: JoinHandle<std::io::Result<()>>,
        server_trigger: ShutdownTrigger,
    ) -> Self {
        Self {
            ingestion,
            ingestion_trigger,
            server,
            server_trigger,
        }
    }

    /// Run until `stop` resolves or a task ends on its own, then tear down.
    ///
    /// Returns an error if either task failed.
    pub async fn run<F>(self, stop: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let Coordinator {
            mut ingestion,
            ingestion_trigger,
            mut server,
            server_trigger,
        } = self;

        let mut ingestion_done: Option<TaskResult<Result<(), IngestionError>>> = None;
        let mut server_done: Option<TaskResult<std::io::Result<()>>> = None;

        tokio::select! {
            _ = stop => info!("Shutdown requested"),
            joined = &mut ingestion => ingestion_done = Some(joined),
            joined = &mut server => server_done = Some(joined),
        }

        info!("Stopping order ingestion...");
        ingestion_trigger.trigger();
        let ingestion_result = match ingestion_done {
            Some(joined) => joined,
            None => ingestion.await,
        };

        info!("Stopping HTTP server...");
        server_trigger.trigger();
        let server_result = match server_done {
            Some(joined) => joined,
            None => server.await,
        };

        let mut failure: Option<anyhow::Error> = None;

        match ingestion_result {
            Ok(Ok(())) => info!("Order ingestion stopped"),
            Ok(Err(e)) => {
                error!("Order ingestion failed: {}", e);
                failure = Some(e.into());
            }
            Err(e) => {
                error!("Order ingestion task aborted: {}", e);
                failure = Some(e.into());
            }
        }

        match server_result {
            Ok(Ok(())) => info!("HTTP server stopped"),
            Ok(Err(e)) => {
                error!("HTTP server failed: {}", e);
                failure.get_or_insert(e.into());
            }
            Err(e) => {
                error!("HTTP server task aborted: {}", e);
                failure.get_or_insert(e.into());
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
