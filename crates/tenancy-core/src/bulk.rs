//! Background workers for bulk baseline writes.
//!
//! A bulk request is checked against the batch size up front, then queued.
//! A fixed pool of worker tasks drains the queue and runs each job through
//! [`BaselineService::bulk_update`]. Submitters get a [`BulkTicket`] they may
//! await for the per-item results or simply drop.

use std::sync::Arc;

use tenancy_types::{BulkBaselineEntry, BulkOperationResult, TenantId};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info};

use crate::baseline::BaselineService;
use crate::config::BaselineConfig;
use crate::error::{CoreError, CoreResult};

type BulkOutcome = CoreResult<Vec<BulkOperationResult>>;

struct BulkJob {
    tenant: TenantId,
    entries: Vec<BulkBaselineEntry>,
    reply: oneshot::Sender<BulkOutcome>,
}

/// Handle to the bulk worker pool. Cloning shares the same queue; the
/// workers stop once every handle is dropped and the queue is drained.
#[derive(Clone)]
pub struct BulkUpdateManager {
    jobs: mpsc::Sender<BulkJob>,
    service: BaselineService,
    workers: usize,
}

impl BulkUpdateManager {
    /// Spawn `config.workers` workers (at least one) on the current runtime.
    pub fn start(service: BaselineService, config: &BaselineConfig) -> Self {
        let (jobs, queue) = mpsc::channel(config.max_jobs.max(1));
        let queue = Arc::new(Mutex::new(queue));
        let workers = config.workers.max(1);
        for worker in 1..=workers {
            tokio::spawn(run_worker(worker, service.clone(), queue.clone()));
        }
        debug!(workers, max_jobs = config.max_jobs, "bulk baseline workers started");
        Self {
            jobs,
            service,
            workers,
        }
    }

    /// Queue a bulk request. Waits while the queue is full.
    ///
    /// Oversized requests are refused here and never queued.
    pub async fn submit(
        &self,
        tenant: TenantId,
        entries: Vec<BulkBaselineEntry>,
    ) -> CoreResult<BulkTicket> {
        self.service.check_batch(&tenant, entries.len())?;
        let (reply, outcome) = oneshot::channel();
        self.jobs
            .send(BulkJob {
                tenant,
                entries,
                reply,
            })
            .await
            .map_err(|_| CoreError::Internal("bulk baseline workers have stopped".into()))?;
        Ok(BulkTicket { outcome })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl std::fmt::Debug for BulkUpdateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkUpdateManager")
            .field("workers", &self.workers)
            .field("queue_capacity", &self.jobs.capacity())
            .finish()
    }
}

/// Pending result of one queued bulk request.
#[derive(Debug)]
pub struct BulkTicket {
    outcome: oneshot::Receiver<BulkOutcome>,
}

impl BulkTicket {
    /// Wait for the worker to finish the job.
    pub async fn outcome(self) -> BulkOutcome {
        self.outcome
            .await
            .map_err(|_| CoreError::Internal("bulk baseline job was dropped before it ran".into()))?
    }
}

async fn run_worker(
    worker: usize,
    service: BaselineService,
    queue: Arc<Mutex<mpsc::Receiver<BulkJob>>>,
) {
    loop {
        let job = queue.lock().await.recv().await;
        let Some(job) = job else {
            debug!(worker, "bulk baseline worker stopped");
            return;
        };

        let outcome = service.bulk_update(&job.tenant, &job.entries).await;
        match &outcome {
            Ok(results) => info!(
                worker,
                tenant = %job.tenant,
                items = results.len(),
                "bulk baseline job finished"
            ),
            Err(e) => error!(worker, tenant = %job.tenant, error = %e, "bulk baseline job failed"),
        }
        // The submitter may have dropped its ticket.
        let _ = job.reply.send(outcome);
    }
}
