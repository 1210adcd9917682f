//! Stream worker: one concurrent transfer loop inside a throughput session

use super::session::ByteCounter;
use crate::{
    client::SpeedTransport,
    error::{AppError, TransferError},
    logging::TransferLogger,
    types::Direction,
};
use bytes::Bytes;
use futures::StreamExt;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What a worker sends or requests on every transfer
#[derive(Debug, Clone)]
pub enum TransferPlan {
    /// Stream `request_bytes` from the download endpoint per transfer
    Download { request_bytes: u64 },
    /// Post `payload` to the upload endpoint per transfer
    Upload { payload: Bytes },
}

impl TransferPlan {
    pub fn direction(&self) -> Direction {
        match self {
            TransferPlan::Download { .. } => Direction::Download,
            TransferPlan::Upload { .. } => Direction::Upload,
        }
    }
}

/// Per-worker totals returned when the worker stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub worker_id: usize,
    /// Bytes this worker added to the session counter
    pub bytes: u64,
    /// Transfers that ran to completion
    pub transfers: u64,
    /// Transfers that failed (cancellation excluded)
    pub failures: u64,
    /// When bytes were last added to the counter
    pub last_credit: Option<Instant>,
}

/// Repeatedly issues one transfer at a time until the session is cancelled
pub struct StreamWorker {
    id: usize,
    plan: TransferPlan,
    transport: Arc<dyn SpeedTransport>,
    counter: Arc<ByteCounter>,
    cancel: CancellationToken,
    retry_backoff: Duration,
    drain_timeout: Duration,
    logger: Option<TransferLogger>,
    stats: WorkerStats,
}

impl StreamWorker {
    pub fn new(
        id: usize,
        plan: TransferPlan,
        transport: Arc<dyn SpeedTransport>,
        counter: Arc<ByteCounter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            plan,
            transport,
            counter,
            cancel,
            retry_backoff: crate::defaults::DEFAULT_RETRY_BACKOFF,
            drain_timeout: crate::defaults::DEFAULT_DRAIN_TIMEOUT,
            logger: None,
            stats: WorkerStats {
                worker_id: id,
                ..WorkerStats::default()
            },
        }
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// How long an upload already on the wire may finish after cancellation
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn with_logger(mut self, logger: TransferLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Run transfers until cancellation and return this worker's totals.
    ///
    /// Failures are counted and retried after the backoff; cancellation ends
    /// the loop without being reported as an error.
    pub async fn run(mut self) -> WorkerStats {
        let direction = self.plan.direction();

        while !self.cancel.is_cancelled() {
            match self.transfer_once().await {
                Ok(_) => self.stats.transfers += 1,
                Err(TransferError::Cancelled) => break,
                Err(TransferError::Failed(error)) => {
                    self.stats.failures += 1;
                    if let Some(logger) = &self.logger {
                        logger.log_transfer_failure(direction, self.id, self.stats.failures, &error);
                    }

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.retry_backoff) => {}
                    }
                }
            }
        }

        if let Some(logger) = &self.logger {
            logger.log_worker_stopped(direction, self.id, self.stats.bytes, self.stats.failures);
        }
        self.stats
    }

    async fn transfer_once(&mut self) -> Result<u64, TransferError> {
        match self.plan.clone() {
            TransferPlan::Download { request_bytes } => self.download_once(request_bytes).await,
            TransferPlan::Upload { payload } => self.upload_once(payload).await,
        }
    }

    fn credit(&mut self, bytes: u64) {
        self.counter.add(bytes);
        self.stats.bytes += bytes;
        self.stats.last_credit = Some(Instant::now());
    }

    /// Consume one download body, crediting every chunk as it arrives
    async fn download_once(&mut self, request_bytes: u64) -> Result<u64, TransferError> {
        let mut stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
            opened = self.transport.open_download(request_bytes) => opened?,
        };

        let mut received = 0u64;
        loop {
            // Returning drops the stream, which aborts the response body
            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                chunk = stream.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    let len = bytes.len() as u64;
                    self.credit(len);
                    received += len;
                }
                Some(Err(error)) => return Err(error.into()),
                None => break,
            }
        }

        if received == 0 {
            return Err(AppError::transfer("download ended without any data").into());
        }
        Ok(received)
    }

    /// Send one payload; a send caught by cancellation may still drain
    async fn upload_once(&mut self, payload: Bytes) -> Result<u64, TransferError> {
        let transport = self.transport.clone();
        let mut send = transport.upload(payload);

        let receipt = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                if let Ok(Ok(receipt)) = tokio::time::timeout(self.drain_timeout, &mut send).await {
                    self.credit(receipt.credited());
                }
                return Err(TransferError::Cancelled);
            }
            sent = &mut send => sent?,
        };

        let credited = receipt.credited();
        self.credit(credited);
        Ok(credited)
    }
}
