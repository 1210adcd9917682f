//! Scripted in-process transport for engine tests

use super::{ByteStream, SpeedTransport, UploadReceipt};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

/// Behaviour of one latency probe
#[derive(Debug, Clone)]
pub(crate) enum PingScript {
    /// Answer after the given delay
    Respond(Duration),
    /// Fail immediately, as a non-2xx status would
    Fail,
    /// Never answer
    Hang,
}

/// What happens once a download stream has delivered its chunks
#[derive(Debug, Clone, Copy)]
pub(crate) enum StreamEnd {
    Hang,
    Close,
}

/// Behaviour of every download transfer
#[derive(Debug, Clone)]
pub(crate) enum DownloadScript {
    /// Yield `count` chunks (unbounded when `None`), the first at once and
    /// the rest `interval` apart
    Stream {
        chunk_size: usize,
        count: Option<usize>,
        interval: Duration,
        end: StreamEnd,
    },
    /// Opening the transfer fails
    Fail,
}

/// Behaviour of every upload send
#[derive(Debug, Clone)]
pub(crate) struct UploadScript {
    pub delay: Duration,
    pub echo: Option<u64>,
    pub fail: bool,
}

pub(crate) struct MockTransport {
    ping_queue: Mutex<VecDeque<PingScript>>,
    ping_default: PingScript,
    download: DownloadScript,
    upload: UploadScript,
    pub ping_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            ping_queue: Mutex::new(VecDeque::new()),
            ping_default: PingScript::Respond(Duration::from_millis(10)),
            download: DownloadScript::Stream {
                chunk_size: 64 * 1024,
                count: None,
                interval: Duration::from_millis(10),
                end: StreamEnd::Hang,
            },
            upload: UploadScript {
                delay: Duration::from_millis(10),
                echo: None,
                fail: false,
            },
            ping_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
        }
    }

    /// Every probe answers after `delay`
    pub fn with_ping_delay(mut self, delay: Duration) -> Self {
        self.ping_default = PingScript::Respond(delay);
        self
    }

    /// Probes not covered by a sequence behave like this
    pub fn with_ping_default(mut self, script: PingScript) -> Self {
        self.ping_default = script;
        self
    }

    /// Probes follow `scripts` in order, then fall back to the default
    pub fn with_ping_sequence(self, scripts: Vec<PingScript>) -> Self {
        *self.ping_queue.lock().unwrap() = scripts.into();
        self
    }

    pub fn with_download(mut self, script: DownloadScript) -> Self {
        self.download = script;
        self
    }

    pub fn with_upload(mut self, script: UploadScript) -> Self {
        self.upload = script;
        self
    }

    fn chunk_stream(chunk_size: usize, count: Option<usize>, interval: Duration, end: StreamEnd) -> ByteStream {
        let chunk = Bytes::from(vec![0u8; chunk_size]);
        let body = stream::unfold(0usize, move |sent| {
            let chunk = chunk.clone();
            async move {
                if count.is_some_and(|limit| sent >= limit) {
                    return None;
                }
                if sent > 0 {
                    tokio::time::sleep(interval).await;
                }
                Some((Ok(chunk), sent + 1))
            }
        });

        match end {
            StreamEnd::Hang => body.chain(stream::pending()).boxed(),
            StreamEnd::Close => body.boxed(),
        }
    }
}

#[async_trait]
impl SpeedTransport for MockTransport {
    async fn ping(&self) -> Result<()> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .ping_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.ping_default.clone());

        match script {
            PingScript::Respond(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            PingScript::Fail => Err(AppError::http_request("Ping returned HTTP 503")),
            PingScript::Hang => futures::future::pending().await,
        }
    }

    async fn open_download(&self, _bytes: u64) -> Result<ByteStream> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        match &self.download {
            DownloadScript::Stream { chunk_size, count, interval, end } => {
                Ok(Self::chunk_stream(*chunk_size, *count, *interval, *end))
            }
            DownloadScript::Fail => Err(AppError::network("connection refused")),
        }
    }

    async fn upload(&self, payload: Bytes) -> Result<UploadReceipt> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.upload.delay).await;
        if self.upload.fail {
            return Err(AppError::http_request("Upload returned HTTP 500"));
        }
        Ok(UploadReceipt::new(payload.len() as u64, self.upload.echo))
    }
}
