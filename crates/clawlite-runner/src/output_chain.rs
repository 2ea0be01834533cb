//! In-order delivery of streamed records to a caller callback.
//!
//! Records go through a bounded queue drained by one consumer task, so a
//! callback for record N always completes before the callback for N+1 starts.
//! A full queue pauses the producer (and with it, stdout reading).

use async_trait::async_trait;
use clawlite_core::protocol::WorkerOutput;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Receiver of streamed worker records.
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn on_output(&self, output: WorkerOutput);
}

#[async_trait]
impl OutputSink for mpsc::UnboundedSender<WorkerOutput> {
    async fn on_output(&self, output: WorkerOutput) {
        if self.send(output).is_err() {
            tracing::debug!("Output receiver dropped");
        }
    }
}

pub struct OutputChain {
    tx: mpsc::Sender<WorkerOutput>,
    consumer: JoinHandle<()>,
}

impl OutputChain {
    pub fn spawn(sink: Arc<dyn OutputSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<WorkerOutput>(capacity.max(1));
        let consumer = tokio::spawn(async move {
            while let Some(output) = rx.recv().await {
                sink.on_output(output).await;
            }
        });
        Self { tx, consumer }
    }

    /// Queue a record behind every record pushed before it.
    pub async fn push(&self, output: WorkerOutput) {
        if self.tx.send(output).await.is_err() {
            tracing::warn!("Output callback task stopped; dropping streamed record");
        }
    }

    /// Close the queue and wait until every queued callback has completed.
    pub async fn finish(self) {
        drop(self.tx);
        if let Err(e) = self.consumer.await {
            tracing::warn!(error = %e, "Output callback task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Sleeps longer for earlier records, so unordered dispatch would reorder them.
    struct SlowRecorder {
        seen: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl OutputSink for SlowRecorder {
        async fn on_output(&self, output: WorkerOutput) {
            let n = output.result.and_then(|v| v.as_i64()).unwrap_or(-1);
            tokio::time::sleep(Duration::from_millis((5 - n.min(5)) as u64 * 10)).await;
            self.seen.lock().unwrap().push(n);
        }
    }

    #[tokio::test]
    async fn test_chain_preserves_order_with_varying_latency() {
        let sink = Arc::new(SlowRecorder {
            seen: Mutex::new(Vec::new()),
        });
        let chain = OutputChain::spawn(sink.clone(), 2);
        for n in 0..5 {
            chain.push(WorkerOutput::success(Some(json!(n)), None)).await;
        }
        chain.finish().await;
        assert_eq!(*sink.seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_unbounded_sender_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let chain = OutputChain::spawn(Arc::new(tx), 4);
        chain.push(WorkerOutput::error("first")).await;
        chain.push(WorkerOutput::success(None, Some("s".into()))).await;
        chain.finish().await;

        assert_eq!(rx.recv().await.unwrap().error.as_deref(), Some("first"));
        assert_eq!(rx.recv().await.unwrap().new_session_id.as_deref(), Some("s"));
        assert!(rx.recv().await.is_none());
    }
}
