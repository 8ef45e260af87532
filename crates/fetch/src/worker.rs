use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::{decode, AssetSource, FetchRequest, FetchResponse, WorkerError};

/// Submission side of the worker. Cheap to clone.
#[derive(Clone)]
pub struct FetchHandle {
    tx_submit: Sender<FetchRequest>,
}

impl FetchHandle {
    pub fn submit(&self, request: FetchRequest) -> Result<(), WorkerError> {
        self.tx_submit.send(request).map_err(|_| WorkerError::Stopped)
    }
}

/// Pool of threads fetching and decoding frames. Replies arrive in completion
/// order, not submission order.
pub struct FetchWorker {
    handle: FetchHandle,
    rx_replies: Receiver<FetchResponse>,
    tx_stop: Option<Sender<()>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl FetchWorker {
    pub fn start(num_workers: usize, source: Arc<dyn AssetSource>) -> Self {
        let (tx_submit, rx_submit) = unbounded::<FetchRequest>();
        let (tx_replies, rx_replies) = unbounded::<FetchResponse>();
        let (tx_stop, rx_stop) = unbounded::<()>();

        let workers = (0..num_workers.max(1))
            .map(|_| {
                let rx_submit = rx_submit.clone();
                let rx_stop = rx_stop.clone();
                let tx_replies = tx_replies.clone();
                let source = source.clone();
                thread::spawn(move || loop {
                    crossbeam_channel::select! {
                        recv(rx_submit) -> msg => {
                            let Ok(request) = msg else { break };
                            let reply = process(source.as_ref(), request);
                            if tx_replies.send(reply).is_err() { break; }
                        }
                        recv(rx_stop) -> _ => break,
                    }
                })
            })
            .collect();

        tracing::info!(workers = num_workers.max(1), "fetch worker started");
        Self { handle: FetchHandle { tx_submit }, rx_replies, tx_stop: Some(tx_stop), workers }
    }

    pub fn handle(&self) -> FetchHandle { self.handle.clone() }

    /// Non-blocking; `None` when no reply is ready.
    pub fn try_recv(&self) -> Option<FetchResponse> {
        match self.rx_replies.try_recv() {
            Ok(reply) => Some(reply),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn drain(&self) -> Vec<FetchResponse> { self.rx_replies.try_iter().collect() }

    /// Blocking receive, for hosts and tests that wait on a specific reply.
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<FetchResponse> {
        self.rx_replies.recv_timeout(timeout).ok()
    }

    /// Stops the threads after their current request and waits for them.
    pub fn shutdown(self) { drop(self); }
}

impl Drop for FetchWorker {
    fn drop(&mut self) {
        // Dropping the stop sender disconnects `rx_stop` in every thread.
        self.tx_stop.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        tracing::debug!("fetch worker stopped");
    }
}

fn process(source: &dyn AssetSource, request: FetchRequest) -> FetchResponse {
    let FetchRequest { id, path, .. } = request;
    match source.fetch(&path) {
        Ok(bytes) => match decode(&bytes) {
            Ok(bitmap) => FetchResponse::Decoded { id, path, bitmap },
            Err(err) => {
                tracing::debug!(%path, error = %err, "decode failed, replying without bitmap");
                FetchResponse::Fetched { id, path }
            }
        },
        Err(err) => {
            tracing::debug!(%path, error = %err, "fetch failed");
            FetchResponse::Failed { id, path, error: err.to_string() }
        }
    }
}
