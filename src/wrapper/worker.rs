//! Dedicated thread owning one synchronous set.
//!
//! A [`SyncSet`] holds closures that are not `Send`, so the set is built on
//! its worker thread from a factory and only messages cross the thread
//! boundary. The channel is bounded; [`SyncSetWorker::try_import`] reports
//! backpressure instead of blocking.

use std::fmt;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::error::{ExecutionError, RvError, RvResult};
use crate::event::Aux;
use crate::value::Value;
use crate::wrapper::global::SyncSet;

type SetJob = Box<dyn FnOnce(&mut SyncSet) + Send>;

enum Job {
    Import {
        channel: String,
        identities: Option<Vec<Value>>,
        params: Vec<Value>,
        aux: Aux,
        reply: Option<Sender<RvResult<()>>>,
    },
    Run(SetJob),
}

/// Handle to a synchronous set running on its own thread.
pub struct SyncSetWorker {
    name: String,
    tx: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
    queue_capacity: usize,
}

impl SyncSetWorker {
    /// Starts the worker thread and builds the set on it.
    ///
    /// # Errors
    ///
    /// Returns the factory's error, or an internal error if the thread
    /// cannot be spawned.
    pub fn spawn<F>(config: WorkerConfig, factory: F) -> RvResult<Self>
    where
        F: FnOnce() -> RvResult<SyncSet> + Send + 'static,
    {
        let queue_capacity = config.queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);
        let (ready_tx, ready_rx) = bounded::<RvResult<()>>(1);

        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let set = match factory() {
                    Ok(set) => {
                        let _ = ready_tx.send(Ok(()));
                        set
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                run(set, &rx);
            })
            .map_err(|err| RvError::internal(format!("failed to spawn {}: {err}", config.thread_name)))?;

        let started = ready_rx.recv().map_err(|_| {
            RvError::from(ExecutionError::Disconnected {
                name: config.thread_name.clone(),
            })
        });
        if let Err(err) = started.and_then(|ready| ready) {
            let _ = handle.join();
            return Err(err);
        }

        debug!(worker = %config.thread_name, queue_capacity, "sync set worker started");
        Ok(Self {
            name: config.thread_name,
            tx: Some(tx),
            handle: Some(handle),
            queue_capacity,
        })
    }

    /// Thread name of the worker.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn disconnected(&self) -> RvError {
        ExecutionError::Disconnected {
            name: self.name.clone(),
        }
        .into()
    }

    fn sender(&self) -> RvResult<&Sender<Job>> {
        self.tx.as_ref().ok_or_else(|| self.disconnected())
    }

    fn try_submit(&self, job: Job) -> RvResult<()> {
        match self.sender()?.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ExecutionError::QueueFull {
                name: self.name.clone(),
                capacity: self.queue_capacity,
            }
            .into()),
            Err(TrySendError::Disconnected(_)) => Err(self.disconnected()),
        }
    }

    /// Imports an event and waits for the set to settle.
    ///
    /// # Errors
    ///
    /// Returns the import's result, or `Disconnected` if the worker is gone.
    pub fn import(&self, channel: &str, identities: Option<Vec<Value>>, params: Vec<Value>, aux: Aux) -> RvResult<()> {
        let (reply, rx) = bounded(1);
        self.sender()?
            .send(Job::Import {
                channel: channel.to_string(),
                identities,
                params,
                aux,
                reply: Some(reply),
            })
            .map_err(|_| self.disconnected())?;
        rx.recv().map_err(|_| self.disconnected())?
    }

    /// Queues an import without waiting. Failures of the import itself are
    /// logged by the worker.
    ///
    /// # Errors
    ///
    /// Returns `QueueFull` when the channel is at capacity and
    /// `Disconnected` if the worker is gone.
    pub fn try_import(&self, channel: &str, identities: Option<Vec<Value>>, params: Vec<Value>, aux: Aux) -> RvResult<()> {
        self.try_submit(Job::Import {
            channel: channel.to_string(),
            identities,
            params,
            aux,
            reply: None,
        })
    }

    /// Queues `f` to run against the set without waiting.
    ///
    /// # Errors
    ///
    /// As [`try_import`](Self::try_import).
    pub fn run(&self, f: impl FnOnce(&mut SyncSet) + Send + 'static) -> RvResult<()> {
        self.try_submit(Job::Run(Box::new(f)))
    }

    /// Runs `f` against the set and returns its result.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` if the worker is gone.
    pub fn with_set<R, F>(&self, f: F) -> RvResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut SyncSet) -> R + Send + 'static,
    {
        let (reply, rx) = bounded(1);
        let job: SetJob = Box::new(move |set| {
            let _ = reply.send(f(set));
        });
        self.sender()?.send(Job::Run(job)).map_err(|_| self.disconnected())?;
        rx.recv().map_err(|_| self.disconnected())
    }

    /// Stops accepting work, drains queued jobs and joins the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!(worker = %self.name, "sync set worker stopped");
        }
    }
}

impl fmt::Debug for SyncSetWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSetWorker")
            .field("name", &self.name)
            .field("queue_capacity", &self.queue_capacity)
            .field("running", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for SyncSetWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(mut set: SyncSet, rx: &Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        match job {
            Job::Import {
                channel,
                identities,
                params,
                aux,
                reply,
            } => {
                let result = set.import(&channel, identities.as_deref(), &params, &aux);
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(err) = result {
                            warn!(set = set.name(), channel = %channel, error = %err, "queued import failed");
                        }
                    }
                }
            }
            Job::Run(f) => f(&mut set),
        }
    }
}
