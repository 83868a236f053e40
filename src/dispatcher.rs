//! Cross-thread call dispatcher.
//!
//! Runs operations on the owner thread and hands their results back to the
//! thread that asked for them.
//!
//! ```text
//! caller thread                     owner thread
//! ─────────────                     ────────────
//! invoke(op) ──► PendingCall ──► queue ──► dispatch_pending() / run()
//!     │                                          │
//!     └──── blocks on completion ◄── result ◄────┘
//! ```
//!
//! Calls made on the owner thread itself never enter the queue: they run
//! inline, which is what keeps reentrant calls from waiting on themselves.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use crossbeam_channel::{self as channel, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::backend::InvokeWaker;
use crate::error::{BindingError, Result};

// =============================================================================
// Pending Calls
// =============================================================================

type Job = Box<dyn FnOnce() + Send + 'static>;

/// One marshaled operation. Dropping it without running it releases the
/// waiting caller with `DispatcherUnavailable`.
struct PendingCall {
    seq: u64,
    job: Job,
}

struct Queue {
    sender: Sender<PendingCall>,
    next_seq: u64,
}

struct Inner {
    owner: ThreadId,
    /// `None` once shut down. Held while sending so shutdown cannot miss a call.
    queue: Mutex<Option<Queue>>,
    receiver: Receiver<PendingCall>,
    waker: Mutex<Option<InvokeWaker>>,
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Handle to the owner thread's call queue. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Create a dispatcher owned by the calling thread.
    pub fn for_current_thread() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            inner: Arc::new(Inner {
                owner: thread::current().id(),
                queue: Mutex::new(Some(Queue { sender, next_seq: 1 })),
                receiver,
                waker: Mutex::new(None),
            }),
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.inner.owner
    }

    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.inner.owner
    }

    /// True when the calling thread must marshal to reach the backend.
    pub fn invoke_required(&self) -> bool {
        !self.is_owner_thread()
    }

    pub fn is_running(&self) -> bool {
        self.inner.queue.lock().is_some()
    }

    /// Number of calls waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.inner.receiver.len()
    }

    pub(crate) fn downgrade(&self) -> WeakDispatcher {
        WeakDispatcher(Arc::downgrade(&self.inner))
    }

    /// Install the hook that nudges the owner's native loop after each enqueue.
    pub fn set_waker(&self, waker: Option<InvokeWaker>) {
        *self.inner.waker.lock() = waker;
    }

    /// Run `op` on the owner thread and wait for it.
    ///
    /// On the owner thread `op` runs immediately. Elsewhere it is queued
    /// behind earlier calls and the caller blocks until it has run. A panic
    /// inside `op` is resumed on the calling thread with its original payload.
    /// Once shut down, every thread gets `DispatcherUnavailable`.
    pub fn invoke<F, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_owner_thread() {
            if !self.is_running() {
                return Err(BindingError::DispatcherUnavailable);
            }
            return Ok(op());
        }
        self.begin_invoke(op)?.wait()
    }

    /// Queue `op` for the owner thread without waiting.
    ///
    /// Always queues, even on the owner thread, so results keep FIFO order
    /// with other queued calls.
    pub fn begin_invoke<F, T>(&self, op: F) -> Result<PendingResult<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = channel::bounded(1);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(op));
            // Nobody to tell if the caller dropped its PendingResult.
            let _ = done_tx.send(outcome);
        });

        let seq = self.enqueue(job)?;
        Ok(PendingResult {
            seq,
            completion: done_rx,
            dispatcher: self.clone(),
        })
    }

    fn enqueue(&self, job: Job) -> Result<u64> {
        let seq = {
            let mut guard = self.inner.queue.lock();
            let queue = guard.as_mut().ok_or(BindingError::DispatcherUnavailable)?;
            let seq = queue.next_seq;
            queue
                .sender
                .send(PendingCall { seq, job })
                .map_err(|_| BindingError::DispatcherUnavailable)?;
            queue.next_seq += 1;
            seq
        };
        log::trace!("Queued call #{} from {:?}", seq, thread::current().id());

        let waker = self.inner.waker.lock().clone();
        if let Some(wake) = waker {
            wake();
        }
        Ok(seq)
    }

    /// Run every queued call in FIFO order. Owner thread only.
    pub fn dispatch_pending(&self) -> Result<usize> {
        if !self.is_owner_thread() {
            return Err(BindingError::NotOwnerThread);
        }

        let mut executed = 0;
        while let Ok(call) = self.inner.receiver.try_recv() {
            self.execute(call);
            executed += 1;
        }
        Ok(executed)
    }

    /// Block the owner thread servicing calls until [`shutdown`](Self::shutdown).
    ///
    /// For owner threads that do not run a native event loop of their own.
    pub fn run(&self) -> Result<usize> {
        if !self.is_owner_thread() {
            return Err(BindingError::NotOwnerThread);
        }

        let mut executed = 0;
        // recv() fails once shutdown has dropped the only sender.
        while let Ok(call) = self.inner.receiver.recv() {
            self.execute(call);
            executed += 1;
        }
        log::debug!("Dispatcher loop on {:?} finished after {} calls", self.inner.owner, executed);
        Ok(executed)
    }

    fn execute(&self, call: PendingCall) {
        log::trace!("Dispatching call #{}", call.seq);
        (call.job)();
    }

    /// Stop accepting calls and release everyone still waiting.
    ///
    /// Calls already queued are dropped unexecuted, so their callers see
    /// `DispatcherUnavailable`. Later calls fail the same way without
    /// blocking. Safe to call from any thread, more than once.
    pub fn shutdown(&self) {
        let Some(queue) = self.inner.queue.lock().take() else {
            return;
        };
        drop(queue);
        *self.inner.waker.lock() = None;

        let mut abandoned = 0;
        while let Ok(call) = self.inner.receiver.try_recv() {
            drop(call);
            abandoned += 1;
        }
        log::debug!("Dispatcher shut down, {} queued calls abandoned", abandoned);
    }
}

/// Non-owning dispatcher reference for sinks the backend retains.
#[derive(Clone)]
pub(crate) struct WeakDispatcher(Weak<Inner>);

impl WeakDispatcher {
    pub(crate) fn upgrade(&self) -> Option<Dispatcher> {
        self.0.upgrade().map(|inner| Dispatcher { inner })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("owner", &self.inner.owner)
            .field("running", &self.is_running())
            .field("pending", &self.pending())
            .finish()
    }
}

// =============================================================================
// Pending Results
// =============================================================================

/// Completion slot for a call queued with [`Dispatcher::begin_invoke`].
pub struct PendingResult<T> {
    seq: u64,
    completion: Receiver<thread::Result<T>>,
    dispatcher: Dispatcher,
}

impl<T> PendingResult<T> {
    /// Position of the call in the dispatcher's arrival order.
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    pub fn is_completed(&self) -> bool {
        !self.completion.is_empty()
    }

    /// Wait for the call and take its result.
    ///
    /// On the owner thread this drains the queue itself instead of blocking.
    pub fn wait(self) -> Result<T> {
        if self.dispatcher.is_owner_thread() {
            return self.wait_on_owner();
        }
        match self.completion.recv() {
            Ok(outcome) => resume(outcome),
            Err(_) => Err(BindingError::DispatcherUnavailable),
        }
    }

    fn wait_on_owner(self) -> Result<T> {
        loop {
            match self.completion.try_recv() {
                Ok(outcome) => return resume(outcome),
                Err(TryRecvError::Disconnected) => return Err(BindingError::DispatcherUnavailable),
                Err(TryRecvError::Empty) => {}
            }
            match self.dispatcher.inner.receiver.try_recv() {
                Ok(call) => self.dispatcher.execute(call),
                // Not queued and not finished: it was abandoned by a shutdown
                // in progress on another thread.
                Err(_) => return Err(BindingError::DispatcherUnavailable),
            }
        }
    }
}

impl<T> std::fmt::Debug for PendingResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResult")
            .field("seq", &self.seq)
            .field("completed", &self.is_completed())
            .finish()
    }
}

fn resume<T>(outcome: thread::Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => Ok(value),
        Err(payload) => panic::resume_unwind(payload),
    }
}
