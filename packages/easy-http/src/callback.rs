//! Callback delivery.
//!
//! A [`Callback`] receives exactly one `Result`. [`CallbackExecutor`] is the
//! "run this on context C" capability used to hand results to the thread the
//! caller wants, typically a UI thread. [`SerialExecutor`] is the default: one
//! dedicated thread draining a queue in order.
//!
//! Executors run tasks as given. Panics from caller callbacks are caught once,
//! by [`deliver`], at the point where a result is handed to the callback.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle, ThreadId};

use crate::error::{Error, Result};
use crate::types::HttpResponse;

/// Receives the outcome of an enqueued call.
pub type Callback = Box<dyn FnOnce(Result<HttpResponse>) + Send + 'static>;

/// A unit of work handed to a [`CallbackExecutor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait CallbackExecutor: Send + Sync {
    fn execute(&self, task: Task);
}

impl<F> CallbackExecutor for F
where
    F: Fn(Task) + Send + Sync,
{
    fn execute(&self, task: Task) {
        self(task)
    }
}

/// Runs every task immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}

/// Runs tasks one at a time, in submission order, on a dedicated thread.
///
/// A task that panics stops the thread; tasks submitted afterwards run on the
/// submitting thread.
pub struct SerialExecutor {
    sender: Mutex<Option<Sender<Task>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl SerialExecutor {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Task>();
        let worker = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                for task in receiver {
                    task();
                }
            })
            .map_err(|e| Error::invalid_state(format!("failed to start callback thread: {e}")))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker_id: worker.thread().id(),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// True when called from this executor's own thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.worker_id
    }
}

impl CallbackExecutor for SerialExecutor {
    fn execute(&self, task: Task) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let rejected = match sender.as_ref() {
            Some(sender) => sender.send(task).err().map(|e| e.0),
            None => Some(task),
        };
        drop(sender);

        // The worker is gone; run here rather than lose the delivery.
        if let Some(task) = rejected {
            tracing::warn!("callback thread unavailable, running task inline");
            task();
        }
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            if !self.is_current() && worker.join().is_err() {
                tracing::error!("callback thread panicked");
            }
        }
    }
}

/// Hand `result` to `callback`, swallowing and logging a panic from caller code.
pub(crate) fn deliver(callback: Callback, result: Result<HttpResponse>) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(move || callback(result))) {
        tracing::error!(panic = panic_message(panic.as_ref()), "callback panicked, ignoring");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn serial_executor_preserves_order_on_one_thread() {
        let executor = SerialExecutor::new("test-callback").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = mpsc::channel();

        for i in 0..10 {
            let seen = Arc::clone(&seen);
            executor.execute(Box::new(move || {
                seen.lock()
                    .unwrap()
                    .push((i, thread::current().name().map(str::to_string)));
            }));
        }
        executor.execute(Box::new(move || done_tx.send(()).unwrap()));
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let seen = seen.lock().unwrap();
        let order: Vec<_> = seen.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
        assert!(seen
            .iter()
            .all(|(_, name)| name.as_deref() == Some("test-callback")));
    }

    #[test]
    fn serial_executor_keeps_running_after_delivered_panic() {
        let executor = SerialExecutor::new("test-callback").unwrap();
        let (tx, rx) = mpsc::channel();

        executor.execute(Box::new(|| {
            deliver(Box::new(|_| panic!("caller bug")), Err(Error::Canceled))
        }));
        executor.execute(Box::new(move || {
            tx.send(thread::current().name().map(str::to_string)).unwrap()
        }));

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("test-callback"));
    }

    #[test]
    fn inline_executor_does_not_catch_panics() {
        let result = catch_unwind(|| InlineExecutor.execute(Box::new(|| panic!("caller bug"))));
        assert!(result.is_err());
    }

    #[test]
    fn deliver_swallows_callback_panics() {
        deliver(Box::new(|_| panic!("boom")), Err(Error::Canceled));
    }

    #[test]
    fn closures_are_executors() {
        let ran = Arc::new(Mutex::new(0));
        let executor = |task: Task| task();
        for _ in 0..3 {
            let ran = Arc::clone(&ran);
            executor.execute(Box::new(move || *ran.lock().unwrap() += 1));
        }
        assert_eq!(*ran.lock().unwrap(), 3);
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
