//! The call abstraction and its direct implementation.
//!
//! A call runs at most once. `cancel()` may come before or after it starts:
//! before, the transport call is canceled as soon as it exists; after, the
//! live transport call is asked to stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::assembler::RequestDescriptor;
use crate::callback::Callback;
use crate::error::{Error, Result};
use crate::transport::{Transport, TransportCall};
use crate::types::{HttpRequest, HttpResponse};

pub trait Call: Send + Sync {
    /// Send the request and block until the response arrives.
    ///
    /// Non-2xx responses are returned as responses. Only transport failures,
    /// cancellation and request creation failures are errors.
    fn execute(&self) -> Result<HttpResponse>;

    /// Send the request in the background. `callback` receives exactly one
    /// result. Fails immediately only if this call already ran.
    ///
    /// For a [`RealCall`] the callback runs on the transport's thread, or on
    /// the calling thread when the request could not be created.
    fn enqueue(&self, callback: Callback) -> Result<()>;

    /// True once `execute` or `enqueue` has been called.
    fn is_executed(&self) -> bool;

    /// Cancel this call. An in-flight request is asked to stop; a call that
    /// has not started yet never will.
    fn cancel(&self);

    fn is_canceled(&self) -> bool;

    /// A new, identical call that has not been executed or canceled.
    fn clone_call(&self) -> Box<dyn Call>;

    /// The transport request, once this call has created one.
    fn request(&self) -> Option<HttpRequest>;
}

#[derive(Default)]
struct CallState {
    executed: bool,
    raw: Option<Arc<dyn TransportCall>>,
    creation_failure: Option<Error>,
}

/// Runs a cached [`RequestDescriptor`] through a [`Transport`].
pub struct RealCall {
    descriptor: Arc<RequestDescriptor>,
    transport: Arc<dyn Transport>,
    state: Mutex<CallState>,
    canceled: AtomicBool,
}

impl RealCall {
    pub fn new(descriptor: Arc<RequestDescriptor>, transport: Arc<dyn Transport>) -> Self {
        Self {
            descriptor,
            transport,
            state: Mutex::new(CallState::default()),
            canceled: AtomicBool::new(false),
        }
    }

    pub fn descriptor(&self) -> &Arc<RequestDescriptor> {
        &self.descriptor
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CallState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark this call executed and return its transport call, creating it on
    /// first use. Fails only if the call already ran; a creation failure is
    /// remembered and handed back as `Start::Failed`.
    fn start(&self) -> Result<Start> {
        let mut state = self.lock();
        if state.executed {
            return Err(Error::already_executed());
        }
        state.executed = true;

        if let Some(failure) = &state.creation_failure {
            return Ok(Start::Failed(failure.clone()));
        }
        if let Some(raw) = &state.raw {
            return Ok(Start::Ready(Arc::clone(raw)));
        }

        let created = self
            .descriptor
            .to_request()
            .and_then(|request| self.transport.new_call(request));
        Ok(match created {
            Ok(raw) => {
                state.raw = Some(Arc::clone(&raw));
                Start::Ready(raw)
            }
            Err(e) => {
                state.creation_failure = Some(e.clone());
                Start::Failed(e)
            }
        })
    }
}

enum Start {
    Ready(Arc<dyn TransportCall>),
    Failed(Error),
}

impl Call for RealCall {
    fn execute(&self) -> Result<HttpResponse> {
        let raw = match self.start()? {
            Start::Ready(raw) => raw,
            Start::Failed(failure) => return Err(failure),
        };
        if self.canceled.load(Ordering::SeqCst) {
            raw.cancel();
        }
        raw.execute()
    }

    fn enqueue(&self, callback: Callback) -> Result<()> {
        let raw = match self.start()? {
            Start::Ready(raw) => raw,
            Start::Failed(failure) => {
                tracing::debug!(error = %failure, "request creation failed");
                callback(Err(failure));
                return Ok(());
            }
        };

        if self.canceled.load(Ordering::SeqCst) {
            raw.cancel();
        }

        tracing::debug!(url = %self.descriptor.url(), "enqueueing request");
        raw.enqueue(callback);
        Ok(())
    }

    fn is_executed(&self) -> bool {
        self.lock().executed
    }

    fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        let raw = self.lock().raw.clone();
        if let Some(raw) = raw {
            raw.cancel();
        }
    }

    fn is_canceled(&self) -> bool {
        if self.canceled.load(Ordering::SeqCst) {
            return true;
        }
        self.lock().raw.as_ref().is_some_and(|raw| raw.is_canceled())
    }

    fn clone_call(&self) -> Box<dyn Call> {
        Box::new(RealCall::new(
            Arc::clone(&self.descriptor),
            Arc::clone(&self.transport),
        ))
    }

    fn request(&self) -> Option<HttpRequest> {
        self.lock().raw.as_ref().map(|raw| raw.request().clone())
    }
}
