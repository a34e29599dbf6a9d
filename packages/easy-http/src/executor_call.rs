//! Redelivers a call's asynchronous result on a [`CallbackExecutor`].
//!
//! On top of moving the callback to the executor, the adapter turns a
//! completed non-2xx response into [`Error::ResponseFailed`], and a response
//! that arrives after the call was canceled into [`Error::Canceled`].

use std::sync::Arc;

use crate::call::Call;
use crate::callback::{deliver, Callback, CallbackExecutor};
use crate::error::{Error, Result};
use crate::types::{HttpRequest, HttpResponse};

pub struct ExecutorCallbackCall {
    executor: Arc<dyn CallbackExecutor>,
    delegate: Arc<dyn Call>,
}

impl ExecutorCallbackCall {
    pub fn new(executor: Arc<dyn CallbackExecutor>, delegate: Arc<dyn Call>) -> Self {
        Self { executor, delegate }
    }

    /// The wrapped call. Use it directly for synchronous execution.
    pub fn delegate(&self) -> &Arc<dyn Call> {
        &self.delegate
    }
}

impl Call for ExecutorCallbackCall {
    /// Always fails: synchronous execution bypasses redelivery. Call
    /// [`delegate`](ExecutorCallbackCall::delegate) instead.
    fn execute(&self) -> Result<HttpResponse> {
        Err(Error::Unsupported {
            operation: "execute on a callback-redelivering call".to_string(),
        })
    }

    fn enqueue(&self, callback: Callback) -> Result<()> {
        let executor = Arc::clone(&self.executor);
        let delegate = Arc::clone(&self.delegate);

        self.delegate.enqueue(Box::new(move |result| {
            executor.execute(Box::new(move || {
                let result = match result {
                    Ok(_) if delegate.is_canceled() => {
                        tracing::warn!("response arrived after cancel, reporting canceled");
                        Err(Error::Canceled)
                    }
                    Ok(response) if response.is_success() => Ok(response),
                    Ok(response) => Err(Error::ResponseFailed {
                        response: Box::new(response),
                    }),
                    Err(e) => Err(e),
                };
                deliver(callback, result);
            }));
        }))
    }

    fn is_executed(&self) -> bool {
        self.delegate.is_executed()
    }

    fn cancel(&self) {
        self.delegate.cancel();
    }

    fn is_canceled(&self) -> bool {
        self.delegate.is_canceled()
    }

    fn clone_call(&self) -> Box<dyn Call> {
        Box::new(ExecutorCallbackCall::new(
            Arc::clone(&self.executor),
            Arc::from(self.delegate.clone_call()),
        ))
    }

    fn request(&self) -> Option<HttpRequest> {
        self.delegate.request()
    }
}
