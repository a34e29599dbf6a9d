//! HTTP execution abstraction.
//!
//! [`Transport`] creates [`TransportCall`]s; a transport call performs one
//! request, synchronously or asynchronously, and can be canceled. The
//! production implementation runs reqwest on a tokio runtime. Tests use the
//! mock in [`mock`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use http::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::interceptor::Interceptor;
use crate::types::{HttpRequest, HttpResponse};

/// Receives the single outcome of a transport call.
pub type Completion = Box<dyn FnOnce(Result<HttpResponse>) + Send + 'static>;

pub trait Transport: Send + Sync {
    fn new_call(&self, request: HttpRequest) -> Result<Arc<dyn TransportCall>>;
}

pub trait TransportCall: Send + Sync {
    /// The request as handed to the transport, before interceptors ran.
    fn request(&self) -> &HttpRequest;

    /// Perform the request, blocking until it completes.
    ///
    /// Non-2xx responses are returned, not treated as errors.
    fn execute(&self) -> Result<HttpResponse>;

    /// Perform the request in the background and hand the outcome to `completion`.
    fn enqueue(&self, completion: Completion);

    fn cancel(&self);

    fn is_canceled(&self) -> bool;
}

/// Production transport using reqwest.
pub struct ReqwestTransport {
    client: Client,
    handle: Handle,
    runtime: Option<Runtime>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ReqwestTransport {
    /// Create a transport with its own runtime.
    pub fn new(client: Client) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("easy-http-transport")
            .enable_all()
            .build()
            .map_err(|e| Error::invalid_state(format!("failed to create tokio runtime: {e}")))?;

        Ok(Self {
            client,
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            interceptors: Vec::new(),
        })
    }

    /// Create a transport that spawns onto an existing runtime. The caller
    /// owns that runtime; calls still pending when it shuts down complete
    /// with [`Error::Canceled`].
    pub fn with_handle(client: Client, handle: Handle) -> Self {
        Self {
            client,
            handle,
            runtime: None,
            interceptors: Vec::new(),
        }
    }

    /// Build a reqwest client with the given timeouts. A zero timeout means
    /// no timeout. The overall deadline covers connecting, writing and
    /// reading, and is only set when all three are bounded.
    pub fn client_with_timeouts(
        connect_timeout: Duration,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Client> {
        let mut builder = Client::builder();
        if !connect_timeout.is_zero() {
            builder = builder.connect_timeout(connect_timeout);
        }
        if !read_timeout.is_zero() {
            builder = builder.read_timeout(read_timeout);
        }
        if let Some(total) = total_timeout(connect_timeout, read_timeout, write_timeout) {
            builder = builder.timeout(total);
        }
        Ok(builder.build()?)
    }

    /// Append an interceptor. Interceptors run in the order they were added.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }
}

/// `None` when any timeout is zero or the sum does not fit in a `Duration`.
fn total_timeout(connect: Duration, read: Duration, write: Duration) -> Option<Duration> {
    if [connect, read, write].iter().any(Duration::is_zero) {
        return None;
    }
    connect.checked_add(write)?.checked_add(read)
}

impl Drop for ReqwestTransport {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Transport for ReqwestTransport {
    fn new_call(&self, request: HttpRequest) -> Result<Arc<dyn TransportCall>> {
        Ok(Arc::new(ReqwestCall {
            request,
            client: self.client.clone(),
            handle: self.handle.clone(),
            interceptors: self.interceptors.clone(),
            executed: AtomicBool::new(false),
            cancel: Arc::new(CancelSignal::default()),
        }))
    }
}

#[derive(Default)]
struct CancelSignal {
    canceled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so a task that has not started waiting yet still sees it.
        self.notify.notify_one();
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

/// Delivers `Canceled` if dropped without completing, e.g. when the runtime
/// shuts down with the task still pending.
struct CompletionGuard(Option<Completion>);

impl CompletionGuard {
    fn complete(mut self, result: Result<HttpResponse>) {
        if let Some(completion) = self.0.take() {
            completion(result);
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(completion) = self.0.take() {
            tracing::warn!("transport task dropped before completion");
            completion(Err(Error::Canceled));
        }
    }
}

pub struct ReqwestCall {
    request: HttpRequest,
    client: Client,
    handle: Handle,
    interceptors: Vec<Arc<dyn Interceptor>>,
    executed: AtomicBool,
    cancel: Arc<CancelSignal>,
}

impl TransportCall for ReqwestCall {
    fn request(&self) -> &HttpRequest {
        &self.request
    }

    fn execute(&self) -> Result<HttpResponse> {
        let (tx, rx) = mpsc::channel();
        self.enqueue(Box::new(move |result| {
            let _ = tx.send(result);
        }));
        rx.recv().unwrap_or_else(|_| {
            Err(Error::Transport {
                message: "transport stopped before the request completed".to_string(),
            })
        })
    }

    fn enqueue(&self, completion: Completion) {
        let guard = CompletionGuard(Some(completion));
        if self.executed.swap(true, Ordering::SeqCst) {
            guard.complete(Err(Error::already_executed()));
            return;
        }

        let request = self.request.clone();
        let client = self.client.clone();
        let interceptors = self.interceptors.clone();
        let cancel = Arc::clone(&self.cancel);

        self.handle.spawn(async move {
            let result = if cancel.is_canceled() {
                Err(Error::Canceled)
            } else {
                tokio::select! {
                    result = send(client, interceptors, request) => result,
                    _ = cancel.notify.notified() => Err(Error::Canceled),
                }
            };
            guard.complete(result);
        });
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }

    fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }
}

async fn send(
    client: Client,
    interceptors: Vec<Arc<dyn Interceptor>>,
    mut request: HttpRequest,
) -> Result<HttpResponse> {
    for interceptor in &interceptors {
        request = interceptor.intercept(request)?;
    }

    let method: http::Method = request.method.into();
    tracing::debug!(%method, url = %request.url, "sending request");

    let mut headers = request.headers;
    let mut builder = client.request(method, request.url);
    if let Some(body) = request.body {
        headers.insert(CONTENT_TYPE, HeaderValue::try_from(body.content_type)?);
        builder = builder.body(body.data);
    }

    let response = builder.headers(headers).send().await?;

    let status = response.status().as_u16();
    let status_text = response
        .status()
        .canonical_reason()
        .unwrap_or("Unknown")
        .to_string();

    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect();

    let body = response.text().await?;

    Ok(HttpResponse {
        status,
        status_text,
        headers,
        body,
    })
}
