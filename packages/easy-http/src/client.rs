//! The client facade: configuration, descriptor cache and call creation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::assembler::RequestAssembler;
use crate::cache::{DescriptorCache, Signature};
use crate::call::RealCall;
use crate::callback::{CallbackExecutor, SerialExecutor};
use crate::error::{Error, Result};
use crate::executor_call::ExecutorCallbackCall;
use crate::interceptor::{DomainRouter, Interceptor};
use crate::options::RequestOptions;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::QueryEncoding;

/// Name of the default callback thread.
pub const CALLBACK_THREAD_NAME: &str = "easy-http-callback";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Serializable client settings. Timeouts are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub base_urls: HashMap<String, String>,

    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default)]
    pub query_encoding: QueryEncoding,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

/// Entry point: builds cached request descriptors and calls over them.
///
/// ```ignore
/// use easy_http::{Call, EasyHttp, RequestOptions};
///
/// let http = EasyHttp::builder().base_url("https://api.example.com/v1/").build()?;
/// let options = RequestOptions::builder().path("users").param("id", 7).build()?;
///
/// http.create_call("get-user", &options)?.enqueue(Box::new(|result| match result {
///     Ok(response) => println!("{}", response.text()),
///     Err(e) => eprintln!("{e}"),
/// }))?;
/// ```
pub struct EasyHttp {
    assembler: RequestAssembler,
    cache: DescriptorCache,
    transport: Arc<dyn Transport>,
    callback_executor: Arc<dyn CallbackExecutor>,
}

impl fmt::Debug for EasyHttp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EasyHttp")
            .field("base_url", &self.base_url().as_str())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl EasyHttp {
    pub fn builder() -> EasyHttpBuilder {
        EasyHttpBuilder::new()
    }

    pub fn base_url(&self) -> &Url {
        self.assembler.base_url()
    }

    pub fn cache(&self) -> &DescriptorCache {
        &self.cache
    }

    pub fn callback_executor(&self) -> &Arc<dyn CallbackExecutor> {
        &self.callback_executor
    }

    /// A call whose asynchronous results are redelivered on the callback
    /// executor, with non-2xx responses reported as failures.
    ///
    /// `signature` must uniquely identify the shape of `options`: the first
    /// options seen for a signature are cached and reused.
    pub fn create_call(
        &self,
        signature: impl Into<Signature>,
        options: &RequestOptions,
    ) -> Result<ExecutorCallbackCall> {
        let call = self.create_raw_call(signature, options)?;
        Ok(ExecutorCallbackCall::new(
            Arc::clone(&self.callback_executor),
            Arc::new(call),
        ))
    }

    /// A plain call, for synchronous `execute()` or transport-thread callbacks.
    pub fn create_raw_call(
        &self,
        signature: impl Into<Signature>,
        options: &RequestOptions,
    ) -> Result<RealCall> {
        let signature = signature.into();
        let descriptor = self.cache.get_or_build(&signature, options, &self.assembler)?;
        Ok(RealCall::new(descriptor, Arc::clone(&self.transport)))
    }
}

pub struct EasyHttpBuilder {
    base_url: Option<String>,
    base_urls: Option<HashMap<String, String>>,
    read_timeout: Duration,
    connect_timeout: Duration,
    write_timeout: Duration,
    query_encoding: QueryEncoding,
    callback_executor: Option<Arc<dyn CallbackExecutor>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    http_client: Option<reqwest::Client>,
    transport: Option<Arc<dyn Transport>>,
    error: Option<Error>,
}

impl Default for EasyHttpBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            base_urls: None,
            read_timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            query_encoding: QueryEncoding::default(),
            callback_executor: None,
            interceptors: Vec::new(),
            http_client: None,
            transport: None,
            error: None,
        }
    }
}

impl EasyHttpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ClientConfig) -> Self {
        let mut builder = Self::new()
            .base_url(config.base_url)
            .read_timeout(Duration::from_millis(config.read_timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .write_timeout(Duration::from_millis(config.write_timeout_ms))
            .query_encoding(config.query_encoding);
        if !config.base_urls.is_empty() {
            builder = builder.base_urls(config.base_urls);
        }
        builder
    }

    /// Base URL for path targets. Must end in `/`.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Named base URLs selected per request with the `Domain-Name` header.
    pub fn base_urls<K, V>(mut self, base_urls: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let base_urls: HashMap<String, String> = base_urls
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if base_urls.is_empty() {
            self.fail(Error::validation("base_urls is empty"));
        } else {
            self.base_urls = Some(base_urls);
        }
        self
    }

    /// Zero means no timeout. Applies to each of the three timeouts.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn query_encoding(mut self, query_encoding: QueryEncoding) -> Self {
        self.query_encoding = query_encoding;
        self
    }

    /// Where enqueued results are delivered. Defaults to a dedicated
    /// [`SerialExecutor`] thread named [`CALLBACK_THREAD_NAME`].
    pub fn callback_executor(mut self, executor: Arc<dyn CallbackExecutor>) -> Self {
        self.callback_executor = Some(executor);
        self
    }

    /// Extra interceptor, run after `Domain-Name` routing.
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Use a preconfigured reqwest client. The timeout settings are then ignored.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Use a custom transport. Timeouts, interceptors and `base_urls`
    /// routing are the transport's responsibility.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<EasyHttp> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let base_url = self
            .base_url
            .ok_or_else(|| Error::invalid_state("Base URL required."))?;
        let base_url = Url::parse(&base_url)
            .map_err(|e| Error::validation(format!("Illegal URL '{base_url}': {e}")))?;
        if !base_url.path().ends_with('/') {
            return Err(Error::validation(format!(
                "base URL must end in /: {base_url}"
            )));
        }

        let router = match &self.base_urls {
            Some(base_urls) => DomainRouter::parse(base_urls)?,
            None => DomainRouter::default(),
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let client = match self.http_client {
                    Some(client) => client,
                    None => ReqwestTransport::client_with_timeouts(
                        self.connect_timeout,
                        self.read_timeout,
                        self.write_timeout,
                    )?,
                };
                let transport = self
                    .interceptors
                    .into_iter()
                    .fold(
                        ReqwestTransport::new(client)?.with_interceptor(Arc::new(router)),
                        ReqwestTransport::with_interceptor,
                    );
                Arc::new(transport) as Arc<dyn Transport>
            }
        };

        let callback_executor = match self.callback_executor {
            Some(executor) => executor,
            None => Arc::new(SerialExecutor::new(CALLBACK_THREAD_NAME)?),
        };

        tracing::debug!(%base_url, "easy-http client ready");

        Ok(EasyHttp {
            assembler: RequestAssembler::new(base_url).with_query_encoding(self.query_encoding),
            cache: DescriptorCache::new(),
            transport,
            callback_executor,
        })
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}
