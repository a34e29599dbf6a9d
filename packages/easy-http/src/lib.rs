//! # easy-http
//!
//! A convenience layer over reqwest for building, caching and dispatching
//! HTTP requests.
//!
//! ## Pieces
//!
//! ### RequestOptions
//!
//! Fluent description of one request: a full URL or a path relative to the
//! client's base URL, GET or POST (JSON or form), parameters and headers.
//!
//! ```ignore
//! use easy_http::{PostEncoding, RequestOptions};
//!
//! let options = RequestOptions::builder()
//!     .path("users")
//!     .post()
//!     .encoding(PostEncoding::Json)
//!     .param("name", "a")
//!     .build()?;
//! ```
//!
//! ### EasyHttp
//!
//! The client. Options are assembled into a [`RequestDescriptor`] once per
//! signature and cached; every call for that signature reuses it.
//!
//! ```ignore
//! use easy_http::{Call, EasyHttp};
//!
//! let http = EasyHttp::builder()
//!     .base_url("https://api.example.com/v1/")
//!     .base_urls([("uploads", "https://files.example.com/")])
//!     .build()?;
//!
//! // Blocking, any status is a response
//! let response = http.create_raw_call("create-user", &options)?.execute()?;
//!
//! // Background, result delivered on the callback thread; non-2xx is an error
//! http.create_call("create-user", &options)?
//!     .enqueue(Box::new(|result| println!("{result:?}")))?;
//! ```
//!
//! ### Domain-Name routing
//!
//! A request carrying a `Domain-Name: <name>` header is sent to the base URL
//! registered under `<name>` instead of its own scheme, host and port.

pub mod assembler;
pub mod cache;
pub mod call;
pub mod callback;
pub mod client;
pub mod error;
pub mod executor_call;
pub mod interceptor;
pub mod options;
pub mod transport;
pub mod types;

pub use assembler::{RequestAssembler, RequestDescriptor};
pub use cache::{DescriptorCache, Signature};
pub use call::{Call, RealCall};
pub use callback::{Callback, CallbackExecutor, InlineExecutor, SerialExecutor, Task};
pub use client::{ClientConfig, EasyHttp, EasyHttpBuilder};
pub use error::{Error, Result};
pub use executor_call::ExecutorCallbackCall;
pub use interceptor::{DomainRouter, Interceptor, DOMAIN_NAME_HEADER};
pub use options::{PostOptionsBuilder, RequestOptions, RequestOptionsBuilder, Target};
pub use transport::{ReqwestTransport, Transport, TransportCall};
pub use types::{
    HttpRequest, HttpResponse, Method, PostEncoding, QueryEncoding, RequestBody,
    FORM_CONTENT_TYPE, JSON_CONTENT_TYPE,
};
