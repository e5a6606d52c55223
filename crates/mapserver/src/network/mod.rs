//! HTTP transport abstraction.

pub mod http;
pub mod traits;

pub use http::ReqwestTransport;
pub use traits::{HttpRequest, HttpResponse, Method, Transport};
