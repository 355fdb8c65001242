//! Values exchanged with the transport core.
//!
//! - [`Request`]: an immutable outbound request, shared as `Arc<Request>`
//! - [`Response`]: the immutable result of an exchange, pointing back to its request
//! - [`Origin`]: the `(scheme, host, port)` key connections are pooled by

mod origin;
pub use origin::Origin;

mod request;
pub use request::DEFAULT_TIMEOUT;
pub use request::Request;
pub use request::RequestBuilder;

mod response;
pub use response::Response;
