//! Core HTTP/1.1 client protocol abstractions.
//!
//! # Architecture
//!
//! - **Message Handling** ([`message`]): framing types shared by the codec
//!   - [`Message`]: either a head or a payload item
//!   - [`PayloadItem`]: one chunk of body data or the EOF marker
//!   - [`PayloadSize`]: how the body of a message is delimited
//!
//! - **Request Heads** ([`request`]): [`RequestHead`] wraps the outbound request line and headers
//!
//! - **Response Heads** ([`response`]): [`ResponseHead`] wraps the decoded status line and headers
//!
//! - **Error Handling** ([`error`]):
//!   - [`HttpError`]: Top-level error type
//!   - [`ParseError`]: Response decoding errors
//!   - [`SendError`]: Request encoding errors

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHead;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
