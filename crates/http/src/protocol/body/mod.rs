//! Streaming request bodies.
//!
//! A [`ReqBody`] is the handler's end of a pair of channels; the other end
//! lives in the connection and pulls decoded segments off the socket only when
//! the handler asks for them. That keeps memory bounded by the read chunk size
//! and lets the connection drain unread bytes before the next request.

mod req_body;

pub use req_body::ReqBody;
