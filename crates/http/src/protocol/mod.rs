//! Protocol types shared by the codec, the connection and handlers.
//!
//! - [`Message`], [`PayloadItem`] and [`PayloadSize`] are the frames exchanged
//!   with the codec.
//! - [`RequestHeader`] and [`ResponseHead`] are message heads.
//! - [`body::ReqBody`] streams request bodies to handlers.
//! - [`ResponseCompletion`], [`MatchedPath`] and [`ReasonPhrase`] are the
//!   annotations requests and responses carry in their extensions.
//! - [`HttpError`], [`ParseError`] and [`SendError`] describe what went wrong.

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::MatchedPath;
pub use request::RequestHeader;

mod response;
pub use response::ReasonPhrase;
pub use response::ResponseHead;
pub(crate) use response::{reason_phrase, response_wants_close};

mod completion;
pub(crate) use completion::{CompletionNotifier, completion_channel};
pub use completion::{ResponseAborted, ResponseCompletion};

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
pub mod path;
