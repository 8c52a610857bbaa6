//! Plain types shared by every layer: identifiers, request descriptions and
//! the request error taxonomy.

pub mod error;
pub mod id;
pub mod request;

pub use error::{DataError, NetworkError, RequestError};
pub use id::{ListenerId, SessionId, Topic};
pub use request::{
    FetchRequest, PayloadProvider, Priority, SendRequest, TopicEvent, UploadRequest, Validator,
};
