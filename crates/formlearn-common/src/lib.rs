pub mod error;
pub mod protocol;

pub use error::ProtocolError;
pub use protocol::{
    ElementKey, FieldContext, FieldValue, ObserverMessage, SessionId, SubmittedField, Trigger,
};
