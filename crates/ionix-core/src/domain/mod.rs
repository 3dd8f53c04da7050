//! Domain model (envelope, codec, outcomes, handler errors).

pub mod codec;
pub mod envelope;
pub mod errors;
pub mod outcome;

pub use self::codec::{DecodeFailure, decode_envelope, encode_envelope};
pub use self::envelope::{EventEnvelope, EventType};
pub use self::errors::HandlerError;
pub use self::outcome::{DispatchOutcome, OutcomeKind};
