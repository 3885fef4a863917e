pub mod envelope;
pub mod error;
pub mod identifier;
pub mod record;
pub mod rpc;

pub use envelope::{Version, WireEnvelope, MAGIC_BYTES, VERSION};
pub use error::TypesError;
pub use identifier::{NodeId, HEX_DIGITS, RING_BITS, RING_SIZE};
pub use record::{Axis, AxisBounds, AxisOverrides, Criteria, Point, RangeQuery, Record, RecordUpdate};
pub use rpc::{NodeHandle, NodeStatus, Request, Response};

impl<'a> WireEnvelope<'a> for Request {}
impl<'a> WireEnvelope<'a> for Response {}
