pub mod connector;
pub mod plans;

pub use connector::{StubConnector, StubError};
pub use plans::canned_plan;
