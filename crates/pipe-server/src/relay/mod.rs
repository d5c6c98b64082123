//! Session-pairing relay core.
//!
//! A session moves between two states: absent, or open with `n >= 1`
//! members. Joins create or grow it, leaves shrink it, and it is deleted in
//! the same critical section that removes its last member. A departing
//! controller or an expired orphan ends it for everyone.

pub mod broadcast;
pub mod engine;
pub mod member;
pub mod reaper;
pub mod registry;

pub use broadcast::{BroadcastReport, broadcast};
pub use engine::{RelayEngine, RelayReport};
pub use member::{Frame, Member};
pub use reaper::{spawn_reaper, sweep};
pub use registry::{Departure, SessionRegistry};
