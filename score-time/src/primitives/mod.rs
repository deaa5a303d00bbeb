//! Elements of musical time.
//!
//! [Rational] offsets and durations build [TimeInterval]s.
//! [Leaf]s live in a [Voice], which also knows ties and spanners
//! between them. Runs of tied leaves are [TieChain]s, which durations are
//! always computed against the current voice.

pub mod interval;
pub mod leaf;
pub mod meiotic;
pub mod rational;
pub mod tie_chain;
pub mod voice;

pub use interval::TimeInterval;
pub use leaf::{Chord, Leaf, LeafKind, Note, TimedEvent};
pub use meiotic::divide_leaf_meiotically;
pub use rational::{is_power_of_two, Rational, MAX_ASSIGNABLE};
pub use tie_chain::{fuse_tie_chain, get_tie_chain, TieChain};
pub use voice::{LeafId, Spanner, SpannerId, SpannerKind, Voice};
