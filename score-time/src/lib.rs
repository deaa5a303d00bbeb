//! Exact musical time: rational offsets, interval trees with set algebra
//! over them, and leaves of a voice, grouped by ties.
//!
//! ```
//! use score_time::{
//!     primitives::{Leaf, Rational, Voice},
//!     tree::algebra,
//! };
//! let r = |n, d| Rational::new(n, d).unwrap();
//! let voice = Voice::from_leaves(vec![
//!     (Leaf::note(60, r(1, 4)).unwrap(), true),
//!     (Leaf::note(60, r(1, 8)).unwrap(), false),
//!     (Leaf::rest(r(1, 8)).unwrap(), false),
//! ])
//! .unwrap();
//! let chains = voice.tie_chain_timespans(Rational::zero()).unwrap();
//! assert_eq!(chains.len(), 2);
//! let fused = algebra::fuse_overlapping_intervals(&chains);
//! assert_eq!(fused.aggregate_duration(), r(1, 2));
//! ```

pub mod error;
pub mod primitives;
pub mod tree;

pub use error::{TimeError, TimeResult};
pub use primitives::{Rational, TimeInterval};
pub use tree::TimeIntervalTree;
