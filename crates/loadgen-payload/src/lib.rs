//! Synthetic payload generator for mqtt-loadgen.
//!
//! This crate provides the `PayloadGenerator` which produces one synthetic
//! record per point and publish cycle. Every record has the same shape: a
//! single object of 200 numeric fields (`test1` .. `test200`), each drawn
//! uniformly from [-100, 100] and rounded to two decimal places.
//!
//! # Architecture
//!
//! ```text
//!        Point
//!          │
//!          ▼
//! ┌──────────────────┐
//! │ PayloadGenerator │
//! │                  │
//! │  - rng (StdRng)  │
//! │  - generated     │
//! └────────┬─────────┘
//!          │
//!          ▼
//!   PublishRecord { point, values }
//!          │
//!          ▼
//!   { "<point>": [ { "test1": 12.5, ..., "test200": -3.07 } ] }
//! ```
//!
//! # Example
//!
//! ```rust
//! use loadgen_payload::PayloadGenerator;
//!
//! let mut generator = PayloadGenerator::with_seed(42);
//! let record = generator.generate("P1");
//! assert_eq!(record.values().len(), 200);
//!
//! let bytes = record.to_json_bytes().unwrap();
//! assert!(bytes.starts_with(b"{\"P1\":[{\"test1\":"));
//! ```

pub mod generator;
pub mod numeric;
pub mod record;

// Re-exports for convenience
pub use generator::{derive_worker_seed, PayloadGenerator};
pub use record::{PublishRecord, FIELD_COUNT, FIELD_PREFIX, VALUE_MAX, VALUE_MIN};
