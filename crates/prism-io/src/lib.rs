//! prism-io: filesystem adapters for prism.
//!
//! Provides the PNG [`Codec`](prism_pipeline::Codec) implementation, the
//! plan loader, and the data-root layout that turns plan records into
//! per-tag batches. All processing lives in `prism-pipeline`.

pub mod codec;
pub mod layout;
pub mod plan;

pub use codec::PngCodec;
pub use layout::{DataLayout, split_tags};
pub use plan::{PlanError, load_plan, parse_plan};
