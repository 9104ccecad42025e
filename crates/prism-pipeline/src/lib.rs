//! prism-pipeline: effect kernels and batch runners (sans-IO).
//!
//! Applies ordered chains of 3x3 effects (grayscale, sharpen, blur, edge
//! detection) to batches of 16-bit RGBA images under one of three
//! strategies:
//!
//! - sequential: the single-threaded baseline
//! - BSP: persistent workers over column slices with a completion join
//! - pipeline: paced producer, consumer pool, per-stage tile fan-out
//!
//! All three persist identical bytes for identical inputs.
//!
//! This crate has **no filesystem dependencies**: images are decoded and
//! encoded through the [`Codec`] trait. The PNG codec and the on-disk plan
//! layout live in `prism-io`.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod item;
pub mod join;
pub mod kernel;
pub mod partition;
pub mod rotation;
pub mod shared;
mod spawn;
pub mod strategy;
pub mod types;

pub use buffer::{PixelBuffer, PixelSource, PixelTriple, Rgba16, Rgba16Image, Tile};
pub use codec::{Codec, MemoryCodec};
pub use config::{RunConfig, Strategy};
pub use diagnostics::BatchReport;
pub use item::WorkItem;
pub use partition::{ColumnRange, partition};
pub use strategy::run_batch;
pub use types::{
    Batch, CodecError, Dimensions, Effect, Job, PipelineError, PlanRecord, UnknownEffect,
};
