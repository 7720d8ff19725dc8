//! HTTP client for the external image-analysis subsystem.
//!
//! The subsystem is capability-variable and may be absent, slow, or only
//! partially capable (OCR-only, detection-only, or a minimal color/emotion
//! build). This crate never fails an upload: callers map `VisionError` into a
//! degraded record.

pub mod client;

pub use client::{VisionClient, VisionError};
