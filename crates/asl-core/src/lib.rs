//! # asl-core
//!
//! Core types shared by every ASL crate: the error taxonomy, compiler
//! configuration, pipeline stages, the ASL ↔ GLSL type vocabulary and
//! content hashing.

pub mod config;
pub mod error;
pub mod hash;
pub mod stage;
pub mod types;

pub use config::{AslConfig, CompileConfig, GlslConfig};
pub use error::{AslError, AslResult, Construct};
pub use hash::{hash_source, ContentHash};
pub use stage::Stage;
pub use types::ScalarKind;
