//! Domain Layer
//!
//! Test identities, results and the rules that interpret file changes.
//!
//! ## Structure
//!
//! - `entities/` - Results of runs and cached outcomes
//! - `value_objects/` - Immutable value types (TestKey, Fingerprint, FileChange)
//! - `policies/` - Change classification and watch modes
//! - `ports/` - Interface definitions for infrastructure

pub mod entities;
pub mod policies;
pub mod ports;
pub mod value_objects;
