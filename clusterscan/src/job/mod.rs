//! Scan jobs and the name-based job resolution protocol.
//!
//! - [`ScanJob`]: the per-partition computation contract
//! - [`RootReference`]: `<type>#<field>` pointers to configuration roots
//! - [`TypeRegistry`]: name-based lookup of job constructors and the
//!   schema fields published through [`SchemaProvider`]

mod reference;
mod registry;
mod scan_job;

pub use reference::{
    decode_reference, encode_reference, MalformedReference, RootReference, REFERENCE_SEPARATOR,
};
pub use registry::{FieldValue, JobConstructor, ResolutionError, SchemaProvider, TypeRegistry};
pub use scan_job::{Record, ScanJob, ScanJobError};
