//! SCIM PATCH for resource attribute trees.
//!
//! Decode an RFC 7644 PatchOp body with [`PatchRequest`], then apply the
//! resulting operations with [`AttributePatcher::apply`]. The patcher only
//! touches the tree it is given; loading and persisting the resource is the
//! caller's job, and the caller should persist only when
//! [`PatchOutcome::changed`] is set.

pub mod error;
pub mod operation;
pub mod patcher;
pub mod policy;

pub use error::PatchError;
pub use operation::{PATCH_OP_SCHEMA, PatchOp, PatchOperation, PatchRequest, RawPatchOperation};
pub use patcher::{AttributePatcher, PatchOutcome};
pub use policy::{MalformedItemPolicy, PatchPolicy, SubAttributeRemove};
