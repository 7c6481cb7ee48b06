//! SCIM attribute paths and filter expressions (RFC 7644 §3.4.2.2, §3.5.2).
//!
//! - [`parse_attr_path`] parses `[uri:]attr[.subAttr]`
//! - [`parse_path`] parses PATCH paths, `attr[valFilter][.subAttr]`
//! - [`parse_filter`] parses filter expressions
//! - [`Validator`] checks a filter against a schema and evaluates it

pub mod error;
pub mod filter;
pub mod path;
pub mod validator;

pub use error::FilterError;
pub use filter::{CompareOp, CompareValue, FilterExpression, LogicalOp, parse_filter};
pub use path::{AttributePath, Path, build_filter_string, parse_attr_path, parse_path};
pub use validator::Validator;
