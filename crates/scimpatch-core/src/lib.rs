pub mod error;
pub mod schema;
pub mod value;

pub use error::{CoreError, Result};
pub use schema::{
    AttributeDefinition, AttributeType, Mutability, Schema, SchemaSet, CORE_USER_SCHEMA,
    ENTERPRISE_USER_SCHEMA,
};
pub use value::{AttributeMap, AttributeTree, AttributeValue, Scalar, find_key};
