//! Parameter schema: structural keys, class flags and descriptor sets

pub mod description;
pub mod types;

pub use description::{ParameterDescriptionSet, ParameterDescriptor, ValueRange};
pub use types::{ParamIndex, ParameterClass, ParameterClasses};
