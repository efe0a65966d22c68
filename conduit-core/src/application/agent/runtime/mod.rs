mod execution;
mod validation;

use std::collections::HashMap;

use crate::application::tooling::ToolSession;
use crate::domain::types::ToolDescriptor;

pub(super) use execution::{ToolExecution, ToolRequest};
pub use validation::validate_arguments;

/// Dispatches the tool uses of one turn against a fixed catalog.
pub struct ToolRuntime<'a> {
    index: HashMap<&'a str, &'a ToolDescriptor>,
    session: &'a dyn ToolSession,
}

impl<'a> ToolRuntime<'a> {
    pub fn new(catalog: &'a [ToolDescriptor], session: &'a dyn ToolSession) -> Self {
        let index = catalog
            .iter()
            .map(|descriptor| (descriptor.name.as_str(), descriptor))
            .collect();
        Self { index, session }
    }
}
