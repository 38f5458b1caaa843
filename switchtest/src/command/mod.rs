//! Command templating and response verification.
//!
//! Command definitions live in a JSON document loaded once into an
//! immutable [`TemplateStore`]; the [`CommandManager`] binds parameters
//! into a template, sends the resolved string through the connection
//! manager, and turns the raw output into an [`ExecutionResult`].

mod manager;
mod template;

pub use manager::{CommandManager, ExecutionResult};
pub use template::{CommandTemplate, TemplateStore};
