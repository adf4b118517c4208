//! Session scoping and client composition.
//!
//! A [`SessionScope`] owns the filter of one chat session. The
//! [`ChatClientBuilder`] threads it into the client:
//!
//! ```text
//! raw ChatClient -> FunctionInvokingClient(tools) -> ConfirmationGatedInvoker(scope.filter)
//! ```

mod builder;
mod scope;

pub use builder::ChatClientBuilder;
pub use scope::SessionScope;
