//! # Actions
//!
//! The capability registry and invocation gateway shared by every
//! integration client.
//!
//! ## Architecture
//!
//! ```text
//! Client::new(config)
//!   │ Action::builder(name, description).param(..).nullable(..).handler(..)
//!   ▼
//! ActionRegistry            (immutable after build, insertion ordered)
//!   │ available_actions()  → [{name: {description, params}}]
//!   │ execute_action()     → ActionResult
//!   ▼
//! Action::bind()            fill optionals with null, reject missing required,
//!   │                       drop undeclared keys
//!   ▼
//! Action::call()            handler errors and panics → ExecutionFailed
//! ```
//!
//! A client exposes its registry through the [`ActionRouter`] trait, so the
//! calling layer can treat every integration the same way.
//!
//! ## Declaring actions
//!
//! ```rust,ignore
//! let actions = ActionRegistry::builder()
//!     .action(
//!         Action::builder("get_issue", "Get a particular issue")
//!             .param("issue_id")
//!             .handler(move |args| {
//!                 let api = api.clone();
//!                 async move { api.get_issue(&args.require::<String>("issue_id")?).await }
//!             }),
//!     )
//!     .build()?;
//! ```

pub mod action;
pub mod args;
pub mod descriptor;
pub mod error;
pub mod gateway;
pub mod registry;

pub use action::{Action, ActionBuilder, ActionHandler, Params};
pub use args::{ActionArgs, ArgError};
pub use descriptor::{ActionDescriptor, ActionInfo, ActionListing, ParamEntry, ParamKind, ParamSpec};
pub use error::{InvocationError, RegistryError};
pub use gateway::{ActionResult, ActionRouter};
pub use registry::{ActionRegistry, CollisionPolicy, RegistryBuilder};
