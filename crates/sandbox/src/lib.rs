//! Sandbox collaborator for nbrun
//!
//! - **`document`**: reads and structurally validates notebooks
//! - **`session`**: the `Sandbox` / `SandboxSession` / `Releasable` boundary
//! - **`process`**: a sandbox that runs each notebook through `jupyter nbconvert`

pub mod document;
pub mod process;
pub mod session;

pub use document::Notebook;
pub use process::ProcessSandbox;
pub use session::{Releasable, Sandbox, SandboxSession, SessionSpec};
