//! `plays-engine`: validation, execution, and the job state machine.
//!
//! ```text
//! Engine
//!   ├── Validator   ← `<tool> --syntax-check -i <inventory> <scratch>`
//!   ├── Executor    ← `<tool> -i <inventory> <playbook> [-v]`
//!   │      │
//!   │      ▼
//!   │   ProcessRunner (TokioRunner in production)
//!   └── Repository + ContentStore (plays-core)
//! ```
//!
//! Both pipelines share one semaphore, which caps the number of tool
//! processes alive at once.

pub mod engine;
pub mod error;
pub mod execute;
pub mod runner;
pub mod validate;


pub use engine::Engine;
pub use error::EngineError;
pub use execute::{ExecutionResult, Executor};
pub use runner::{Invocation, ProcessOutput, ProcessRunner, TokioRunner};
pub use validate::{ValidationReport, Validator};

pub type Result<T> = std::result::Result<T, EngineError>;
