// sci-domain library entry point
pub mod builder;
pub mod code;
pub mod computer;
pub mod error;
pub mod group;
pub mod repo;
pub mod workflow;
pub use builder::{BuildError, CodeBuilder, ErrorAccumulator, SpecValue};
pub use code::{Code, CodeSource, CodeSourceKind};
pub use computer::Computer;
pub use error::DomainError;
pub use group::Group;
pub use repo::{CodeRepository, GroupRepository, InMemoryCodeRepository, InMemoryGroupRepository,
               InMemoryWorkflowRepository, WorkflowRepository};
pub use workflow::Workflow;
