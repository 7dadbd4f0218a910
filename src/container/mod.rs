// Container module - Identity, environment and the runtime boundary

mod admission;
pub mod docker;
mod env;
mod identity;
pub mod runtime;
pub mod source;

pub use admission::AdmissionFilter;
pub use docker::DockerRuntime;
pub use env::EnvironmentMap;
pub use identity::ContainerIdentity;
pub use runtime::{ContainerDetails, ContainerRuntime, RuntimeEvent, SourceStream};
pub use source::{SourceAcquirer, SourceKind};
