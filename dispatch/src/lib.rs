mod buffer;
mod geometry;
mod invocation;
mod probe;
mod program;
mod session;

pub use buffer::{BufferId, BufferSpec, MappedView};
pub use common::*;
pub use geometry::WorkGeometry;
pub use invocation::{Arg, Event, KernelId};
pub use probe::supports;
pub use program::ProgramId;
pub use session::{Session, Teardown};

#[cfg(feature = "common-cpu")]
pub use common_cpu;

#[cfg(feature = "opencl")]
pub use opencl;
