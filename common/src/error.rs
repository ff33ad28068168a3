use std::{error::Error, fmt, panic::Location};

#[derive(Clone)]
pub struct ErrorPosition {
    file: &'static str,
    line: u32,
    message: String,
}

impl Error for ErrorPosition {}

impl ErrorPosition {
    #[inline]
    pub const fn new(file: &'static str, line: u32, message: String) -> Self {
        Self {
            file,
            line,
            message,
        }
    }

    #[inline]
    pub fn file(&self) -> &'static str {
        self.file
    }

    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for ErrorPosition {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}: {:?}", self.file, self.line, self.message)
    }
}

impl fmt::Display for ErrorPosition {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}: \"{}\"", self.file, self.line, self.message)
    }
}

#[macro_export]
macro_rules! locate_error {
    ($msg:expr) => {
        $crate::ErrorPosition::new(file!(), line!(), $msg.to_string())
    };
    () => {
        $crate::locate_error!("Error occurred")
    };
}

/// 调度流程中所有可能的失败。
///
/// 每一种失败对本次运行都是终止性的，不存在局部恢复或重试。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    PlatformUnavailable,
    ContextCreationFailed,
    QueueCreationFailed,
    SourceUnavailable,
    CompilationFailed,
    EntryPointNotFound,
    AllocationFailed { index: usize },
    MapFailed,
    UnmapFailed,
    ArgumentBindingFailed { index: usize },
    GeometryMismatch,
    EnqueueFailed,
    ExecutionFailed,
    ProfilingUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorKind::*;
        match self {
            PlatformUnavailable => f.write_str("no accelerator platform or device available"),
            ContextCreationFailed => f.write_str("failed to create the device context"),
            QueueCreationFailed => f.write_str("failed to create the command queue"),
            SourceUnavailable => f.write_str("failed to read kernel source"),
            CompilationFailed => f.write_str("failed to build the program"),
            EntryPointNotFound => f.write_str("kernel entry point not found"),
            AllocationFailed { index } => write!(f, "failed to allocate buffer #{index}"),
            MapFailed => f.write_str("failed to map buffer"),
            UnmapFailed => f.write_str("failed to unmap buffer"),
            ArgumentBindingFailed { index } => write!(f, "failed to bind kernel argument #{index}"),
            GeometryMismatch => f.write_str("invalid work geometry"),
            EnqueueFailed => f.write_str("failed to enqueue the kernel"),
            ExecutionFailed => f.write_str("kernel execution failed"),
            ProfilingUnavailable => f.write_str("profiling information unavailable"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DispatchError {
    pub kind: ErrorKind,
    pub position: ErrorPosition,
}

impl DispatchError {
    #[track_caller]
    #[inline]
    pub fn new(kind: ErrorKind, info: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            kind,
            position: ErrorPosition::new(location.file(), location.line(), info.into()),
        }
    }

    #[inline]
    pub fn info(&self) -> &str {
        self.position.message()
    }

    /// 将后端报告的分配或绑定失败重新标记到调用方的位置索引上。
    pub fn at_index(mut self, i: usize) -> Self {
        match &mut self.kind {
            ErrorKind::AllocationFailed { index } | ErrorKind::ArgumentBindingFailed { index } => {
                *index = i
            }
            _ => {}
        }
        self
    }
}

impl Error for DispatchError {}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let Self { kind, position } = self;
        write!(f, "{}:{}: {kind}", position.file(), position.line())?;
        match (kind, position.message()) {
            (_, "") => Ok(()),
            // 编译日志是修复 kernel 源码唯一有用的信息，必须原样完整输出
            (ErrorKind::CompilationFailed, log) => write!(f, "\n{log}"),
            (_, info) => write!(f, ": {info}"),
        }
    }
}

pub mod functions {
    use super::{DispatchError, ErrorKind::*};

    macro_rules! builder {
        ($name:ident $kind:ident indexed) => {
            #[track_caller]
            #[inline]
            pub fn $name(index: usize, info: impl Into<String>) -> DispatchError {
                DispatchError::new($kind { index }, info)
            }
        };
        ($name:ident $kind:ident) => {
            #[track_caller]
            #[inline]
            pub fn $name(info: impl Into<String>) -> DispatchError {
                DispatchError::new($kind, info)
            }
        };
    }

    builder!(platform_unavailable    PlatformUnavailable          );
    builder!(context_creation_failed ContextCreationFailed        );
    builder!(queue_creation_failed   QueueCreationFailed          );
    builder!(source_unavailable      SourceUnavailable            );
    builder!(compilation_failed      CompilationFailed            );
    builder!(entry_point_not_found   EntryPointNotFound           );
    builder!(allocation_failed       AllocationFailed      indexed);
    builder!(map_failed              MapFailed                    );
    builder!(unmap_failed            UnmapFailed                  );
    builder!(argument_binding_failed ArgumentBindingFailed indexed);
    builder!(geometry_mismatch       GeometryMismatch             );
    builder!(enqueue_failed          EnqueueFailed                );
    builder!(execution_failed        ExecutionFailed              );
    builder!(profiling_unavailable   ProfilingUnavailable         );
}

#[cfg(test)]
mod test {
    use super::{functions::*, ErrorKind, ErrorPosition};

    #[test]
    fn test_locate_error() {
        fn error() -> ErrorPosition {
            locate_error!()
        }
        let e = error();
        assert_eq!(e.file(), file!());
        assert_eq!(e.message(), "Error occurred");
        println!("{e:?}");
    }

    #[test]
    fn test_caller_location() {
        let line = line!() + 1;
        let e = map_failed("buffer #0 is already mapped");
        assert_eq!(e.kind, ErrorKind::MapFailed);
        assert_eq!(e.position.file(), file!());
        assert_eq!(e.position.line(), line);
        assert!(e.to_string().ends_with(": buffer #0 is already mapped"));
    }

    #[test]
    fn test_compilation_log_verbatim() {
        let log = "sobel.cl:3:5: error: use of undeclared identifier 'x'\n    x = 1;\n    ^";
        let e = compilation_failed(log);
        let text = e.to_string();
        assert!(text.ends_with(&format!("\n{log}")));
    }

    #[test]
    fn test_at_index() {
        let e = allocation_failed(0, "out of device memory").at_index(2);
        assert_eq!(e.kind, ErrorKind::AllocationFailed { index: 2 });
        let e = enqueue_failed("busy").at_index(2);
        assert_eq!(e.kind, ErrorKind::EnqueueFailed);
    }
}
