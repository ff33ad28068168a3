use crate::library::{Args, NativeKernel, Value, WorkItem};
use common::Profiling;
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
    time::Instant,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Status {
    Queued,
    Complete,
    Failed,
}

pub(crate) struct EventState {
    status: Cell<Status>,
    times: Cell<Profiling>,
}

impl EventState {
    #[inline]
    pub fn status(&self) -> Status {
        self.status.get()
    }

    #[inline]
    pub fn times(&self) -> Profiling {
        self.times.get()
    }
}

struct Command {
    kernel: NativeKernel,
    args: Vec<Value>,
    global: [usize; 3],
    event: Rc<EventState>,
}

/// 顺序命令队列。
///
/// 入队只记录命令，直到 `flush`（由 `finish` 或阻塞映射触发）才按提交顺序执行。
pub(crate) struct Queue {
    epoch: Instant,
    pending: RefCell<VecDeque<Command>>,
}

impl Queue {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            pending: Default::default(),
        }
    }

    /// 设备打开以来的纳秒数。
    fn now(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as _
    }

    pub fn push(&self, kernel: NativeKernel, args: Vec<Value>, global: [usize; 3]) -> Rc<EventState> {
        let now = self.now();
        let event = Rc::new(EventState {
            status: Cell::new(Status::Queued),
            times: Cell::new(Profiling {
                queued: now,
                submit: now,
                start: 0,
                end: 0,
            }),
        });
        self.pending.borrow_mut().push_back(Command {
            kernel,
            args,
            global,
            event: event.clone(),
        });
        event
    }

    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// 执行所有挂起的命令。
    ///
    /// 某条命令出错后，其后的命令全部标记为失败且不再执行。
    pub fn flush(&self) -> Result<(), String> {
        let mut result = Ok(());
        loop {
            let Some(cmd) = self.pending.borrow_mut().pop_front() else {
                break result;
            };
            if result.is_err() {
                cmd.event.status.set(Status::Failed);
                continue;
            }
            let mut times = cmd.event.times();
            times.start = self.now();
            let status = match execute(&cmd) {
                Ok(()) => Status::Complete,
                Err(msg) => {
                    result = Err(msg);
                    Status::Failed
                }
            };
            times.end = self.now();
            cmd.event.times.set(times);
            cmd.event.status.set(status);
        }
    }
}

fn execute(cmd: &Command) -> Result<(), String> {
    let Command {
        kernel,
        args,
        global: [gx, gy, gz],
        ..
    } = cmd;
    let args = Args(args);
    for z in 0..*gz {
        for y in 0..*gy {
            for x in 0..*gx {
                let item = WorkItem {
                    id: [x, y, z],
                    size: cmd.global,
                };
                (kernel.run)(&item, &args).map_err(|fault| {
                    format!("kernel `{}` faulted at work item ({x}, {y}, {z}): {fault}", kernel.name)
                })?
            }
        }
    }
    Ok(())
}
