use std::{cell::Cell, rc::Rc};

/// 模拟设备上存活对象的计数器，用于检查资源是否全部归还。
///
/// 设备关闭之后仍然可以查询。
#[derive(Clone, Default)]
pub struct Census(Rc<Counters>);

#[derive(Default)]
struct Counters([Cell<usize>; 6]);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Object {
    Context = 0,
    Queue,
    Program,
    Kernel,
    Buffer,
    Event,
}

/// 某一时刻的存活对象数。
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Live {
    pub contexts: usize,
    pub queues: usize,
    pub programs: usize,
    pub kernels: usize,
    pub buffers: usize,
    pub events: usize,
}

impl Live {
    #[inline]
    pub fn total(&self) -> usize {
        self.contexts + self.queues + self.programs + self.kernels + self.buffers + self.events
    }
}

impl Census {
    pub fn live(&self) -> Live {
        let [contexts, queues, programs, kernels, buffers, events] =
            self.0 .0.each_ref().map(Cell::get);
        Live {
            contexts,
            queues,
            programs,
            kernels,
            buffers,
            events,
        }
    }

    pub(crate) fn track(&self, object: Object) -> Tracked {
        let counter = &self.0 .0[object as usize];
        counter.set(counter.get() + 1);
        Tracked {
            census: self.clone(),
            object,
        }
    }
}

/// 对象存活期间持有的计数凭证，释放时计数减一。
pub(crate) struct Tracked {
    census: Census,
    object: Object,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        let counter = &self.census.0 .0[self.object as usize];
        counter.set(counter.get() - 1);
    }
}

#[test]
fn test_track() {
    let census = Census::default();
    let a = census.track(Object::Buffer);
    let b = census.track(Object::Buffer);
    let c = census.track(Object::Kernel);
    assert_eq!(
        census.live(),
        Live {
            kernels: 1,
            buffers: 2,
            ..Default::default()
        }
    );
    drop((a, c));
    assert_eq!(census.live().buffers, 1);
    assert_eq!(census.live().total(), 1);
    drop(b);
    assert_eq!(census.live(), Live::default());
}
