use crate::library::Library;

/// 模拟的加速器拓扑。
#[derive(Clone, Debug)]
pub struct HostConfig {
    pub platforms: Vec<HostPlatform>,
    pub library: Library,
}

#[derive(Clone, Debug)]
pub struct HostPlatform {
    pub name: String,
    pub devices: Vec<HostDevice>,
}

#[derive(Clone, Debug)]
pub struct HostDevice {
    pub name: String,
    /// 以空格分隔的扩展名。
    pub extensions: String,
    /// 设备存储容量（字节）。
    pub memory: usize,
    /// 为 `false` 时无法创建上下文。
    pub available: bool,
    /// 为 `false` 时无法创建带性能分析的队列。
    pub profiling: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            platforms: vec![HostPlatform::default()],
            library: Library::builtin(),
        }
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self {
            name: "Host".into(),
            devices: vec![HostDevice::default()],
        }
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        Self {
            name: "Host Emulated Accelerator".into(),
            extensions: "cl_khr_byte_addressable_store cl_khr_global_int32_base_atomics \
                         cl_khr_int64_base_atomics cl_khr_int64_extended_atomics"
                .into(),
            memory: 1 << 30,
            available: true,
            profiling: true,
        }
    }
}

impl HostConfig {
    /// 只包含给定设备的单平台配置。
    pub fn single(device: HostDevice) -> Self {
        Self {
            platforms: vec![HostPlatform {
                devices: vec![device],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    /// 没有任何平台。
    pub fn none() -> Self {
        Self {
            platforms: vec![],
            ..Default::default()
        }
    }
}
