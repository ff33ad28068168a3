use crate::Session;
use common::Device;

/// 设备的扩展字符串中是否包含 `feature`。
///
/// 查询失败视为不支持。
pub fn supports<D: Device>(device: &D, feature: &str) -> bool {
    match device.extensions() {
        Ok(extensions) => extensions.contains(feature),
        Err(e) => {
            log::debug!("cannot query extensions of \"{}\": {e}", device.name());
            false
        }
    }
}

impl<D: Device> Session<D> {
    /// 会话设备是否支持 `feature`，已释放的会话不支持任何特性。
    pub fn supports(&self, feature: &str) -> bool {
        self.device.as_ref().is_some_and(|d| supports(d, feature))
    }
}

#[cfg(test)]
mod test {
    use super::supports;
    use crate::Session;
    use common::Device;
    use common_cpu::{Cpu, HostConfig, HostDevice};

    #[test]
    fn test_supports() {
        let cpu = Cpu::with_config(HostConfig::single(HostDevice {
            extensions: "cl_khr_fp64 cl_khr_int64_base_atomics".into(),
            ..Default::default()
        }))
        .unwrap();
        assert!(supports(&cpu, "cl_khr_int64_base_atomics"));
        assert!(supports(&cpu, "cl_khr_fp64"));
        assert!(!supports(&cpu, "cl_khr_fp16"));

        let mut session = Session::with_device(cpu);
        assert!(session.supports("cl_khr_fp64"));
        session.release_all();
        assert!(!session.supports("cl_khr_fp64"));
    }

    #[test]
    fn test_default_extensions() {
        let cpu = Cpu::open().unwrap();
        assert!(supports(&cpu, "cl_khr_int64_base_atomics"));
    }
}
