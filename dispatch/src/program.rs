use crate::{invocation::KernelEntry, KernelId, Session};
use common::{
    compilation_failed, entry_point_not_found, parse_signatures, source_unavailable, Device,
    Result, Signature,
};
use std::{fs, path::Path};

/// 会话中某个程序的编号。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ProgramId(pub(crate) usize);

pub(crate) struct ProgramEntry<D: Device> {
    pub program: D::Program,
    pub name: String,
    pub signatures: Vec<Signature>,
}

impl<D: Device> Session<D> {
    /// 读取 kernel 源文件并为会话设备构建程序。
    pub fn build_program(&mut self, path: impl AsRef<Path>) -> Result<ProgramId> {
        let path = path.as_ref();
        let src = fs::read_to_string(path)
            .map_err(|e| source_unavailable(format!("{}: {e}", path.display())))?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into());
        self.build_program_from_source(&name, &src, "")
    }

    /// 以给定的构建选项（如 `-D NAME=VALUE`）从内存中的源码构建程序。
    ///
    /// 失败时 [`common::ErrorKind::CompilationFailed`] 携带完整的编译日志。
    pub fn build_program_from_source(
        &mut self,
        name: &str,
        src: &str,
        options: &str,
    ) -> Result<ProgramId> {
        let device = self.device_or(compilation_failed)?;

        let signatures = match parse_signatures(src) {
            Ok(signatures) => signatures,
            Err(e) => {
                log::debug!("{name}:{e}, kernels fall back to opaque signatures");
                vec![]
            }
        };
        let program = device.build(src, options)?;
        log::debug!("built program \"{name}\" with options \"{options}\"");

        let id = ProgramId(self.programs.len());
        self.programs.push(Some(ProgramEntry {
            program,
            name: name.into(),
            signatures,
        }));
        Ok(id)
    }

    /// 从程序中取出名为 `name` 的入口函数。
    pub fn get_kernel(&mut self, program: ProgramId, name: &str) -> Result<KernelId> {
        let device = self.device_or(entry_point_not_found)?;
        let Some(Some(entry)) = self.programs.get(program.0) else {
            return Err(entry_point_not_found(format!("{program:?} does not exist")));
        };
        let kernel = device.kernel(&entry.program, name)?;
        let arity = device.arity(&kernel);

        let signature = match entry.signatures.iter().find(|s| s.name == name) {
            Some(s) if s.arity() == arity => s.clone(),
            Some(s) => {
                log::warn!(
                    "kernel \"{name}\" declares {} parameters but the device reports {arity}",
                    s.arity()
                );
                Signature::opaque(name, arity)
            }
            None => Signature::opaque(name, arity),
        };

        let id = KernelId(self.kernels.len());
        self.kernels.push(Some(KernelEntry::new(kernel, signature)));
        Ok(id)
    }

    /// kernel 的参数签名。
    pub fn signature(&self, kernel: KernelId) -> Option<&Signature> {
        self.kernels
            .get(kernel.0)
            .and_then(Option::as_ref)
            .map(|k| &k.signature)
    }
}
