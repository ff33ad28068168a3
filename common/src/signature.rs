use digit_layout::{types as ty, DigitLayout};
use std::fmt;

/// 从 OpenCL C 源码中解析出的 kernel 声明。
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Param>,
    /// `__kernel` 关键字所在的行号（从 1 开始），无法定位时为 0。
    pub line: usize,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AddressSpace {
    Global,
    Constant,
    Local,
    Private,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParamKind {
    /// 指针参数。`elem` 为 `None` 表示 `void*` 或无法识别的元素类型。
    Pointer {
        space: AddressSpace,
        elem: Option<DigitLayout>,
        lanes: usize,
        readonly: bool,
    },
    /// 按值传递的标量或短向量。
    Value { ty: DigitLayout, lanes: usize },
    /// 无法描述的类型（结构体、图像等），只检查下标。
    Opaque,
}

impl ParamKind {
    /// 按值参数占用的字节数，3 通道向量按 4 通道对齐。
    ///
    /// 非按值参数或元素类型没有确定宽度时返回 `None`。
    pub fn value_size(&self) -> Option<usize> {
        match *self {
            Self::Value { ty, lanes } => ty
                .nbytes()
                .map(|unit| unit * if lanes == 3 { 4 } else { lanes }),
            _ => None,
        }
    }
}

impl Signature {
    /// 只知道参数个数的签名。
    pub fn opaque(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            params: (0..arity)
                .map(|i| Param {
                    name: format!("arg{i}"),
                    kind: ParamKind::Opaque,
                })
                .collect(),
            line: 0,
        }
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignatureError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: error: {}", self.line, self.message)
    }
}

impl std::error::Error for SignatureError {}

/// 解析源码中全部 `__kernel` 函数的参数表。
pub fn parse_signatures(src: &str) -> Result<Vec<Signature>, SignatureError> {
    let text = strip_comments(src);
    let bytes = text.as_bytes();
    let mut ans = Vec::new();
    let mut cursor = 0;
    while let Some((start, end)) = next_word(&text, cursor) {
        cursor = end;
        let word = &text[start..end];
        if word != "__kernel" && word != "kernel" {
            continue;
        }
        let line = line_of(&text, start);
        let err = |message: String| SignatureError { line, message };

        // `__attribute__((...))` 可以出现在头部任意位置
        let Some((head, open)) = kernel_head(&text, end) else {
            return Err(err("expected parameter list after `__kernel`".into()));
        };
        let head = head.split_whitespace().collect::<Vec<_>>();
        let Some((&name, ret)) = head.split_last() else {
            return Err(err("missing kernel name".into()));
        };
        if !is_ident(name) {
            return Err(err(format!("invalid kernel name `{name}`")));
        }
        if ret != ["void"] {
            return Err(err(format!("kernel `{name}` must return void")));
        }
        let Some(close) = matching_paren(bytes, open) else {
            return Err(err(format!("unterminated parameter list of kernel `{name}`")));
        };

        let params = split_params(&text[open + 1..close])
            .into_iter()
            .enumerate()
            .map(|(i, p)| parse_param(p).map_err(|m| err(format!("kernel `{name}` parameter {i}: {m}"))))
            .collect::<Result<Vec<_>, _>>()?;

        ans.push(Signature {
            name: name.into(),
            params,
            line,
        });
        cursor = close;
    }
    Ok(ans)
}

fn strip_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

fn next_word(text: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let mut i = from;
    while i < bytes.len() && !is_word(bytes[i]) {
        i += 1;
    }
    if i == bytes.len() {
        return None;
    }
    let start = i;
    while i < bytes.len() && is_word(bytes[i]) {
        i += 1;
    }
    Some((start, i))
}

/// 去掉 `__attribute__((...))` 后的 kernel 头部，以及参数表左括号的位置。
fn kernel_head(text: &str, mut from: usize) -> Option<(String, usize)> {
    let mut head = String::new();
    loop {
        let open = text[from..].find('(').map(|i| from + i)?;
        match text[from..open].find("__attribute__") {
            Some(attr) => {
                head.push_str(&text[from..from + attr]);
                head.push(' ');
                from = matching_paren(text.as_bytes(), open)? + 1;
            }
            None => {
                head.push_str(&text[from..open]);
                return Some((head, open));
            }
        }
    }
}

/// `open` 处左括号对应的右括号。
fn matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].bytes().filter(|&b| b == b'\n').count() + 1
}

fn is_ident(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn split_params(list: &str) -> Vec<&str> {
    let list = list.trim();
    if list.is_empty() || list == "void" {
        return vec![];
    }
    list.split(',').map(str::trim).collect()
}

fn parse_param(text: &str) -> Result<Param, String> {
    if text.is_empty() {
        return Err("empty parameter".into());
    }
    let pointer = text.contains('*');
    let spaced = text.replace('*', " ");
    let words = spaced.split_whitespace().collect::<Vec<_>>();
    let Some((&name, decl)) = words.split_last() else {
        return Err("empty parameter".into());
    };
    if !is_ident(name) {
        return Err(format!("invalid parameter name `{name}`"));
    }

    let mut space = AddressSpace::Private;
    let mut readonly = false;
    let mut unsigned = false;
    let mut ty_words = Vec::new();
    for &w in decl {
        match w {
            "__global" | "global" => space = AddressSpace::Global,
            "__constant" | "constant" => space = AddressSpace::Constant,
            "__local" | "local" => space = AddressSpace::Local,
            "__private" | "private" => space = AddressSpace::Private,
            "const" => readonly = true,
            "restrict" | "__restrict" | "volatile" | "signed" => {}
            "unsigned" => unsigned = true,
            "__read_only" | "read_only" | "__write_only" | "write_only" | "__read_write"
            | "read_write" => {}
            _ => ty_words.push(w),
        }
    }
    let ty = match (unsigned, &ty_words[..]) {
        (true, []) => Some((ty::U32, 1)),
        (unsigned, [w]) => scalar_type(w, unsigned),
        _ => None,
    };

    let kind = if pointer {
        let (elem, lanes) = match ty {
            Some((t, l)) => (Some(t), l),
            None => (None, 1),
        };
        if space == AddressSpace::Constant {
            readonly = true;
        }
        ParamKind::Pointer {
            space,
            elem,
            lanes,
            readonly,
        }
    } else {
        match ty {
            Some((ty, lanes)) => ParamKind::Value { ty, lanes },
            None => ParamKind::Opaque,
        }
    };
    Ok(Param {
        name: name.into(),
        kind,
    })
}

fn scalar_type(word: &str, unsigned: bool) -> Option<(DigitLayout, usize)> {
    let base = word.trim_end_matches(|c: char| c.is_ascii_digit());
    let lanes = match &word[base.len()..] {
        "" => 1,
        n => match n.parse() {
            Ok(n @ (2 | 3 | 4 | 8 | 16)) => n,
            _ => return None,
        },
    };
    let ty = match (base, unsigned) {
        ("char", false) => ty::I8,
        ("char", true) | ("uchar", false) => ty::U8,
        ("short", false) => ty::I16,
        ("short", true) | ("ushort", false) => ty::U16,
        ("int", false) => ty::I32,
        ("int", true) | ("uint", false) => ty::U32,
        ("long", false) => ty::I64,
        ("long", true) | ("ulong", false) => ty::U64,
        ("half", false) => ty::F16,
        ("float", false) => ty::F32,
        ("double", false) => ty::F64,
        _ => return None,
    };
    Some((ty, lanes))
}

#[cfg(test)]
mod test {
    use super::*;

    const SOBEL: &str = r#"
/* 3x3 gradients, 16 pixels per work item */
__kernel void sobel(__global const uchar* restrict inputImage,
                    const int width,
                    __global char* restrict outputImageDX, // dX
                    __global char* restrict outputImageDY)
{
    const int column = get_global_id(0) * 16;
}
"#;

    #[test]
    fn test_parse_sobel() {
        let sigs = parse_signatures(SOBEL).unwrap();
        assert_eq!(sigs.len(), 1);
        let sobel = &sigs[0];
        assert_eq!(sobel.name, "sobel");
        assert_eq!(sobel.line, 3);
        assert_eq!(sobel.arity(), 4);
        assert_eq!(
            sobel.params[0].kind,
            ParamKind::Pointer {
                space: AddressSpace::Global,
                elem: Some(ty::U8),
                lanes: 1,
                readonly: true,
            }
        );
        assert_eq!(
            sobel.params[1].kind,
            ParamKind::Value {
                ty: ty::I32,
                lanes: 1
            }
        );
        assert_eq!(sobel.params[1].name, "width");
        assert_eq!(sobel.params[3].name, "outputImageDY");
    }

    #[test]
    fn test_parse_multiple_and_empty() {
        let src = "kernel void template(void) {}\n\
                   __kernel __attribute__((reqd_work_group_size(1, 1, 1))) void scale(__global float4 *v, float4 k, unsigned n, __local float* tmp) { }";
        let sigs = parse_signatures(src).unwrap();
        assert_eq!(sigs.len(), 2);
        assert_eq!(sigs[0].name, "template");
        assert_eq!(sigs[0].arity(), 0);

        let scale = &sigs[1];
        assert_eq!(scale.name, "scale");
        assert_eq!(scale.line, 2);
        assert_eq!(
            scale.params[0].kind,
            ParamKind::Pointer {
                space: AddressSpace::Global,
                elem: Some(ty::F32),
                lanes: 4,
                readonly: false,
            }
        );
        assert_eq!(scale.params[1].kind.value_size(), Some(16));
        assert_eq!(scale.params[2].kind.value_size(), Some(4));
        assert!(matches!(
            scale.params[3].kind,
            ParamKind::Pointer {
                space: AddressSpace::Local,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_attribute_positions() {
        let src = "__kernel void __attribute__((reqd_work_group_size(1,1,1))) template(void) {}\n\
                   __kernel __attribute__((vec_type_hint(float4))) void \
                   __attribute__((work_group_size_hint(16, 1, 1))) fill(__global float4* v) {}";
        let sigs = parse_signatures(src).unwrap();
        assert_eq!(sigs.len(), 2);
        assert_eq!(sigs[0].name, "template");
        assert_eq!(sigs[0].arity(), 0);
        assert_eq!(sigs[1].name, "fill");
        assert_eq!(sigs[1].arity(), 1);
    }

    #[test]
    fn test_unsized_value() {
        let kind = ParamKind::Value {
            ty: ty::Bool,
            lanes: 1,
        };
        assert_eq!(kind.value_size(), None);
        assert_eq!(ParamKind::Opaque.value_size(), None);
    }

    #[test]
    fn test_parse_opaque_and_comments() {
        let src = "// __kernel void commented(int x)\n\
                   __kernel void blur(read_only image2d_t src, Params p) {}";
        let sigs = parse_signatures(src).unwrap();
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].params[0].kind, ParamKind::Opaque);
        assert_eq!(sigs[0].params[1].kind, ParamKind::Opaque);
    }

    #[test]
    fn test_parse_errors() {
        let e = parse_signatures("\n__kernel int f(int a) {}").unwrap_err();
        assert_eq!(e.line, 2);
        assert!(e.message.contains("must return void"));

        let e = parse_signatures("__kernel void f(__global int* a, ) {}").unwrap_err();
        assert!(e.message.contains("parameter 1"));

        assert!(parse_signatures("__kernel void f(int a").is_err());
    }
}
