//! 测试辅助宏
//!
//! `test_case!` 定义一个测试用例，`kassert!` 判断条件并在失败时记录断言位置。
//! 失败的断言以 panic 的形式交给测试框架报告。

use core::fmt;

#[derive(Copy, Clone, Debug)]
pub struct FailedAssertion {
    pub cond: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl FailedAssertion {
    pub const fn new(cond: &'static str, file: &'static str, line: u32) -> Self {
        Self { cond, file, line }
    }
}

impl fmt::Display for FailedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kassert failed: `{}` at {}:{}", self.cond, self.file, self.line)
    }
}

/// 记录一个失败的断言并中止当前测试。
///
/// 此函数是 `kassert!` 宏的后端。
#[track_caller]
pub fn record_failed_assertion(assertion: FailedAssertion) -> ! {
    panic!("{}", assertion);
}

/// 判断条件是否为真，如果为假则记录一个失败的断言。
#[macro_export]
macro_rules! kassert {
    ($cond:expr) => {{
        if !$cond {
            // 在安全上下文中先构造值，避免重复展开 metavariables
            let fa = $crate::testing::FailedAssertion::new(stringify!($cond), file!(), line!());
            $crate::testing::record_failed_assertion(fa);
        }
    }};
}

/// 定义一个标准的测试用例。
///
/// 语法：`test_case!(test_name, { code });`
#[macro_export]
macro_rules! test_case {
    ($func_name:ident, $body:block) => {
        #[doc = concat!("Test case: ", stringify!($func_name))]
        #[test]
        fn $func_name() {
            $body
        }
    };
}
