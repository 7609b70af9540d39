//! 基础设施层
//!
//! 持有稀缺资源（HTTP 客户端、Cookie 容器），只暴露能力

pub mod cookie_jar;
pub mod http_executor;
pub mod retry;

pub use cookie_jar::{CookieRecord, SessionJar};
pub use http_executor::{HttpExecutor, HttpResponse};
pub use retry::{cancellable_sleep, with_retry, RetryPolicy};
