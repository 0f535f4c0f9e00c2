// 服务模块

pub mod invocation;
pub mod render;
pub mod storage;

pub use invocation::{invoke, InvocationInput, InvocationOutput};
