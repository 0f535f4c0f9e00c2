// 数据模型模块

pub mod scan;
pub mod settings;

pub use scan::{HostKeyRecord, ScanResult, ScanTarget, ScanWarning};
pub use settings::ScanSettings;
