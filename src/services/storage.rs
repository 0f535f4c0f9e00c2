// 本地设置持久化服务

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::ScanSettings;

/// 获取配置目录路径
/// macOS: ~/Library/Application Support/ssh-keyscan
/// Linux: ~/.config/ssh-keyscan
/// Windows: C:\Users\<用户名>\AppData\Roaming\ssh-keyscan
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("无法获取系统配置目录")?
        .join("ssh-keyscan"))
}

/// 获取设置配置文件路径
pub fn get_settings_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("settings.json"))
}

/// 加载扫描设置
///
/// 指定路径时文件必须存在；默认路径不存在时返回默认设置
pub fn load_settings(path: Option<&Path>) -> Result<ScanSettings> {
    match path {
        Some(path) => read_settings(path),
        None => {
            let path = get_settings_file()?;
            if !path.exists() {
                return Ok(ScanSettings::default());
            }
            read_settings(&path)
        }
    }
}

fn read_settings(path: &Path) -> Result<ScanSettings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("无法读取设置配置文件: {}", path.display()))?;
    let settings: ScanSettings = serde_json::from_str(&content)
        .with_context(|| format!("无法解析设置配置文件: {}", path.display()))?;
    Ok(settings)
}

/// 保存扫描设置，返回写入的路径
pub fn save_settings(settings: &ScanSettings, path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => get_settings_file()?,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).context("无法创建配置目录")?;
        }
    }
    let content = serde_json::to_string_pretty(settings).context("无法序列化设置配置")?;
    fs::write(&path, content).context("无法写入设置配置文件")?;
    Ok(path)
}
