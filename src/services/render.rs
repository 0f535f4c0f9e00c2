// 输出渲染
// JSON（默认）或 known_hosts 行

use anyhow::{Context, Result};

use super::invocation::InvocationOutput;

/// JSON 输出
pub fn render_json(output: &InvocationOutput, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(output)
    } else {
        serde_json::to_string(output)
    };
    rendered.context("无法序列化扫描结果")
}

/// known_hosts 输出，失败的算法以注释行列出
pub fn render_known_hosts(output: &InvocationOutput) -> String {
    let result = output.result();
    let mut lines = result.known_hosts_lines();
    lines.extend(
        result
            .warnings()
            .iter()
            .map(|warning| format!("# {}", warning.message())),
    );

    let mut rendered = lines.join("\n");
    if !rendered.is_empty() {
        rendered.push('\n');
    }
    rendered
}
