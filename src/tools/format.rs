use crate::tools::tool::ToolOutput;

/// 将工具输出渲染为结果消息文本
pub fn render_output(label: &str, output: &ToolOutput) -> String {
    match output {
        ToolOutput::Sections(entries) => entries
            .iter()
            .map(|(key, value)| fenced(key, value))
            .collect::<Vec<_>>()
            .join("\n"),
        ToolOutput::Pair(stdout, stderr) => {
            fenced(&format!("{label} Tool Output"), &format!("({stdout:?}, {stderr:?})"))
        }
        ToolOutput::Text(text) => fenced(&format!("{label} Tool Output"), text),
    }
}

fn fenced(heading: &str, body: &str) -> String {
    format!("{heading}:\n```\n{body}\n```")
}
