use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::{Captures, Regex};

/// 形如 `<!-- $name -->` 的占位符
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*\$(\w+)\s*-->").expect("invalid placeholder regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// 覆盖已经设置的值
    Replace,
    /// 追加到已经设置的值之后
    Append,
}

/// 支持变量占位符的 Markdown 文档。
///
/// 设置变量只修改内存中的变量表，`render` 不改变任何状态，可以重复调用；
/// 只有 `save` 才会写入磁盘。没有设置过的占位符会原样保留。
#[derive(Debug, Clone)]
pub struct MarkdownTemplate {
    text: String,
    variables: BTreeMap<String, Option<String>>,
}

impl MarkdownTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let variables = PLACEHOLDER
            .captures_iter(&text)
            .map(|caps| (caps[1].to_owned(), None))
            .collect();
        Self { text, variables }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("failed to read template {}", path.display()))?;
        Ok(Self::new(text))
    }

    pub fn set(&mut self, name: &str, value: impl AsRef<str>, mode: WriteMode) -> Result<()> {
        let Some(slot) = self.variables.get_mut(name) else {
            bail!("variable '{name}' not found in template");
        };
        match (mode, slot.as_mut()) {
            (WriteMode::Append, Some(current)) => current.push_str(value.as_ref()),
            _ => *slot = Some(value.as_ref().to_owned()),
        }
        Ok(())
    }

    /// 依次追加多行
    pub fn extend<I, S>(&mut self, name: &str, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.set(name, line, WriteMode::Append)?;
        }
        // 即使没有任何一行，也要把占位符替换为空
        if self.variables.get(name).is_some_and(Option::is_none) {
            self.set(name, "", WriteMode::Replace)?;
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        PLACEHOLDER
            .replace_all(&self.text, |caps: &Captures| match self.variables.get(&caps[1]) {
                Some(Some(value)) => value.clone(),
                _ => caps[0].to_owned(),
            })
            .into_owned()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render()).with_context(|| format!("failed to write {}", path.display()))
    }
}
