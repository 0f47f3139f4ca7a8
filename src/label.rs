// 该文件是 Shiliang （食量） 项目的一部分。
// src/label.rs - 类别标签表
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Shiliang Developers

use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

/// 越界类别编号解析到的标签
pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("无法读取标签文件 {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// 按类别编号排列的标签表，由外部提供，长度可以小于模型类别数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelList {
  labels: Box<[String]>,
}

impl LabelList {
  /// 第 N 行对应类别 N，去掉首尾空白；中间的空行占位，末尾的空行忽略
  pub fn parse(text: &str) -> Self {
    let mut labels = text.lines().map(str::trim).collect::<Vec<_>>();
    while labels.last().is_some_and(|line| line.is_empty()) {
      labels.pop();
    }
    labels.into_iter().collect()
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let labels = Self::parse(&text);
    debug!("从 {} 读取 {} 个标签", path.display(), labels.len());
    Ok(labels)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn resolve(&self, class_id: usize) -> &str {
    self
      .labels
      .get(class_id)
      .map(String::as_str)
      .filter(|label| !label.is_empty())
      .unwrap_or(UNKNOWN_LABEL)
  }

  /// 标签表短于模型类别数时给出提示，越界编号仍解析为 `unknown`
  pub fn check_coverage(&self, num_classes: usize) {
    if self.len() < num_classes {
      warn!(
        "标签表只有 {} 项, 模型有 {} 个类别, 其余类别将显示为 {}",
        self.len(),
        num_classes,
        UNKNOWN_LABEL
      );
    }
  }
}

impl<S: Into<String>> FromIterator<S> for LabelList {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self {
      labels: iter.into_iter().map(Into::into).collect(),
    }
  }
}
