// 该文件是 Shiliang （食量） 项目的一部分。
// src/output.rs - 检测结果输出
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

use std::{io::Write, path::PathBuf};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::{DetectResult, Detection, StageTimings},
};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 写入 JSON 文件的一次检测记录
#[derive(Debug, Serialize)]
pub struct DetectionRecord<'a> {
  pub created_at: String,
  pub image_width: u32,
  pub image_height: u32,
  pub candidates_before_nms: usize,
  pub timings: StageTimings,
  pub detections: &'a [Detection],
}

impl<'a> DetectionRecord<'a> {
  pub fn new(frame: &RgbFrame, result: &'a DetectResult) -> Self {
    Self {
      created_at: Utc::now().to_rfc3339(),
      image_width: frame.width(),
      image_height: frame.height(),
      candidates_before_nms: result.candidates_before_nms,
      timings: result.timings,
      detections: &result.items,
    }
  }
}

enum RecordTarget {
  File(PathBuf),
  Stdout,
}

/// `json:///path/to/record.json` 写文件，`json:-` 写标准输出
pub struct JsonRecordOutput {
  target: RecordTarget,
  pretty: bool,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let target = match url.path() {
      "" | "-" => RecordTarget::Stdout,
      path => RecordTarget::File(PathBuf::from(path)),
    };
    let pretty = url.query_pairs().any(|(k, _)| k == "pretty");

    Ok(JsonRecordOutput { target, pretty })
  }
}

impl JsonRecordOutput {
  pub fn to_file(path: impl Into<PathBuf>) -> Self {
    Self {
      target: RecordTarget::File(path.into()),
      pretty: false,
    }
  }

  pub fn pretty(mut self, pretty: bool) -> Self {
    self.pretty = pretty;
    self
  }

  fn serialize(&self, record: &DetectionRecord) -> Result<Vec<u8>, OutputError> {
    let mut bytes = if self.pretty {
      serde_json::to_vec_pretty(record)?
    } else {
      serde_json::to_vec(record)?
    };
    bytes.push(b'\n');
    Ok(bytes)
  }
}

impl Render<RgbFrame, DetectResult> for JsonRecordOutput {
  type Error = OutputError;

  fn render_result(&self, frame: &RgbFrame, result: &DetectResult) -> Result<(), Self::Error> {
    let bytes = self.serialize(&DetectionRecord::new(frame, result))?;

    match &self.target {
      RecordTarget::File(path) => {
        if let Some(parent) = path.parent()
          && !parent.as_os_str().is_empty()
        {
          std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        info!("保存检测记录到文件: {}", path.display());
      }
      RecordTarget::Stdout => {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&bytes)?;
        stdout.flush()?;
      }
    }

    Ok(())
  }
}
