// 该文件是 Shiliang （食量） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理引擎
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

use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::{Tensor, ValueType},
};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  decode::{BOX_ATTRIBUTES, DecodeError, OutputShape, RawOutput},
  frame::{NchwTensor, RGB_CHANNELS},
  model::InferenceEngine,
};

const ONNX_NUM_INPUTS: usize = 1;
const ONNX_MAX_INPUT_SIZE: i64 = 4096;

#[derive(Error, Debug)]
pub enum OnnxEngineError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("输出解码错误: {0}")]
  DecodeError(#[from] DecodeError),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

impl OnnxEngineError {
  fn invalid(msg: impl Into<String>) -> Self {
    let msg = msg.into();
    error!("{}", msg);
    OnnxEngineError::ModelInvalid(msg)
  }
}

pub struct OnnxEngineBuilder {
  model_path: String,
  intra_threads: Option<usize>,
}

impl FromUrlWithScheme for OnnxEngineBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxEngineBuilder {
  type Error = OnnxEngineError;

  /// `onnx:///path/to/model.onnx?threads=4`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxEngineError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let intra_threads = url
      .query_pairs()
      .find(|(k, _)| k == "threads")
      .map(|(_, v)| {
        v.parse::<usize>()
          .map_err(|_| OnnxEngineError::ModelPathError(format!("线程数无效: {}", v)))
      })
      .transpose()?;

    Ok(OnnxEngineBuilder {
      model_path: url.path().to_string(),
      intra_threads,
    })
  }
}

impl OnnxEngineBuilder {
  pub fn new(model_path: impl Into<String>) -> Self {
    Self {
      model_path: model_path.into(),
      intra_threads: None,
    }
  }

  pub fn intra_threads(mut self, threads: usize) -> Self {
    self.intra_threads = Some(threads);
    self
  }

  pub fn build(self) -> Result<OnnxEngine, OnnxEngineError> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 会话");
    let mut builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
    if let Some(threads) = self.intra_threads {
      builder = builder.with_intra_threads(threads)?;
    }
    let session = builder.commit_from_memory(&model_data)?;
    info!("模型加载完成");

    if session.inputs.len() != ONNX_NUM_INPUTS {
      return Err(OnnxEngineError::invalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        ONNX_NUM_INPUTS,
        session.inputs.len()
      )));
    }

    let input = &session.inputs[0];
    let input_dims = tensor_dims(&input.input_type)
      .ok_or_else(|| OnnxEngineError::invalid("模型输入不是张量"))?;
    let input_size = match input_dims.as_slice() {
      &[_, c, h, w] if c == RGB_CHANNELS as i64 && h == w && h > 0 && h <= ONNX_MAX_INPUT_SIZE => {
        h as u32
      }
      dims => {
        return Err(OnnxEngineError::invalid(format!(
          "预期输入形状为 [1, 3, S, S], 实际为 {:?}",
          dims
        )));
      }
    };

    let output = session
      .outputs
      .first()
      .ok_or_else(|| OnnxEngineError::invalid("模型没有输出"))?;
    let output_dims = tensor_dims(&output.output_type)
      .ok_or_else(|| OnnxEngineError::invalid("模型输出不是张量"))?;
    let output_shape = match output_dims.as_slice() {
      &[_, attributes, anchors] if attributes > BOX_ATTRIBUTES as i64 && anchors > 0 => {
        OutputShape {
          num_classes: attributes as usize - BOX_ATTRIBUTES,
          num_anchors: anchors as usize,
        }
      }
      dims => {
        return Err(OnnxEngineError::invalid(format!(
          "预期输出形状为 [1, 4 + C, A], 实际为 {:?}",
          dims
        )));
      }
    };

    let input_name = input.name.clone();
    let output_name = output.name.clone();

    debug!("模型输入: {} {:?}", input_name, input_dims);
    debug!("模型输出: {} {:?}", output_name, output_dims);
    info!(
      "输入尺寸 {}, 类别数量 {}, anchor 数量 {}",
      input_size, output_shape.num_classes, output_shape.num_anchors
    );

    Ok(OnnxEngine {
      session,
      input_size,
      output_shape,
      output_name,
    })
  }
}

fn tensor_dims(value_type: &ValueType) -> Option<Vec<i64>> {
  match value_type {
    ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
    _ => None,
  }
}

pub struct OnnxEngine {
  session: Session,
  input_size: u32,
  output_shape: OutputShape,
  output_name: String,
}

impl InferenceEngine for OnnxEngine {
  type Error = OnnxEngineError;

  fn input_size(&self) -> u32 {
    self.input_size
  }

  fn output_shape(&self) -> OutputShape {
    self.output_shape
  }

  fn infer(&mut self, input: &NchwTensor) -> Result<RawOutput, Self::Error> {
    debug!("设置模型输入 {:?}", input.shape());
    let tensor = Tensor::from_array((input.shape(), input.as_slice().to_vec()))?;

    debug!("执行模型推理");
    let outputs = self.session.run(ort::inputs![tensor])?;

    let output = outputs
      .get(self.output_name.as_str())
      .ok_or_else(|| OnnxEngineError::invalid(format!("缺少输出 {}", self.output_name)))?;
    let (shape, data) = output.try_extract_tensor::<f32>()?;

    let expected = [
      1,
      self.output_shape.num_attributes() as i64,
      self.output_shape.num_anchors as i64,
    ];
    if shape.iter().copied().ne(expected) {
      return Err(OnnxEngineError::invalid(format!(
        "输出形状 {:?} 与声明 {:?} 不一致",
        shape.iter().collect::<Vec<_>>(),
        expected
      )));
    }

    Ok(RawOutput::new(
      self.output_shape.num_classes,
      self.output_shape.num_anchors,
      data.to_vec(),
    )?)
  }
}
