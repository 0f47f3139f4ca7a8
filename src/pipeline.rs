// 该文件是 Shiliang （食量） 项目的一部分。
// src/pipeline.rs - 检测流水线
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

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  decode::{RawOutput, decode},
  frame::{FrameError, RgbFrame},
  label::LabelList,
  letterbox::{LETTERBOX_PAD_VALUE, LetterboxError, LetterboxTransform, letterbox},
  model::{DetectResult, Detection, EngineState, InferenceEngine, StageTimings},
  nms::{NmsMode, non_max_suppression},
  tensor::encode_planar,
};

pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PipelineError {
  #[error("图像无效: {width}x{height}")]
  InvalidImage { width: u32, height: u32 },
  #[error("模型输入尺寸无效: {0}")]
  InvalidInputSize(u32),
  #[error("帧错误: {0}")]
  Frame(#[from] FrameError),
}

impl From<LetterboxError> for PipelineError {
  fn from(err: LetterboxError) -> Self {
    match err {
      LetterboxError::ZeroArea { width, height } => PipelineError::InvalidImage { width, height },
      LetterboxError::ZeroTarget(size) => PipelineError::InvalidInputSize(size),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
  /// 模型输入边长 S
  pub input_size: u32,
  /// 类别分数必须严格大于该值
  pub confidence_threshold: f32,
  /// IoU 严格大于该值的框被抑制
  pub iou_threshold: f32,
  pub nms_mode: NmsMode,
  pub pad_value: u8,
  pub max_detections: Option<usize>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      input_size: DEFAULT_INPUT_SIZE,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      nms_mode: NmsMode::ClassAgnostic,
      pad_value: LETTERBOX_PAD_VALUE,
      max_detections: None,
    }
  }
}

impl PipelineConfig {
  pub fn with_input_size(mut self, input_size: u32) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn with_nms_mode(mut self, mode: NmsMode) -> Self {
    self.nms_mode = mode;
    self
  }

  pub fn with_pad_value(mut self, pad_value: u8) -> Self {
    self.pad_value = pad_value;
    self
  }

  pub fn with_max_detections(mut self, max_detections: Option<usize>) -> Self {
    self.max_detections = max_detections;
    self
  }
}

/// 解码、NMS 与标签映射；返回检测结果和 NMS 前的候选数量
pub fn postprocess(
  raw: &RawOutput,
  transform: &LetterboxTransform,
  config: &PipelineConfig,
  labels: &LabelList,
) -> (Vec<Detection>, usize) {
  let candidates = decode(raw, transform, config.confidence_threshold);
  let candidates_before_nms = candidates.len();

  let mut kept = non_max_suppression(candidates, config.iou_threshold, config.nms_mode);
  if let Some(max) = config.max_detections
    && kept.len() > max
  {
    debug!("检测数量 {} 超过上限 {}, 截断", kept.len(), max);
    kept.truncate(max);
  }

  let detections = kept
    .into_iter()
    .map(|candidate| Detection {
      class_id: candidate.class_id,
      label: labels.resolve(candidate.class_id).to_string(),
      confidence: candidate.confidence,
      rect: candidate.rect,
    })
    .collect();

  (detections, candidates_before_nms)
}

/// letterbox → 编码 → 推理 → 解码 → NMS
///
/// 流水线独占自己的引擎，`detect` 需要 `&mut self`。
pub struct Pipeline<E> {
  config: PipelineConfig,
  engine: EngineState<E>,
  labels: LabelList,
}

impl<E: InferenceEngine> Pipeline<E> {
  pub fn new(config: PipelineConfig, engine: EngineState<E>, labels: LabelList) -> Self {
    if let EngineState::Ready(engine) = &engine {
      labels.check_coverage(engine.output_shape().num_classes);
      if engine.input_size() != config.input_size {
        warn!(
          "模型输入尺寸 {} 与配置 {} 不一致",
          engine.input_size(),
          config.input_size
        );
      }
    }

    Self {
      config,
      engine,
      labels,
    }
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn labels(&self) -> &LabelList {
    &self.labels
  }

  pub fn is_ready(&self) -> bool {
    self.engine.is_ready()
  }

  /// 释放引擎，之后的 `detect` 都返回空结果
  pub fn dispose(&mut self) -> Option<E> {
    self.engine.dispose()
  }

  /// 对一张图像运行完整流水线
  ///
  /// 零面积图像返回 `InvalidImage`。引擎不可用、推理失败或输出形状不符时
  /// 记录警告并返回空结果，而不是错误。
  pub fn detect(&mut self, frame: &RgbFrame) -> Result<DetectResult, PipelineError> {
    if frame.is_empty() {
      return Err(PipelineError::InvalidImage {
        width: frame.width(),
        height: frame.height(),
      });
    }

    let engine = match &mut self.engine {
      EngineState::Ready(engine) => engine,
      EngineState::Unavailable => {
        warn!("推理引擎不可用, 返回空结果");
        return Ok(DetectResult::empty());
      }
    };

    if engine.input_size() != self.config.input_size {
      warn!(
        "模型输入尺寸 {} 与配置 {} 不一致, 返回空结果",
        engine.input_size(),
        self.config.input_size
      );
      return Ok(DetectResult::empty());
    }

    let start = Instant::now();
    let (canvas, transform) = letterbox(frame, self.config.input_size, self.config.pad_value)?;
    let tensor = encode_planar(&canvas)?;
    let preprocess = start.elapsed();

    let start = Instant::now();
    let raw = match engine.infer(&tensor) {
      Ok(raw) => raw,
      Err(e) => {
        warn!("推理失败, 返回空结果: {}", e);
        return Ok(DetectResult::empty());
      }
    };
    let inference = start.elapsed();

    let declared = engine.output_shape();
    if raw.shape() != declared {
      warn!(
        "输出形状 {:?} 与模型声明 {:?} 不一致, 返回空结果",
        raw.shape(),
        declared
      );
      return Ok(DetectResult::empty());
    }

    let start = Instant::now();
    let (detections, candidates_before_nms) =
      postprocess(&raw, &transform, &self.config, &self.labels);
    let postprocess = start.elapsed();

    info!(
      "检测到 {} 个物体 (NMS 前 {} 个), 预处理 {:.2?}, 推理 {:.2?}, 后处理 {:.2?}",
      detections.len(),
      candidates_before_nms,
      preprocess,
      inference,
      postprocess
    );

    Ok(DetectResult {
      items: detections.into_boxed_slice(),
      candidates_before_nms,
      timings: StageTimings {
        preprocess_ms: preprocess.as_secs_f64() * 1000.0,
        inference_ms: inference.as_secs_f64() * 1000.0,
        postprocess_ms: postprocess.as_secs_f64() * 1000.0,
      },
    })
  }
}
