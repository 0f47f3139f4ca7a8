// 该文件是 Shiliang （食量） 项目的一部分。
// src/model.rs - 检测结果类型与推理引擎接口
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

use serde::Serialize;

use crate::{
  decode::{OutputShape, RawOutput},
  frame::NchwTensor,
};

/// 轴对齐矩形，[left, top, right, bottom]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

impl Rect {
  pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
    }
  }

  pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
    Self {
      left: cx - width / 2.0,
      top: cy - height / 2.0,
      right: cx + width / 2.0,
      bottom: cy + height / 2.0,
    }
  }

  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }

  /// 退化矩形（宽或高不为正）面积为 0
  pub fn area(&self) -> f32 {
    self.width().max(0.0) * self.height().max(0.0)
  }

  pub fn is_finite(&self) -> bool {
    self.left.is_finite() && self.top.is_finite() && self.right.is_finite() && self.bottom.is_finite()
  }
}

/// 阈值过滤后、NMS 之前的候选框，坐标位于原图空间
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateBox {
  pub class_id: usize,
  pub confidence: f32,
  pub rect: Rect,
}

/// NMS 之后交给调用方的检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  pub class_id: usize,
  pub label: String,
  pub confidence: f32,
  pub rect: Rect,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTimings {
  pub preprocess_ms: f64,
  pub inference_ms: f64,
  pub postprocess_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectResult {
  /// 按置信度降序排列
  pub items: Box<[Detection]>,
  /// NMS 之前的候选数量
  pub candidates_before_nms: usize,
  pub timings: StageTimings,
}

impl DetectResult {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

/// 不透明的推理引擎：输入 `[1, 3, S, S]`，输出 `[1, 4 + C, A]`
///
/// `infer` 需要 `&mut self`，同一个引擎实例同一时刻只服务一次推理；
/// 需要并发时请为每个线程准备一个实例。
pub trait InferenceEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 模型输入边长 S
  fn input_size(&self) -> u32;

  /// 加载时从模型声明的输出形状中读取
  fn output_shape(&self) -> OutputShape;

  fn infer(&mut self, input: &NchwTensor) -> Result<RawOutput, Self::Error>;
}

/// 引擎初始化可能失败，用和类型代替可空句柄
#[derive(Debug)]
pub enum EngineState<E> {
  Ready(E),
  Unavailable,
}

impl<E> EngineState<E> {
  pub fn is_ready(&self) -> bool {
    matches!(self, EngineState::Ready(_))
  }

  /// 释放引擎，之后的推理都会返回空结果
  pub fn dispose(&mut self) -> Option<E> {
    match std::mem::replace(self, EngineState::Unavailable) {
      EngineState::Ready(engine) => Some(engine),
      EngineState::Unavailable => None,
    }
  }
}

impl<E, Err> From<Result<E, Err>> for EngineState<E>
where
  Err: std::fmt::Display,
{
  fn from(result: Result<E, Err>) -> Self {
    match result {
      Ok(engine) => EngineState::Ready(engine),
      Err(e) => {
        tracing::error!("推理引擎不可用: {}", e);
        EngineState::Unavailable
      }
    }
  }
}

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxEngine, OnnxEngineBuilder, OnnxEngineError};
