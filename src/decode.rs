// 该文件是 Shiliang （食量） 项目的一部分。
// src/decode.rs - 原始输出张量解码
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

use thiserror::Error;
use tracing::debug;

use crate::{
  letterbox::LetterboxTransform,
  model::{CandidateBox, Rect},
};

/// 每个 anchor 前 4 行依次为 xc, yc, w, h
pub const BOX_ATTRIBUTES: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
  #[error("输出形状不匹配: {num_attributes}x{num_anchors} 需要 {expected} 个元素, 实际 {actual}")]
  ShapeMismatch {
    num_attributes: usize,
    num_anchors: usize,
    expected: usize,
    actual: usize,
  },
  #[error("类别数量必须大于 0")]
  NoClasses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputShape {
  pub num_classes: usize,
  pub num_anchors: usize,
}

impl OutputShape {
  pub fn num_attributes(&self) -> usize {
    BOX_ATTRIBUTES + self.num_classes
  }

  pub fn len(&self) -> usize {
    self.num_attributes() * self.num_anchors
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// 形状为 `[4 + C, A]` 的行优先连续缓冲区
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
  shape: OutputShape,
  data: Box<[f32]>,
}

impl RawOutput {
  pub fn new(num_classes: usize, num_anchors: usize, data: Vec<f32>) -> Result<Self, DecodeError> {
    if num_classes == 0 {
      return Err(DecodeError::NoClasses);
    }

    let shape = OutputShape {
      num_classes,
      num_anchors,
    };
    if data.len() != shape.len() {
      return Err(DecodeError::ShapeMismatch {
        num_attributes: shape.num_attributes(),
        num_anchors,
        expected: shape.len(),
        actual: data.len(),
      });
    }

    Ok(Self {
      shape,
      data: data.into_boxed_slice(),
    })
  }

  pub fn shape(&self) -> OutputShape {
    self.shape
  }

  pub fn num_classes(&self) -> usize {
    self.shape.num_classes
  }

  pub fn num_anchors(&self) -> usize {
    self.shape.num_anchors
  }

  #[inline]
  pub fn value_at(&self, row: usize, col: usize) -> f32 {
    self.data[row * self.shape.num_anchors + col]
  }

  /// 返回 anchor 的最高类别分数，并列时取编号最小的类别
  fn best_class(&self, anchor: usize) -> (usize, f32) {
    let mut class_id = 0usize;
    let mut max_score = f32::NEG_INFINITY;
    for c in 0..self.shape.num_classes {
      let score = self.value_at(BOX_ATTRIBUTES + c, anchor);
      if score > max_score {
        max_score = score;
        class_id = c;
      }
    }
    (class_id, max_score)
  }
}

/// 按 anchor 顺序解码出原图坐标下的候选框，不排序、不裁剪到图像边界
pub fn decode(
  raw: &RawOutput,
  transform: &LetterboxTransform,
  confidence_threshold: f32,
) -> Vec<CandidateBox> {
  let mut candidates = Vec::new();
  let mut non_finite = 0usize;

  for anchor in 0..raw.num_anchors() {
    let (class_id, max_score) = raw.best_class(anchor);

    // NaN 比较为 false，同样会被丢弃
    if !(max_score > confidence_threshold) {
      continue;
    }

    let xc = raw.value_at(0, anchor);
    let yc = raw.value_at(1, anchor);
    let w = raw.value_at(2, anchor);
    let h = raw.value_at(3, anchor);

    let (orig_x, orig_y) = transform.to_original(xc, yc);
    let rect = Rect::from_center(
      orig_x,
      orig_y,
      transform.length_to_original(w),
      transform.length_to_original(h),
    );

    if !rect.is_finite() {
      non_finite += 1;
      continue;
    }

    candidates.push(CandidateBox {
      class_id,
      confidence: max_score,
      rect,
    });
  }

  if non_finite > 0 {
    debug!("丢弃 {} 个坐标非有限值的 anchor", non_finite);
  }
  debug!(
    "解码 {} 个 anchor, 得到 {} 个候选框",
    raw.num_anchors(),
    candidates.len()
  );

  candidates
}

#[cfg(test)]
mod tests {
  use super::*;

  /// 按 anchor 给出 [xc, yc, w, h, score...]，转置成 `[4 + C, A]`
  fn raw_from_anchors(num_classes: usize, anchors: &[&[f32]]) -> RawOutput {
    let rows = BOX_ATTRIBUTES + num_classes;
    let mut data = vec![0.0; rows * anchors.len()];
    for (col, anchor) in anchors.iter().enumerate() {
      for (row, &value) in anchor.iter().enumerate() {
        data[row * anchors.len() + col] = value;
      }
    }
    RawOutput::new(num_classes, anchors.len(), data).unwrap()
  }

  #[test]
  fn rejects_mismatched_buffer() {
    assert_eq!(
      RawOutput::new(1, 2, vec![0.0; 9]),
      Err(DecodeError::ShapeMismatch {
        num_attributes: 5,
        num_anchors: 2,
        expected: 10,
        actual: 9
      })
    );
    assert_eq!(RawOutput::new(0, 2, vec![0.0; 8]), Err(DecodeError::NoClasses));
  }

  #[test]
  fn value_at_uses_row_stride() {
    let raw = RawOutput::new(1, 3, (0..15).map(|v| v as f32).collect()).unwrap();
    assert_eq!(raw.value_at(0, 2), 2.0);
    assert_eq!(raw.value_at(4, 1), 13.0);
  }

  #[test]
  fn picks_highest_class_and_lowest_id_on_tie() {
    let raw = raw_from_anchors(
      3,
      &[
        &[10.0, 10.0, 4.0, 4.0, 0.2, 0.7, 0.5],
        &[20.0, 20.0, 4.0, 4.0, 0.6, 0.3, 0.6],
      ],
    );
    let candidates = decode(&raw, &LetterboxTransform::identity(640), 0.25);

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].class_id, 1);
    assert_eq!(candidates[0].confidence, 0.7);
    assert_eq!(candidates[1].class_id, 0);
    assert_eq!(candidates[1].confidence, 0.6);
  }

  #[test]
  fn threshold_is_strict() {
    let threshold = 0.25f32;
    let above = f32::from_bits(threshold.to_bits() + 1);
    let raw = raw_from_anchors(
      1,
      &[&[10.0, 10.0, 4.0, 4.0, threshold], &[30.0, 30.0, 4.0, 4.0, above]],
    );
    let candidates = decode(&raw, &LetterboxTransform::identity(640), threshold);

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].confidence, above);
    assert_eq!(candidates[0].rect, Rect::new(28.0, 28.0, 32.0, 32.0));
  }

  #[test]
  fn undoes_padding_then_scale() {
    let transform = LetterboxTransform::compute(1280, 720, 640).unwrap();
    let raw = raw_from_anchors(1, &[&[320.0, 300.0, 100.0, 60.0, 0.9]]);
    let candidates = decode(&raw, &transform, 0.25);

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].rect, Rect::new(540.0, 260.0, 740.0, 380.0));
  }

  #[test]
  fn boxes_are_not_clamped_to_image() {
    let transform = LetterboxTransform::compute(1280, 720, 640).unwrap();
    let raw = raw_from_anchors(1, &[&[0.0, 140.0, 40.0, 40.0, 0.9]]);
    let rect = decode(&raw, &transform, 0.25)[0].rect;

    assert_eq!(rect, Rect::new(-40.0, -40.0, 40.0, 40.0));
  }

  #[test]
  fn negative_size_yields_degenerate_box() {
    let raw = raw_from_anchors(1, &[&[50.0, 50.0, -10.0, 10.0, 0.9]]);
    let rect = decode(&raw, &LetterboxTransform::identity(640), 0.25)[0].rect;

    assert!(rect.right < rect.left);
    assert_eq!(rect.area(), 0.0);
  }

  #[test]
  fn non_finite_scores_and_boxes_are_dropped() {
    let raw = raw_from_anchors(
      1,
      &[
        &[10.0, 10.0, 4.0, 4.0, f32::NAN],
        &[f32::NAN, 10.0, 4.0, 4.0, 0.9],
        &[10.0, f32::INFINITY, 4.0, 4.0, 0.9],
        &[10.0, 10.0, 4.0, 4.0, 0.9],
      ],
    );
    let candidates = decode(&raw, &LetterboxTransform::identity(640), 0.25);

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].rect, Rect::new(8.0, 8.0, 12.0, 12.0));
  }

  #[test]
  fn keeps_anchor_scan_order() {
    let raw = raw_from_anchors(
      1,
      &[
        &[10.0, 10.0, 4.0, 4.0, 0.3],
        &[20.0, 20.0, 4.0, 4.0, 0.9],
        &[30.0, 30.0, 4.0, 4.0, 0.5],
      ],
    );
    let confidences = decode(&raw, &LetterboxTransform::identity(640), 0.25)
      .iter()
      .map(|c| c.confidence)
      .collect::<Vec<_>>();

    assert_eq!(confidences, vec![0.3, 0.9, 0.5]);
  }
}
