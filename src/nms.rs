// 该文件是 Shiliang （食量） 项目的一部分。
// src/nms.rs - 非极大值抑制
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

use tracing::debug;

use crate::model::{CandidateBox, Rect};

/// 抑制范围
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NmsMode {
  /// 不区分类别，任何重叠框都会互相抑制
  #[default]
  ClassAgnostic,
  /// 只有同一类别的框才会互相抑制
  PerClass,
}

/// 计算两个矩形的 IoU，结果位于 [0, 1]；并集为 0 时返回 0
pub fn iou(a: &Rect, b: &Rect) -> f32 {
  let inter_w = (a.right.min(b.right) - a.left.max(b.left)).max(0.0);
  let inter_h = (a.bottom.min(b.bottom) - a.top.max(b.top)).max(0.0);
  let intersection = inter_w * inter_h;
  let union = a.area() + b.area() - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 贪心 NMS：按置信度降序（稳定排序）依次保留，删除与已保留框 IoU 超过阈值的框
///
/// 返回结果保持置信度降序。
pub fn non_max_suppression(
  mut candidates: Vec<CandidateBox>,
  iou_threshold: f32,
  mode: NmsMode,
) -> Vec<CandidateBox> {
  candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut suppressed = vec![false; candidates.len()];
  let mut kept = Vec::new();

  for i in 0..candidates.len() {
    if suppressed[i] {
      continue;
    }
    let best = candidates[i];
    kept.push(best);

    for (j, other) in candidates.iter().enumerate().skip(i + 1) {
      if suppressed[j] {
        continue;
      }
      if mode == NmsMode::PerClass && other.class_id != best.class_id {
        continue;
      }
      if iou(&best.rect, &other.rect) > iou_threshold {
        suppressed[j] = true;
      }
    }
  }

  debug!("NMS: {} 个候选框保留 {} 个", candidates.len(), kept.len());

  kept
}
