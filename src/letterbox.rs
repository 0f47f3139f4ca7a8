// 该文件是 Shiliang （食量） 项目的一部分。
// src/letterbox.rs - 保持宽高比的 letterbox 缩放
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

use image::imageops::{self, FilterType};
use thiserror::Error;
use tracing::debug;

use crate::frame::RgbFrame;

/// 默认的灰色填充值
pub const LETTERBOX_PAD_VALUE: u8 = 114;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LetterboxError {
  #[error("图像尺寸无效: {width}x{height}")]
  ZeroArea { width: u32, height: u32 },
  #[error("目标尺寸无效: {0}")]
  ZeroTarget(u32),
}

/// 原图坐标与模型输入坐标之间的缩放与平移参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
  pub target_size: u32,
  pub new_width: u32,
  pub new_height: u32,
}

impl LetterboxTransform {
  /// 计算把 `width`x`height` 的图像放进 `target_size` 方形画布所需的参数
  pub fn compute(width: u32, height: u32, target_size: u32) -> Result<Self, LetterboxError> {
    if width == 0 || height == 0 {
      return Err(LetterboxError::ZeroArea { width, height });
    }
    if target_size == 0 {
      return Err(LetterboxError::ZeroTarget(target_size));
    }

    let target = target_size as f64;
    let scale = (target / width as f64).min(target / height as f64);

    // 四舍五入可能越过画布，夹到 [1, S]
    let new_width = ((width as f64 * scale).round() as u32).clamp(1, target_size);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, target_size);

    Ok(Self {
      scale: scale as f32,
      pad_x: (target_size - new_width) as f32 / 2.0,
      pad_y: (target_size - new_height) as f32 / 2.0,
      target_size,
      new_width,
      new_height,
    })
  }

  /// 不做缩放和填充的变换，模型空间即原图空间
  pub fn identity(target_size: u32) -> Self {
    Self {
      scale: 1.0,
      pad_x: 0.0,
      pad_y: 0.0,
      target_size,
      new_width: target_size,
      new_height: target_size,
    }
  }

  /// 模型空间中的点映射回原图
  pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
    ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
  }

  /// 原图中的点映射到模型空间
  pub fn to_model(&self, x: f32, y: f32) -> (f32, f32) {
    (x * self.scale + self.pad_x, y * self.scale + self.pad_y)
  }

  pub fn length_to_original(&self, length: f32) -> f32 {
    length / self.scale
  }

  pub fn length_to_model(&self, length: f32) -> f32 {
    length * self.scale
  }

  /// 缩放后图像在画布上的像素偏移
  pub fn offset(&self) -> (u32, u32) {
    (self.pad_x.floor() as u32, self.pad_y.floor() as u32)
  }
}

/// 生成 `target_size`x`target_size` 的画布，原图居中，四周用 `pad_value` 灰色填充
pub fn letterbox(
  frame: &RgbFrame,
  target_size: u32,
  pad_value: u8,
) -> Result<(RgbFrame, LetterboxTransform), LetterboxError> {
  let transform = LetterboxTransform::compute(frame.width(), frame.height(), target_size)?;

  debug!(
    "letterbox: {}x{} -> {}x{}, 缩放 {:.4}, 填充 ({:.1}, {:.1})",
    frame.width(),
    frame.height(),
    transform.new_width,
    transform.new_height,
    transform.scale,
    transform.pad_x,
    transform.pad_y
  );

  let mut canvas = RgbFrame::filled(target_size, target_size, [pad_value; 3]);
  let (left, top) = transform.offset();

  if transform.new_width == frame.width() && transform.new_height == frame.height() {
    canvas.blit(frame, left, top);
  } else {
    let resized = imageops::resize(
      &frame.as_image_view(),
      transform.new_width,
      transform.new_height,
      FilterType::Triangle,
    );
    canvas.blit(&RgbFrame::from(resized), left, top);
  }

  Ok((canvas, transform))
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  #[test]
  fn wide_image_is_padded_vertically() {
    let t = LetterboxTransform::compute(1280, 720, 640).unwrap();
    assert_eq!(t.scale, 0.5);
    assert_eq!(t.new_width, 640);
    assert_eq!(t.new_height, 360);
    assert_eq!(t.pad_x, 0.0);
    assert_eq!(t.pad_y, 140.0);
  }

  #[test]
  fn tall_image_is_padded_horizontally() {
    let t = LetterboxTransform::compute(300, 600, 640).unwrap();
    assert!((t.scale - 640.0 / 600.0).abs() < 1e-6);
    assert_eq!(t.new_width, 320);
    assert_eq!(t.new_height, 640);
    assert_eq!(t.pad_x, 160.0);
    assert_eq!(t.pad_y, 0.0);
  }

  #[test]
  fn odd_padding_keeps_fraction() {
    let t = LetterboxTransform::compute(640, 639, 640).unwrap();
    assert_eq!(t.new_height, 639);
    assert_eq!(t.pad_y, 0.5);
    assert_eq!(t.offset(), (0, 0));
  }

  #[test]
  fn zero_area_is_rejected() {
    assert_eq!(
      LetterboxTransform::compute(0, 10, 640),
      Err(LetterboxError::ZeroArea {
        width: 0,
        height: 10
      })
    );
    assert!(LetterboxTransform::compute(10, 10, 0).is_err());
  }

  #[test]
  fn canvas_is_centered_with_gray_border() {
    let frame = RgbFrame::filled(8, 4, [200, 10, 30]);
    let (canvas, t) = letterbox(&frame, 8, LETTERBOX_PAD_VALUE).unwrap();

    assert_eq!((canvas.width(), canvas.height()), (8, 8));
    assert_eq!((t.pad_x, t.pad_y), (0.0, 2.0));
    assert_eq!(canvas.pixel(0, 0), [114, 114, 114]);
    assert_eq!(canvas.pixel(7, 1), [114, 114, 114]);
    assert_eq!(canvas.pixel(0, 2), [200, 10, 30]);
    assert_eq!(canvas.pixel(7, 5), [200, 10, 30]);
    assert_eq!(canvas.pixel(3, 6), [114, 114, 114]);
  }

  #[test]
  fn downscaled_canvas_keeps_uniform_color() {
    let frame = RgbFrame::filled(64, 32, [50, 60, 70]);
    let (canvas, t) = letterbox(&frame, 16, 0).unwrap();

    assert_eq!((t.new_width, t.new_height), (16, 8));
    assert_eq!(canvas.pixel(8, 8), [50, 60, 70]);
    assert_eq!(canvas.pixel(8, 1), [0, 0, 0]);
  }

  #[test]
  fn model_to_original_round_trip() {
    let t = LetterboxTransform::compute(1280, 720, 640).unwrap();
    let (xc, yc, w, h) = (320.0_f32, 300.0_f32, 100.0_f32, 60.0_f32);

    let (ox, oy) = t.to_original(xc, yc);
    let (ow, oh) = (t.length_to_original(w), t.length_to_original(h));
    assert_eq!((ox, oy), (640.0, 320.0));

    let (mx, my) = t.to_model(ox, oy);
    assert!((mx - xc).abs() < 1e-3 && (my - yc).abs() < 1e-3);
    assert!((t.length_to_model(ow) - w).abs() < 1e-3);
    assert!((t.length_to_model(oh) - h).abs() < 1e-3);
  }

  proptest! {
    #[test]
    fn resized_image_always_fits(w in 1u32..5000, h in 1u32..5000, s in 1u32..1280) {
      let t = LetterboxTransform::compute(w, h, s).unwrap();
      prop_assert!(t.new_width <= s);
      prop_assert!(t.new_height <= s);
      prop_assert!(t.new_width == s || t.new_height == s);
      prop_assert!(t.pad_x >= 0.0 && t.pad_y >= 0.0);
      prop_assert!(t.scale > 0.0);
    }

    #[test]
    fn inverse_then_forward_recovers_model_point(
      w in 1u32..4000,
      h in 1u32..4000,
      x in 0.0f32..640.0,
      y in 0.0f32..640.0,
    ) {
      let t = LetterboxTransform::compute(w, h, 640).unwrap();
      let (ox, oy) = t.to_original(x, y);
      let (mx, my) = t.to_model(ox, oy);
      prop_assert!((mx - x).abs() < 1e-2);
      prop_assert!((my - y).abs() < 1e-2);
    }
  }
}
