// 该文件是 Shiliang （食量） 项目的一部分。
// src/frame.rs - RGB 帧与 NCHW 张量定义
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

use image::{ImageBuffer, Rgb, RgbImage};
use thiserror::Error;

pub const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("画布必须为方形: {width}x{height}")]
  NotSquare { width: u32, height: u32 },
}

/// 按行优先、RGB 交错排列的 8 位图像（NHWC，N = 1）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl RgbFrame {
  pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = RGB_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  /// 以单一颜色填充的帧，用作 letterbox 画布
  pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
    let data = color
      .iter()
      .copied()
      .cycle()
      .take(RGB_CHANNELS * width as usize * height as usize)
      .collect::<Vec<_>>();

    Self {
      width,
      height,
      data: data.into_boxed_slice(),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
    let idx = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  /// 将 `src` 整块复制到 (`left`, `top`) 处，超出画布的部分被裁掉
  pub fn blit(&mut self, src: &RgbFrame, left: u32, top: u32) {
    if left >= self.width || top >= self.height {
      return;
    }

    let copy_w = src.width.min(self.width - left) as usize;
    let copy_h = src.height.min(self.height - top) as usize;
    let row_bytes = copy_w * RGB_CHANNELS;

    for y in 0..copy_h {
      let src_offset = y * src.width as usize * RGB_CHANNELS;
      let dst_offset = ((y + top as usize) * self.width as usize + left as usize) * RGB_CHANNELS;
      self.data[dst_offset..dst_offset + row_bytes]
        .copy_from_slice(&src.data[src_offset..src_offset + row_bytes]);
    }
  }

  /// 借用底层缓冲区的 `image` 视图，不复制像素
  pub fn as_image_view(&self) -> ImageBuffer<Rgb<u8>, &[u8]> {
    // new() 已校验长度，from_raw 不会失败
    ImageBuffer::from_raw(self.width, self.height, &self.data[..])
      .unwrap_or_else(|| unreachable!("RgbFrame 长度与尺寸不一致"))
  }
}

impl AsRef<[u8]> for RgbFrame {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

impl AsMut<[u8]> for RgbFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl From<RgbImage> for RgbFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

impl From<RgbFrame> for RgbImage {
  fn from(frame: RgbFrame) -> Self {
    ImageBuffer::from_raw(frame.width, frame.height, frame.data.into_vec())
      .unwrap_or_else(|| unreachable!("RgbFrame 长度与尺寸不一致"))
  }
}

/// 平面排列的归一化浮点张量，形状为 `[1, 3, S, S]`
#[derive(Debug, Clone, PartialEq)]
pub struct NchwTensor {
  size: usize,
  data: Box<[f32]>,
}

impl NchwTensor {
  pub fn new(size: usize, data: Vec<f32>) -> Result<Self, FrameError> {
    let expected = RGB_CHANNELS * size * size;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      size,
      data: data.into_boxed_slice(),
    })
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.size, self.size]
  }

  pub fn plane(&self, channel: usize) -> &[f32] {
    let plane = self.size * self.size;
    &self.data[channel * plane..(channel + 1) * plane]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn into_vec(self) -> Vec<f32> {
    self.data.into_vec()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_wrong_length() {
    let err = RgbFrame::new(2, 2, vec![0; 11]).unwrap_err();
    assert_eq!(
      err,
      FrameError::LengthMismatch {
        expected: 12,
        actual: 11
      }
    );
  }

  #[test]
  fn zero_sized_frame_is_empty() {
    let frame = RgbFrame::new(0, 10, Vec::new()).unwrap();
    assert!(frame.is_empty());
  }

  #[test]
  fn filled_repeats_color() {
    let frame = RgbFrame::filled(3, 2, [114, 114, 114]);
    assert_eq!(frame.as_ref().len(), 18);
    assert!(frame.as_ref().iter().all(|&v| v == 114));
  }

  #[test]
  fn blit_copies_at_offset_and_clips() {
    let mut canvas = RgbFrame::filled(4, 4, [0, 0, 0]);
    let patch = RgbFrame::filled(3, 3, [9, 8, 7]);
    canvas.blit(&patch, 2, 1);

    assert_eq!(canvas.pixel(1, 1), [0, 0, 0]);
    assert_eq!(canvas.pixel(2, 1), [9, 8, 7]);
    assert_eq!(canvas.pixel(3, 3), [9, 8, 7]);
    assert_eq!(canvas.pixel(3, 0), [0, 0, 0]);
  }

  #[test]
  fn converts_to_and_from_rgb_image() {
    let image = RgbImage::from_fn(2, 1, |x, _| Rgb([x as u8, 1, 2]));
    let frame = RgbFrame::from(image.clone());
    assert_eq!(frame.pixel(1, 0), [1, 1, 2]);
    assert_eq!(RgbImage::from(frame), image);
  }

  #[test]
  fn tensor_planes_are_contiguous() {
    let data = (0..12).map(|v| v as f32).collect::<Vec<_>>();
    let tensor = NchwTensor::new(2, data).unwrap();
    assert_eq!(tensor.shape(), [1, 3, 2, 2]);
    assert_eq!(tensor.plane(1), &[4.0, 5.0, 6.0, 7.0]);
  }
}
