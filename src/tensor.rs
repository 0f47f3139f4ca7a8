// 该文件是 Shiliang （食量） 项目的一部分。
// src/tensor.rs - 画布到平面浮点张量的编码
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

use crate::frame::{FrameError, NchwTensor, RGB_CHANNELS, RgbFrame};

/// 把方形画布编码为 `[1, 3, S, S]` 张量：先全部 R，再全部 G，最后全部 B，
/// 每个平面内按行优先，数值除以 255 归一化到 [0, 1]
pub fn encode_planar(canvas: &RgbFrame) -> Result<NchwTensor, FrameError> {
  if canvas.width() != canvas.height() {
    return Err(FrameError::NotSquare {
      width: canvas.width(),
      height: canvas.height(),
    });
  }

  let (width, height) = (canvas.width() as usize, canvas.height() as usize);
  let plane = width * height;
  let mut data = vec![0.0f32; RGB_CHANNELS * plane];

  for (idx, pixel) in canvas.as_ref().chunks_exact(RGB_CHANNELS).enumerate() {
    data[idx] = pixel[0] as f32 / 255.0;
    data[plane + idx] = pixel[1] as f32 / 255.0;
    data[2 * plane + idx] = pixel[2] as f32 / 255.0;
  }

  NchwTensor::new(width, data)
}
