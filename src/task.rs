// 该文件是 Shiliang （食量） 项目的一部分。
// src/task.rs - 推理任务
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

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::{
  frame::RgbFrame,
  model::{DetectResult, InferenceEngine},
  output::Render,
  pipeline::Pipeline,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<E, RE, I, O> Task<I, &mut Pipeline<E>, O> for OneShotTask
where
  E: InferenceEngine,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbFrame>,
  O: Render<RgbFrame, DetectResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: &mut Pipeline<E>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功 ({}x{})，开始推理...", frame.width(), frame.height());
    let now = Instant::now();
    let result = model.detect(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    for item in result.items.iter() {
      info!(
        "  - {}: {:.2}% at ({:.0}, {:.0}, {:.0}, {:.0})",
        item.label,
        item.confidence * 100.0,
        item.rect.left,
        item.rect.top,
        item.rect.right,
        item.rect.bottom
      );
    }
    output.render_result(&frame, &result)?;

    Ok(())
  }
}

/// 对同一帧重复推理，统计平均耗时（跳过前两次预热）
pub struct RepeatShotTask {
  repeat: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_repeat(repeat: usize) -> Self {
    Self {
      repeat: repeat.max(1),
    }
  }

  fn average(times: &[Duration]) -> Duration {
    const WARMUP: usize = 2;
    let measured = if times.len() > WARMUP {
      &times[WARMUP..]
    } else {
      times
    };
    let count = u32::try_from(measured.len().max(1)).unwrap_or(u32::MAX);
    measured.iter().sum::<Duration>() / count
  }
}

impl<E, RE, I, O> Task<I, &mut Pipeline<E>, O> for RepeatShotTask
where
  E: InferenceEngine,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbFrame>,
  O: Render<RgbFrame, DetectResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: &mut Pipeline<E>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat);
    let mut last = DetectResult::empty();
    for i in 0..self.repeat {
      let now = Instant::now();
      last = model.detect(&frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
    }

    warn!("平均推理时间: {:.2?}", Self::average(&times));
    output.render_result(&frame, &last)?;

    Ok(())
  }
}
