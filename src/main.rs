// 该文件是 Shiliang （食量） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use shiliang::{
  FromUrl,
  input::ImageFileInput,
  label::LabelList,
  model::{EngineState, InferenceEngine, OnnxEngine, OnnxEngineBuilder},
  nms::NmsMode,
  output::JsonRecordOutput,
  pipeline::{Pipeline, PipelineConfig},
  task::{OneShotTask, RepeatShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let labels = match &args.labels {
    Some(path) => LabelList::from_file(path)?,
    None => LabelList::default(),
  };

  let engine: EngineState<OnnxEngine> = OnnxEngineBuilder::from_url(&args.model)
    .and_then(OnnxEngineBuilder::build)
    .into();

  let mut config = PipelineConfig::default()
    .with_confidence_threshold(args.confidence)
    .with_iou_threshold(args.iou)
    .with_max_detections(args.max_detections);
  if let EngineState::Ready(engine) = &engine {
    config = config.with_input_size(engine.input_size());
  }
  if args.per_class_nms {
    config = config.with_nms_mode(NmsMode::PerClass);
  }
  info!("流水线配置: {:?}", config);

  let mut pipeline = Pipeline::new(config, engine, labels);

  let input = ImageFileInput::from_url(&args.input)?;
  let output = JsonRecordOutput::from_url(&args.output)?;

  match args.repeat {
    Some(repeat) => RepeatShotTask::with_repeat(repeat).run_task(input, &mut pipeline, output)?,
    None => OneShotTask.run_task(input, &mut pipeline, output)?,
  }

  Ok(())
}
