// 该文件是 Shiliang （食量） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use shiliang::pipeline::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD};

/// Shiliang 食物检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型，例如 onnx:///models/food.onnx?threads=4
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入图片，例如 image:///photos/lunch.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 检测记录输出，例如 json:///records/lunch.json 或 json:-
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 标签文件，每行一个标签，按类别编号排列
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD, value_name = "THRESHOLD")]
  pub iou: f32,

  /// 按类别分别做 NMS
  #[arg(long)]
  pub per_class_nms: bool,

  /// 最多保留的检测数量
  #[arg(long, value_name = "COUNT")]
  pub max_detections: Option<usize>,

  /// 对同一张图重复推理若干次并统计平均耗时
  #[arg(long, value_name = "COUNT")]
  pub repeat: Option<usize>,
}
