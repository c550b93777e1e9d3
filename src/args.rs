// 该文件是 Chakan （查看） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use chakan::presenter::SavePolicy;

/// Chakan 交互式检测结果查看
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型
  /// 支持格式:
  /// - 文本记录: record:///path/to/dets.txt 或 record:///path/to/dir
  /// - JSON 记录: json:///path/to/dets.json?space=letterbox&size=640x640
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 启动时打开的图像（*.jpg, *.jpeg, *.png）
  #[arg(long, value_name = "IMAGE")]
  pub input: Option<PathBuf>,

  /// 预览最大宽度
  #[arg(long, default_value = "800", value_name = "PIXELS")]
  pub max_width: u32,

  /// 预览最大高度
  #[arg(long, default_value = "600", value_name = "PIXELS")]
  pub max_height: u32,

  /// 标签字体文件，缺省时尝试系统字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,

  /// 保存策略（reuse: 复用已有结果, redetect: 保存前重新推理）
  #[arg(long, default_value = "reuse", value_name = "POLICY")]
  pub save_policy: SavePolicy,

  /// JPEG 保存质量 (1 - 100)
  #[arg(long, default_value = "95", value_name = "QUALITY")]
  pub jpeg_quality: u8,

  /// 预览图输出路径，每次视图变化后重写
  #[arg(long, value_name = "PREVIEW")]
  pub preview: Option<PathBuf>,
}
