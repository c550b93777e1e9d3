// 该文件是 Chakan （查看） 项目的一部分。
// src/bin/simple_oneshot.rs - 单次检测与标注
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

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Parser;
use tracing::info;
use url::Url;

use chakan::{
  FromUrl,
  model::ModelWrapper,
  output::{SaveImageFileOutput, draw::Draw},
  presenter::{Presenter, PresenterConfig, SavePolicy, Selection},
};

/// Chakan 单次检测参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像
  #[arg(long, value_name = "IMAGE")]
  pub input: PathBuf,
  /// 标注结果输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: PathBuf,
  /// 额外导出检测记录（*.txt 或 *.json）
  #[arg(long, value_name = "RECORD")]
  pub record: Option<PathBuf>,
  /// 高亮列表第 n 个目标（从 1 开始），写到 <output>_selected
  #[arg(long, value_name = "N")]
  pub select: Option<usize>,
  /// 标签字体文件
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  /// 保存策略（reuse 或 redetect）
  #[arg(long, default_value = "reuse", value_name = "POLICY")]
  pub save_policy: SavePolicy,
}

fn selected_path(output: &Path) -> PathBuf {
  let mut name = output
    .file_stem()
    .map(|s| s.to_os_string())
    .unwrap_or_default();
  name.push("_selected");
  if let Some(ext) = output.extension() {
    name.push(".");
    name.push(ext);
  }
  output.with_file_name(name)
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  info!("模型: {}", args.model);
  info!("输入图像: {}", args.input.display());
  info!("输出路径: {}", args.output.display());

  let model = ModelWrapper::from_url(&args.model)?;
  let draw = match &args.font {
    Some(font) => Draw::with_font_file(font)?,
    None => Draw::with_system_font(),
  };
  let config = PresenterConfig {
    save_policy: args.save_policy,
    ..PresenterConfig::default()
  };
  let mut presenter = Presenter::new(model, draw, config);

  presenter.open(&args.input)?;
  let count = presenter.detect()?;
  for entry in presenter.entries() {
    info!("{}", entry);
  }
  presenter.save(&args.output)?;
  info!("检测到 {} 个目标，已保存到 {}", count, args.output.display());

  if let Some(record) = &args.record {
    presenter.export(record)?;
  }

  if let Some(n) = args.select {
    if n == 0 {
      bail!("--select 从 1 开始计数");
    }
    match presenter.select(n - 1)? {
      Selection::Highlighted(_) => {
        let path = selected_path(&args.output);
        if let Some(image) = presenter.render() {
          SaveImageFileOutput::new(&path).save(&image)?;
          info!("高亮结果已保存到 {}", path.display());
        }
      }
      Selection::Ignored => bail!("第 {} 行不是检测结果", n),
    }
  }

  Ok(())
}
