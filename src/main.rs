// 该文件是 Chakan （查看） 项目的一部分。
// src/main.rs - 交互式查看程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use chakan::{
  FromUrl,
  console::Console,
  model::ModelWrapper,
  output::draw::Draw,
  presenter::{Presenter, PresenterConfig},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .init();

  let args = args::Args::parse();

  info!("模型: {}", args.model);
  info!("预览尺寸上限: {}x{}", args.max_width, args.max_height);
  info!("保存策略: {:?}", args.save_policy);

  let model = ModelWrapper::from_url(&args.model)?;
  let draw = match &args.font {
    Some(font) => Draw::with_font_file(font)?,
    None => Draw::with_system_font(),
  };
  let config = PresenterConfig {
    max_preview_width: args.max_width,
    max_preview_height: args.max_height,
    save_policy: args.save_policy,
    jpeg_quality: args.jpeg_quality,
  };
  let presenter = Presenter::new(model, draw, config);

  let stdout = std::io::stdout();
  let mut console = Console::new(presenter, stdout.lock());
  if let Some(preview) = &args.preview {
    info!("预览输出: {}", preview.display());
    console = console.with_preview(preview)?;
  }

  if let Some(input) = &args.input {
    let line = format!("open {}", input.display());
    if let Err(e) = console.execute(&line) {
      warn!("初始图像打开失败: {}", e);
    }
  }

  console.run(std::io::stdin().lock())?;
  info!("会话结束");
  Ok(())
}
