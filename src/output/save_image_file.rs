// 该文件是 Chakan （查看） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::{Path, PathBuf},
};

use image::{
  RgbImage,
  codecs::{jpeg::JpegEncoder, png::PngEncoder},
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像编码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("不支持的输出格式: {0}")]
  UnsupportedFormat(PathBuf),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
  Jpeg,
  Png,
}

impl OutputFormat {
  pub fn from_path(path: &Path) -> Result<Self, SaveImageFileError> {
    let ext = path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
      Some("jpg" | "jpeg") => Ok(OutputFormat::Jpeg),
      Some("png") => Ok(OutputFormat::Png),
      _ => Err(SaveImageFileError::UnsupportedFormat(path.to_path_buf())),
    }
  }
}

pub struct SaveImageFileOutput {
  path: PathBuf,
  jpeg_quality: u8,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let mut output = SaveImageFileOutput::new(uri.path());
    for (k, v) in uri.query_pairs() {
      if k == "quality"
        && let Ok(quality) = v.parse::<u8>()
      {
        output = output.with_jpeg_quality(quality);
      }
    }
    Ok(output)
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      jpeg_quality: DEFAULT_JPEG_QUALITY,
    }
  }

  pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
    self.jpeg_quality = quality.clamp(1, 100);
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 按扩展名选择编码器写出 RGB8 图像
  pub fn save(&self, image: &RgbImage) -> Result<(), SaveImageFileError> {
    let format = OutputFormat::from_path(&self.path)?;

    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(&self.path)?);
    match format {
      OutputFormat::Jpeg => {
        debug!("JPEG 编码，质量 {}", self.jpeg_quality);
        image.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality))?;
      }
      OutputFormat::Png => {
        image.write_with_encoder(PngEncoder::new(&mut writer))?;
      }
    }
    writer.flush()?;

    info!(
      "保存图像到文件: {} ({}x{})",
      self.path.display(),
      image.width(),
      image.height()
    );

    Ok(())
  }
}
