// 该文件是 Chakan （查看） 项目的一部分。
// src/input.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, info};

/// 可打开的图像扩展名
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum LoadError {
  #[error("不支持的图像格式: {0}")]
  UnsupportedFormat(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("图像尺寸为空: {0}")]
  EmptyImage(PathBuf),
}

/// 当前会话打开的原始分辨率图像，加载后不再修改
#[derive(Debug, Clone)]
pub struct SourceImage {
  path: PathBuf,
  image: RgbImage,
}

impl SourceImage {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
    let path = path.as_ref();
    if !has_supported_extension(path) {
      return Err(LoadError::UnsupportedFormat(path.to_path_buf()));
    }

    info!("打开图像文件: {}", path.display());
    let image = ImageReader::open(path)?
      .with_guessed_format()?
      .decode()?
      .to_rgb8();
    debug!("图像尺寸: {}x{}", image.width(), image.height());

    Self::from_rgb_image(path, image)
  }

  pub fn from_rgb_image(path: impl Into<PathBuf>, image: RgbImage) -> Result<Self, LoadError> {
    let path = path.into();
    if image.width() == 0 || image.height() == 0 {
      return Err(LoadError::EmptyImage(path));
    }
    Ok(Self { path, image })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }
}

pub fn has_supported_extension(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      let ext = ext.to_ascii_lowercase();
      SUPPORTED_EXTENSIONS.contains(&ext.as_str())
    })
    .unwrap_or(false)
}
