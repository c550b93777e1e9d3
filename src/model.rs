// 该文件是 Chakan （查看） 项目的一部分。
// src/model.rs - 检测模型接口
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, input::SourceImage};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 模型输出框所在的坐标空间
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoxSpace {
  /// 原图像素坐标
  Native,
  /// 相对原图宽高的归一化坐标
  Normalized,
  /// 直接拉伸到模型输入尺寸
  Stretched { width: u32, height: u32 },
  /// 等比缩放后居中填充到模型输入尺寸
  Letterbox { width: u32, height: u32 },
}

#[derive(Debug, Clone)]
pub struct DetectItem {
  pub class_id: u32,
  pub class_name: String,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，位于 ModelOutput::space 中
}

#[derive(Debug, Clone)]
pub struct ModelOutput {
  pub space: BoxSpace,
  pub items: Box<[DetectItem]>,
}

impl ModelOutput {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

pub mod labels;

#[cfg(not(any(feature = "model_record", feature = "model_json")))]
compile_error!("至少需要启用一个模型后端特性: model_record 或 model_json");

#[cfg(feature = "model_record")]
mod record;
#[cfg(feature = "model_record")]
pub use self::record::{RecordModel, RecordModelError};

#[cfg(feature = "model_json")]
mod json;
#[cfg(feature = "model_json")]
pub use self::json::{JsonModel, JsonModelError};

#[derive(Error, Debug)]
pub enum ModelError {
  #[cfg(feature = "model_record")]
  #[error("记录回放模型错误: {0}")]
  RecordModelError(#[from] RecordModelError),
  #[cfg(feature = "model_json")]
  #[error("JSON 回放模型错误: {0}")]
  JsonModelError(#[from] JsonModelError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum ModelWrapper {
  #[cfg(feature = "model_record")]
  RecordModel(RecordModel),
  #[cfg(feature = "model_json")]
  JsonModel(JsonModel),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "model_record")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == RecordModel::SCHEME {
        return Ok(ModelWrapper::RecordModel(RecordModel::from_url(url)?));
      }
    }
    #[cfg(feature = "model_json")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == JsonModel::SCHEME {
        return Ok(ModelWrapper::JsonModel(JsonModel::from_url(url)?));
      }
    }
    Err(ModelError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl Model for ModelWrapper {
  type Input = SourceImage;
  type Output = ModelOutput;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self {
      #[cfg(feature = "model_record")]
      ModelWrapper::RecordModel(model) => model.infer(input).map_err(ModelError::from),
      #[cfg(feature = "model_json")]
      ModelWrapper::JsonModel(model) => model.infer(input).map_err(ModelError::from),
    }
  }
}

/// 目录形式的回放路径按图像文件名匹配同名记录文件
fn resolve_sidecar(path: &Path, input: &SourceImage, extension: &str) -> PathBuf {
  if !path.is_dir() {
    return path.to_path_buf();
  }
  let mut name = input
    .path()
    .file_stem()
    .map(|s| s.to_os_string())
    .unwrap_or_default();
  name.push(".");
  name.push(extension);
  path.join(name)
}
