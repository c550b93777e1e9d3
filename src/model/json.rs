// 该文件是 Chakan （查看） 项目的一部分。
// src/model/json.rs - JSON 检测结果回放模型
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

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::SourceImage,
  model::{BoxSpace, DetectItem, Model, ModelOutput, resolve_sidecar},
  output::record::JsonDetection,
};

#[derive(Error, Debug)]
pub enum JsonModelError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无效的坐标空间参数: {0}")]
  InvalidSpace(String),
  #[error("无法读取 JSON 文件 {0}: {1}")]
  IoError(PathBuf, std::io::Error),
  #[error("JSON 解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
}

pub struct JsonModel {
  path: PathBuf,
  space: BoxSpace,
}

impl FromUrlWithScheme for JsonModel {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonModel {
  type Error = JsonModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonModelError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let mut space = None;
    let mut size = None;
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "space" => space = Some(v.into_owned()),
        "size" => size = Some(parse_size(&v)?),
        _ => {}
      }
    }

    let space = match (space.as_deref().unwrap_or("native"), size) {
      ("native", _) => BoxSpace::Native,
      ("normalized", _) => BoxSpace::Normalized,
      ("stretch", Some((width, height))) => BoxSpace::Stretched { width, height },
      ("letterbox", Some((width, height))) => BoxSpace::Letterbox { width, height },
      ("stretch" | "letterbox", None) => {
        return Err(JsonModelError::InvalidSpace(
          "stretch/letterbox 需要 size=WxH 参数".to_string(),
        ));
      }
      (other, _) => return Err(JsonModelError::InvalidSpace(other.to_string())),
    };

    Ok(JsonModel {
      path: PathBuf::from(url.path()),
      space,
    })
  }
}

fn parse_size(value: &str) -> Result<(u32, u32), JsonModelError> {
  let invalid = || JsonModelError::InvalidSpace(format!("无效的尺寸 '{}'", value));
  let (w, h) = value.split_once(['x', 'X']).ok_or_else(invalid)?;
  let width = w.trim().parse().map_err(|_| invalid())?;
  let height = h.trim().parse().map_err(|_| invalid())?;
  Ok((width, height))
}

impl JsonModel {
  pub fn new(path: impl Into<PathBuf>, space: BoxSpace) -> Self {
    Self {
      path: path.into(),
      space,
    }
  }

  pub fn space(&self) -> BoxSpace {
    self.space
  }
}

impl Model for JsonModel {
  type Input = SourceImage;
  type Output = ModelOutput;
  type Error = JsonModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let path = resolve_sidecar(&self.path, input, "json");
    info!("回放 JSON 检测结果: {}", path.display());
    let text = std::fs::read_to_string(&path).map_err(|e| JsonModelError::IoError(path, e))?;
    let detections: Vec<JsonDetection> = serde_json::from_str(&text)?;
    debug!("读取到 {} 个目标", detections.len());

    Ok(ModelOutput {
      space: self.space,
      items: detections.into_iter().map(DetectItem::from).collect(),
    })
  }
}
