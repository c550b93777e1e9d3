// 该文件是 Chakan （查看） 项目的一部分。
// src/model/record.rs - 检测记录回放模型
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

//! 读取 `output::record` 写出的文本记录，每行一个目标：
//! `name, score, x_min, y_min, x_max, y_max`，坐标相对原图宽高归一化。
//! `name` 为纯数字时按 COCO 类别编号解析。

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::SourceImage,
  model::{BoxSpace, DetectItem, Model, ModelOutput, labels, resolve_sidecar},
};

const RECORD_FIELDS: usize = 6;

#[derive(Error, Debug)]
pub enum RecordModelError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无法读取记录文件 {0}: {1}")]
  IoError(PathBuf, std::io::Error),
  #[error("记录格式错误（第 {line} 行）: {reason}")]
  ParseError { line: usize, reason: String },
}

pub struct RecordModel {
  path: PathBuf,
}

impl FromUrlWithScheme for RecordModel {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordModel {
  type Error = RecordModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RecordModelError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(RecordModel {
      path: PathBuf::from(url.path()),
    })
  }
}

impl RecordModel {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

impl Model for RecordModel {
  type Input = SourceImage;
  type Output = ModelOutput;
  type Error = RecordModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let path = resolve_sidecar(&self.path, input, "txt");
    info!("回放检测记录: {}", path.display());
    let text = std::fs::read_to_string(&path).map_err(|e| RecordModelError::IoError(path, e))?;
    let items = parse_records(&text)?;
    debug!("读取到 {} 条记录", items.len());

    Ok(ModelOutput {
      space: BoxSpace::Normalized,
      items: items.into_boxed_slice(),
    })
  }
}

pub(crate) fn parse_records(text: &str) -> Result<Vec<DetectItem>, RecordModelError> {
  let mut custom: Vec<String> = Vec::new();
  let mut items = Vec::new();

  for (idx, line) in text.lines().enumerate() {
    let line_no = idx + 1;
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != RECORD_FIELDS {
      return Err(RecordModelError::ParseError {
        line: line_no,
        reason: format!("期望 {} 个字段, 实际 {} 个", RECORD_FIELDS, fields.len()),
      });
    }

    let mut numbers = [0f32; RECORD_FIELDS - 1];
    for (slot, field) in numbers.iter_mut().zip(&fields[1..]) {
      *slot = field.parse().map_err(|_| RecordModelError::ParseError {
        line: line_no,
        reason: format!("无法解析数值 '{}'", field),
      })?;
    }

    let (class_id, class_name) = match fields[0].parse::<u32>() {
      Ok(id) => (
        id,
        labels::class_name_of(id)
          .map(str::to_string)
          .unwrap_or_else(|| format!("class{}", id)),
      ),
      Err(_) => {
        let name = fields[0].to_string();
        let id = match labels::class_id_of(&name) {
          Some(id) => id,
          None => {
            // 非 COCO 类别按首次出现顺序排在 COCO 编号之后
            let offset = match custom.iter().position(|n| *n == name) {
              Some(offset) => offset,
              None => {
                custom.push(name.clone());
                custom.len() - 1
              }
            };
            (labels::COCO_CLASSES.len() + offset) as u32
          }
        };
        (id, name)
      }
    };

    items.push(DetectItem {
      class_id,
      class_name,
      score: numbers[0],
      bbox: [numbers[1], numbers[2], numbers[3], numbers[4]],
    });
  }

  Ok(items)
}
