// 该文件是 Chakan （查看） 项目的一部分。
// src/output/record.rs - 检测结果记录导出
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{detection::DetectionSet, model::DetectItem};

#[derive(Error, Debug)]
pub enum RecordError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("不支持的记录格式: {0}")]
  UnsupportedFormat(PathBuf),
}

/// 与常见 YOLO 工具导出的 JSON 结构一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDetection {
  pub name: String,
  pub class: u32,
  pub confidence: f32,
  #[serde(rename = "box")]
  pub bbox: JsonBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JsonBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl From<JsonDetection> for DetectItem {
  fn from(det: JsonDetection) -> Self {
    DetectItem {
      class_id: det.class,
      class_name: det.name,
      score: det.confidence,
      bbox: [det.bbox.x1, det.bbox.y1, det.bbox.x2, det.bbox.y2],
    }
  }
}

pub struct Record {
  pub label_with_name: bool,
}

impl Default for Record {
  fn default() -> Self {
    Self {
      label_with_name: true,
    }
  }
}

impl Record {
  /// 文本记录，坐标按 width x height 归一化
  pub fn to_text(&self, detections: &DetectionSet, width: u32, height: u32) -> String {
    let (w, h) = (width as f32, height as f32);
    let mut records = Vec::with_capacity(detections.len());
    for det in detections {
      let name = if self.label_with_name {
        det.class_name().to_string()
      } else {
        format!("{}", det.class_id())
      };
      let bbox = det.bbox();
      records.push(format!(
        "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
        name,
        det.confidence(),
        bbox.x1 / w,
        bbox.y1 / h,
        bbox.x2 / w,
        bbox.y2 / h
      ));
    }
    records.join("\n")
  }

  /// JSON 记录，坐标为原图像素
  pub fn to_json(&self, detections: &DetectionSet) -> Result<String, RecordError> {
    let items: Vec<JsonDetection> = detections
      .iter()
      .map(|det| {
        let bbox = det.bbox();
        JsonDetection {
          name: det.class_name().to_string(),
          class: det.class_id(),
          confidence: det.confidence(),
          bbox: JsonBox {
            x1: bbox.x1,
            y1: bbox.y1,
            x2: bbox.x2,
            y2: bbox.y2,
          },
        }
      })
      .collect();
    Ok(serde_json::to_string_pretty(&items)?)
  }

  /// 按扩展名写出 `.txt` 或 `.json` 记录
  pub fn record(
    &self,
    detections: &DetectionSet,
    width: u32,
    height: u32,
    path: &Path,
  ) -> Result<(), RecordError> {
    let ext = path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| ext.to_ascii_lowercase());
    let content = match ext.as_deref() {
      Some("txt") => self.to_text(detections, width, height),
      Some("json") => self.to_json(detections)?,
      _ => return Err(RecordError::UnsupportedFormat(path.to_path_buf())),
    };

    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    info!("导出 {} 条检测记录到: {}", detections.len(), path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::{BoundingBox, Detection};

  fn sample() -> DetectionSet {
    DetectionSet::from(vec![
      Detection::new(16, "dog", 0.91, BoundingBox::new(400.0, 300.0, 2000.0, 1500.0)),
      Detection::new(15, "cat", 0.65, BoundingBox::new(0.0, 0.0, 4000.0, 3000.0)),
    ])
  }

  #[test]
  fn text_is_normalized() {
    let text = Record::default().to_text(&sample(), 4000, 3000);
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], "dog, 0.9100, 0.1000, 0.1000, 0.5000, 0.5000");
    assert_eq!(lines[1], "cat, 0.6500, 0.0000, 0.0000, 1.0000, 1.0000");

    let by_id = Record {
      label_with_name: false,
    }
    .to_text(&sample(), 4000, 3000);
    assert!(by_id.starts_with("16, 0.9100"));
  }

  #[test]
  fn json_uses_box_key() {
    let json = Record::default().to_json(&sample()).unwrap();
    let parsed: Vec<JsonDetection> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].bbox.x2, 2000.0);
    assert!(json.contains("\"box\""));
  }

  #[test]
  fn rejects_unknown_extension() {
    let dir = tempfile::tempdir().unwrap();
    let err = Record::default()
      .record(&sample(), 4000, 3000, &dir.path().join("out.csv"))
      .unwrap_err();
    assert!(matches!(err, RecordError::UnsupportedFormat(_)));
  }
}
