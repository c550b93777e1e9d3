// 该文件是 Chakan （查看） 项目的一部分。
// src/presenter/list.rs - 检测结果列表
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

use std::fmt;

use crate::detection::DetectionSet;

pub const LIST_SEPARATOR: &str = "----------------------";

/// 列表中的一行，只有 Detection 行对应检测结果并可被选中
#[derive(Debug, Clone, PartialEq)]
pub enum ListEntry {
  Detection {
    index: usize,
    class_name: String,
    confidence: f32,
  },
  Separator,
  Tally {
    class_name: String,
    count: usize,
  },
}

impl ListEntry {
  pub fn detection_index(&self) -> Option<usize> {
    match self {
      ListEntry::Detection { index, .. } => Some(*index),
      ListEntry::Separator | ListEntry::Tally { .. } => None,
    }
  }

  pub fn is_selectable(&self) -> bool {
    self.detection_index().is_some()
  }
}

impl fmt::Display for ListEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ListEntry::Detection {
        class_name,
        confidence,
        ..
      } => write!(f, "{} (confidence: {:.2})", class_name, confidence),
      ListEntry::Separator => f.write_str(LIST_SEPARATOR),
      ListEntry::Tally { class_name, count } => write!(f, "{}: {}개", class_name, count),
    }
  }
}

/// 检测行、分隔行、按类别计数行，计数每次从同一个 DetectionSet 重新统计
pub fn list_entries(detections: &DetectionSet) -> Vec<ListEntry> {
  let tally = detections.tally();
  let mut entries = Vec::with_capacity(detections.len() + 1 + tally.len());

  entries.extend(
    detections
      .iter()
      .enumerate()
      .map(|(index, det)| ListEntry::Detection {
        index,
        class_name: det.class_name().to_string(),
        confidence: det.confidence(),
      }),
  );
  entries.push(ListEntry::Separator);
  entries.extend(tally.iter().map(|(class_name, count)| ListEntry::Tally {
    class_name: class_name.to_string(),
    count,
  }));

  entries
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::{BoundingBox, Detection};

  fn sample() -> DetectionSet {
    let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    DetectionSet::from(vec![
      Detection::new(16, "dog", 0.91, bbox),
      Detection::new(16, "dog", 0.77, bbox),
      Detection::new(15, "cat", 0.65, bbox),
    ])
  }

  #[test]
  fn renders_expected_lines() {
    let lines: Vec<String> = list_entries(&sample())
      .iter()
      .map(ToString::to_string)
      .collect();
    assert_eq!(
      lines,
      vec![
        "dog (confidence: 0.91)",
        "dog (confidence: 0.77)",
        "cat (confidence: 0.65)",
        LIST_SEPARATOR,
        "dog: 2개",
        "cat: 1개",
      ]
    );
  }

  #[test]
  fn rows_align_with_detections() {
    let set = sample();
    let entries = list_entries(&set);
    for (position, entry) in entries.iter().enumerate() {
      if position < set.len() {
        assert_eq!(entry.detection_index(), Some(position));
      } else {
        assert!(!entry.is_selectable());
      }
    }
  }

  #[test]
  fn empty_set_has_only_separator() {
    let entries = list_entries(&DetectionSet::default());
    assert_eq!(entries, vec![ListEntry::Separator]);
  }
}
