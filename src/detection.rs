// 该文件是 Chakan （查看） 项目的一部分。
// src/detection.rs - 检测结果存储
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

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  input::SourceImage,
  model::{BoxSpace, DetectItem, Model, ModelOutput},
};

/// 原图像素坐标下的边界框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl BoundingBox {
  pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }

  pub fn area(&self) -> f32 {
    self.width().max(0.0) * self.height().max(0.0)
  }

  pub fn contains(&self, x: f32, y: f32) -> bool {
    x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
  }

  /// 截断到 width x height 图像的像素范围内；面积为零或完全落在图像外时返回 None，
  /// 贴边的窄框至少保留一个像素宽
  pub fn clamp_to(&self, width: u32, height: u32) -> Option<[i32; 4]> {
    if width == 0 || height == 0 || self.area() <= 0.0 {
      return None;
    }
    let (w, h) = (width as f32, height as f32);
    if self.x2 < 0.0 || self.y2 < 0.0 || self.x1 >= w || self.y1 >= h {
      return None;
    }

    let (max_x, max_y) = (width as i32 - 1, height as i32 - 1);
    let x1 = (self.x1.floor() as i32).clamp(0, max_x);
    let y1 = (self.y1.floor() as i32).clamp(0, max_y);
    let x2 = (self.x2.ceil() as i32).clamp(0, max_x);
    let y2 = (self.y2.ceil() as i32).clamp(0, max_y);

    if x1 > x2 || y1 > y2 {
      return None;
    }
    Some([x1, y1, x2, y2])
  }
}

/// 一次推理得到的单个目标，创建后不可修改
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  class_id: u32,
  class_name: String,
  confidence: f32,
  bbox: BoundingBox,
}

impl Detection {
  pub fn new(class_id: u32, class_name: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
    Self {
      class_id,
      class_name: class_name.into(),
      confidence,
      bbox,
    }
  }

  pub fn class_id(&self) -> u32 {
    self.class_id
  }

  pub fn class_name(&self) -> &str {
    &self.class_name
  }

  pub fn confidence(&self) -> f32 {
    self.confidence
  }

  pub fn bbox(&self) -> &BoundingBox {
    &self.bbox
  }

  /// 绘制在图像上的标签文本
  pub fn label(&self) -> String {
    format!("{} {:.2}", self.class_name, self.confidence)
  }
}

/// 对同一张原图的一次推理结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSet {
  items: Box<[Detection]>,
}

impl From<Vec<Detection>> for DetectionSet {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl DetectionSet {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&Detection> {
    self.items.get(index)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  pub fn as_slice(&self) -> &[Detection] {
    &self.items
  }

  pub fn tally(&self) -> ClassTally {
    tally(self)
  }
}

impl<'a> IntoIterator for &'a DetectionSet {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

/// 每个类别的目标数量，按类别首次出现的顺序排列
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassTally {
  counts: Vec<(String, usize)>,
}

impl ClassTally {
  pub fn get(&self, class_name: &str) -> usize {
    self
      .counts
      .iter()
      .find(|(name, _)| name == class_name)
      .map(|(_, count)| *count)
      .unwrap_or(0)
  }

  pub fn len(&self) -> usize {
    self.counts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.counts.is_empty()
  }

  pub fn total(&self) -> usize {
    self.counts.iter().map(|(_, count)| count).sum()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
    self
      .counts
      .iter()
      .map(|(name, count)| (name.as_str(), *count))
  }
}

pub fn tally(detections: &DetectionSet) -> ClassTally {
  let mut counts: Vec<(String, usize)> = Vec::new();
  for detection in detections {
    match counts
      .iter_mut()
      .find(|(name, _)| name == detection.class_name())
    {
      Some((_, count)) => *count += 1,
      None => counts.push((detection.class_name().to_string(), 1)),
    }
  }
  ClassTally { counts }
}

#[derive(Error, Debug)]
pub enum DetectionError {
  #[error("模型推理失败: {0}")]
  ModelError(Box<dyn std::error::Error + Send + Sync>),
  #[error("未检测到任何目标")]
  Empty,
  #[error("模型输出无效（第 {index} 项）: {reason}")]
  Malformed { index: usize, reason: String },
  #[error("模型输入尺寸无效: {0:?}")]
  InvalidSpace(BoxSpace),
}

impl DetectionError {
  fn malformed(index: usize, reason: impl Into<String>) -> Self {
    DetectionError::Malformed {
      index,
      reason: reason.into(),
    }
  }
}

/// 调用一次模型，并把输出框还原到原图坐标
pub fn run_detection<M, E>(model: &M, source: &SourceImage) -> Result<DetectionSet, DetectionError>
where
  M: Model<Input = SourceImage, Output = ModelOutput, Error = E>,
  E: std::error::Error + Send + Sync + 'static,
{
  debug!("执行模型推理");
  let now = Instant::now();
  let output = model.infer(source).map_err(|e| {
    error!("模型推理失败: {}", e);
    DetectionError::ModelError(Box::new(e))
  })?;
  info!(
    "推理完成，耗时: {:.2?}，原始结果 {} 项",
    now.elapsed(),
    output.items.len()
  );

  let detections = reconcile(&output, source.width(), source.height())?;
  debug!("检测结果: {:?}", detections);
  Ok(detections)
}

/// 校验模型输出并转换到 width x height 的原图坐标
pub fn reconcile(
  output: &ModelOutput,
  width: u32,
  height: u32,
) -> Result<DetectionSet, DetectionError> {
  if output.is_empty() {
    return Err(DetectionError::Empty);
  }

  let mapper = SpaceMapper::new(output.space, width, height)?;
  let mut items = Vec::with_capacity(output.items.len());
  for (index, item) in output.items.iter().enumerate() {
    validate(index, item)?;
    let [x1, y1, x2, y2] = mapper.to_source(item.bbox);
    items.push(Detection::new(
      item.class_id,
      item.class_name.clone(),
      item.score,
      BoundingBox::new(x1, y1, x2, y2),
    ));
  }
  Ok(DetectionSet::from(items))
}

fn validate(index: usize, item: &DetectItem) -> Result<(), DetectionError> {
  if item.class_name.trim().is_empty() {
    return Err(DetectionError::malformed(index, "类别名称为空"));
  }
  if !(0.0..=1.0).contains(&item.score) {
    return Err(DetectionError::malformed(
      index,
      format!("置信度 {} 不在 [0, 1] 内", item.score),
    ));
  }
  if item.bbox.iter().any(|v| !v.is_finite()) {
    return Err(DetectionError::malformed(index, "边界框坐标不是有限数"));
  }
  let [x1, y1, x2, y2] = item.bbox;
  if x2 < x1 || y2 < y1 {
    return Err(DetectionError::malformed(
      index,
      format!("边界框顶点顺序错误: {:?}", item.bbox),
    ));
  }
  Ok(())
}

/// 模型输出坐标到原图坐标的仿射变换 x' = (x - offset) * factor
struct SpaceMapper {
  factor_x: f32,
  factor_y: f32,
  offset_x: f32,
  offset_y: f32,
}

impl SpaceMapper {
  fn new(space: BoxSpace, width: u32, height: u32) -> Result<Self, DetectionError> {
    let (w, h) = (width as f32, height as f32);
    let mapper = match space {
      BoxSpace::Native => Self::scale(1.0, 1.0),
      BoxSpace::Normalized => Self::scale(w, h),
      BoxSpace::Stretched {
        width: in_w,
        height: in_h,
      } => {
        if in_w == 0 || in_h == 0 {
          return Err(DetectionError::InvalidSpace(space));
        }
        Self::scale(w / in_w as f32, h / in_h as f32)
      }
      BoxSpace::Letterbox {
        width: in_w,
        height: in_h,
      } => {
        if in_w == 0 || in_h == 0 {
          return Err(DetectionError::InvalidSpace(space));
        }
        let (in_w, in_h) = (in_w as f32, in_h as f32);
        let ratio = (in_w / w).min(in_h / h);
        Self {
          factor_x: 1.0 / ratio,
          factor_y: 1.0 / ratio,
          offset_x: (in_w - w * ratio) / 2.0,
          offset_y: (in_h - h * ratio) / 2.0,
        }
      }
    };
    Ok(mapper)
  }

  fn scale(factor_x: f32, factor_y: f32) -> Self {
    Self {
      factor_x,
      factor_y,
      offset_x: 0.0,
      offset_y: 0.0,
    }
  }

  fn to_source(&self, bbox: [f32; 4]) -> [f32; 4] {
    [
      (bbox[0] - self.offset_x) * self.factor_x,
      (bbox[1] - self.offset_y) * self.factor_y,
      (bbox[2] - self.offset_x) * self.factor_x,
      (bbox[3] - self.offset_y) * self.factor_y,
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(name: &str, score: f32, bbox: [f32; 4]) -> DetectItem {
    DetectItem {
      class_id: 0,
      class_name: name.to_string(),
      score,
      bbox,
    }
  }

  fn output(space: BoxSpace, items: Vec<DetectItem>) -> ModelOutput {
    ModelOutput {
      space,
      items: items.into_boxed_slice(),
    }
  }

  fn assert_bbox(actual: &BoundingBox, expected: [f32; 4]) {
    let actual = [actual.x1, actual.y1, actual.x2, actual.y2];
    for (a, e) in actual.iter().zip(expected) {
      assert!((a - e).abs() < 1e-3, "{:?} != {:?}", actual, expected);
    }
  }

  #[test]
  fn native_boxes_are_kept() {
    let out = output(BoxSpace::Native, vec![item("dog", 0.9, [10.0, 20.0, 30.0, 40.0])]);
    let set = reconcile(&out, 100, 100).unwrap();
    assert_bbox(set.get(0).unwrap().bbox(), [10.0, 20.0, 30.0, 40.0]);
  }

  #[test]
  fn normalized_boxes_scale_to_source() {
    let out = output(BoxSpace::Normalized, vec![item("dog", 0.9, [0.25, 0.5, 0.5, 1.0])]);
    let set = reconcile(&out, 4000, 3000).unwrap();
    assert_bbox(set.get(0).unwrap().bbox(), [1000.0, 1500.0, 2000.0, 3000.0]);
  }

  #[test]
  fn stretched_boxes_scale_per_axis() {
    let space = BoxSpace::Stretched {
      width: 640,
      height: 640,
    };
    let out = output(space, vec![item("cat", 0.5, [64.0, 64.0, 320.0, 640.0])]);
    let set = reconcile(&out, 1280, 320).unwrap();
    assert_bbox(set.get(0).unwrap().bbox(), [128.0, 32.0, 640.0, 320.0]);
  }

  #[test]
  fn letterbox_padding_is_undone() {
    // 4000x3000 缩放到 640x480，上下各填充 80 像素
    let space = BoxSpace::Letterbox {
      width: 640,
      height: 640,
    };
    let out = output(space, vec![item("dog", 0.91, [0.0, 80.0, 640.0, 560.0])]);
    let set = reconcile(&out, 4000, 3000).unwrap();
    assert_bbox(set.get(0).unwrap().bbox(), [0.0, 0.0, 4000.0, 3000.0]);

    let out = output(space, vec![item("dog", 0.91, [160.0, 240.0, 320.0, 320.0])]);
    let set = reconcile(&out, 4000, 3000).unwrap();
    assert_bbox(set.get(0).unwrap().bbox(), [1000.0, 1000.0, 2000.0, 1500.0]);
  }

  #[test]
  fn empty_output_is_failure() {
    let out = output(BoxSpace::Native, vec![]);
    assert!(matches!(reconcile(&out, 10, 10), Err(DetectionError::Empty)));
  }

  #[test]
  fn malformed_items_are_rejected() {
    let cases = [
      item("dog", 1.5, [0.0, 0.0, 1.0, 1.0]),
      item("dog", f32::NAN, [0.0, 0.0, 1.0, 1.0]),
      item("dog", 0.5, [0.0, 0.0, f32::INFINITY, 1.0]),
      item("dog", 0.5, [5.0, 0.0, 1.0, 1.0]),
      item(" ", 0.5, [0.0, 0.0, 1.0, 1.0]),
    ];
    for case in cases {
      let out = output(BoxSpace::Native, vec![item("cat", 0.5, [0.0, 0.0, 1.0, 1.0]), case]);
      match reconcile(&out, 10, 10) {
        Err(DetectionError::Malformed { index, .. }) => assert_eq!(index, 1),
        other => panic!("expected malformed, got {:?}", other),
      }
    }
  }

  #[test]
  fn zero_sized_model_space_is_rejected() {
    let space = BoxSpace::Letterbox {
      width: 0,
      height: 640,
    };
    let out = output(space, vec![item("dog", 0.5, [0.0, 0.0, 1.0, 1.0])]);
    assert!(matches!(
      reconcile(&out, 10, 10),
      Err(DetectionError::InvalidSpace(_))
    ));
  }

  #[test]
  fn tally_counts_in_first_seen_order() {
    let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
    let set = DetectionSet::from(vec![
      Detection::new(16, "dog", 0.91, bbox),
      Detection::new(15, "cat", 0.65, bbox),
      Detection::new(16, "dog", 0.77, bbox),
    ]);
    let tally = set.tally();
    let rows: Vec<_> = tally.iter().collect();
    assert_eq!(rows, vec![("dog", 2), ("cat", 1)]);
    assert_eq!(tally.get("dog"), 2);
    assert_eq!(tally.get("bird"), 0);
    assert_eq!(tally.total(), set.len());
  }

  #[test]
  fn clamp_handles_out_of_bounds_boxes() {
    let bbox = BoundingBox::new(-50.0, -10.0, 500.0, 20.5);
    assert_eq!(bbox.clamp_to(100, 50), Some([0, 0, 99, 21]));

    let outside = BoundingBox::new(200.0, 200.0, 300.0, 300.0);
    assert_eq!(outside.clamp_to(100, 50), None);
    let above = BoundingBox::new(10.0, -30.0, 20.0, -1.0);
    assert_eq!(above.clamp_to(100, 50), None);
  }

  #[test]
  fn clamp_keeps_thin_boxes_at_the_edge() {
    let right_edge = BoundingBox::new(99.5, 10.0, 100.0, 60.0);
    assert_eq!(right_edge.clamp_to(100, 80), Some([99, 10, 99, 60]));

    let bottom_edge = BoundingBox::new(10.0, 79.2, 40.0, 85.0);
    assert_eq!(bottom_edge.clamp_to(100, 80), Some([10, 79, 40, 79]));

    let flat = BoundingBox::new(10.0, 20.0, 10.0, 40.0);
    assert_eq!(flat.clamp_to(100, 80), None);
  }

  #[test]
  fn label_uses_two_decimals() {
    let det = Detection::new(16, "dog", 0.9149, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
    assert_eq!(det.label(), "dog 0.91");
  }
}
