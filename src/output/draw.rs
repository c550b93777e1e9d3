// 该文件是 Chakan （查看） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::detection::{Detection, DetectionSet};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_FONT_PER_LINE_WIDTH: f32 = 8.0;
const LABEL_CHAR_WIDTH_RATIO: f32 = 0.55; // 无字体时按字号估算字符宽度
const LINE_WIDTH_RATIO: f32 = 0.003;
const MIN_LINE_WIDTH: i32 = 2;
const PALETTE_SIZE: usize = 80;
const HIGHLIGHT_COLOR: [u8; 3] = [255, 0, 0]; // 红色

/// 常见系统字体位置，按顺序尝试
const SYSTEM_FONT_PATHS: [&str; 6] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "/Library/Fonts/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件 {0}: {1}")]
  IoError(PathBuf, std::io::Error),
  #[error("无效的字体文件: {0}")]
  InvalidFont(PathBuf),
}

#[derive(Debug, Clone, Copy)]
struct Style {
  color: Rgb<u8>,
  thickness: i32,
}

pub struct Draw {
  font: Option<FontArc>,
  palette: Vec<Rgb<u8>>,
  highlight_color: Rgb<u8>,
}

impl Default for Draw {
  fn default() -> Self {
    Self::with_system_font()
  }
}

impl Draw {
  fn new(font: Option<FontArc>) -> Self {
    let palette = (0..PALETTE_SIZE)
      .map(|i| {
        let hue = (i as f32 / PALETTE_SIZE as f32) * 360.0;
        hsv_to_rgb(hue, 0.8, 0.9)
      })
      .collect();

    Self {
      font,
      palette,
      highlight_color: Rgb(HIGHLIGHT_COLOR),
    }
  }

  /// 不渲染文字，仅绘制边框与标签底色
  pub fn without_font() -> Self {
    Self::new(None)
  }

  pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| DrawError::IoError(path.to_path_buf(), e))?;
    let font = FontArc::try_from_vec(data).map_err(|_| DrawError::InvalidFont(path.to_path_buf()))?;
    info!("加载字体: {}", path.display());
    Ok(Self::new(Some(font)))
  }

  pub fn with_system_font() -> Self {
    for candidate in SYSTEM_FONT_PATHS {
      let path = Path::new(candidate);
      if !path.exists() {
        continue;
      }
      match Self::with_font_file(path) {
        Ok(draw) => return draw,
        Err(e) => debug!("跳过字体 {}: {}", candidate, e),
      }
    }
    warn!("未找到可用字体，标签将不显示文字");
    Self::without_font()
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  pub fn class_color(&self, class_id: u32) -> Rgb<u8> {
    self.palette[class_id as usize % self.palette.len()]
  }

  /// 在原图副本上绘制全部检测框
  pub fn draw_all(&self, source: &RgbImage, detections: &DetectionSet) -> RgbImage {
    let mut image = source.clone();
    let thickness = line_width(image.width(), image.height());
    for detection in detections {
      let style = Style {
        color: self.class_color(detection.class_id()),
        thickness,
      };
      self.draw_bbox_with_label(&mut image, detection, style);
    }
    image
  }

  /// 在原图副本上以加粗的高亮样式绘制单个检测框
  pub fn draw_one(&self, source: &RgbImage, detection: &Detection) -> RgbImage {
    let mut image = source.clone();
    let style = Style {
      color: self.highlight_color,
      thickness: line_width(image.width(), image.height()) * 2,
    };
    self.draw_bbox_with_label(&mut image, detection, style);
    image
  }

  fn draw_bbox_with_label(&self, image: &mut RgbImage, detection: &Detection, style: Style) {
    let Some([x_min, y_min, x_max, y_max]) = detection
      .bbox()
      .clamp_to(image.width(), image.height())
    else {
      debug!("边界框位于图像之外，跳过: {:?}", detection);
      return;
    };

    // 边框向内加粗
    for t in 0..style.thickness {
      let (left, top, right, bottom) = (x_min + t, y_min + t, x_max - t, y_max - t);
      if left > right || top > bottom {
        break;
      }
      let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
      draw_hollow_rect_mut(image, rect, style.color);
    }

    self.draw_label(image, x_min, y_min, &detection.label(), style);
  }

  fn draw_label(&self, image: &mut RgbImage, x_min: i32, y_min: i32, label: &str, style: Style) {
    let (w, h) = (image.width(), image.height());
    let font_size = (style.thickness as f32 * LABEL_FONT_PER_LINE_WIDTH).max(LABEL_FONT_SIZE);
    let scale = PxScale::from(font_size);
    let padding = style.thickness.max(MIN_LINE_WIDTH) as u32;

    let (text_width, text_height) = match &self.font {
      Some(font) => text_size(scale, font, label),
      None => (
        (label.chars().count() as f32 * font_size * LABEL_CHAR_WIDTH_RATIO) as u32,
        font_size as u32,
      ),
    };

    let label_width = (text_width + 2 * padding).min(w);
    let label_height = (text_height + 2 * padding).min(h);
    if label_width == 0 || label_height == 0 {
      return;
    }

    // 标签默认放在边框上方，空间不足时放在边框内侧
    let label_x = x_min.min((w - label_width) as i32).max(0);
    let label_y = if y_min >= label_height as i32 {
      y_min - label_height as i32
    } else {
      y_min.min((h - label_height) as i32).max(0)
    };

    let rect = Rect::at(label_x, label_y).of_size(label_width, label_height);
    draw_filled_rect_mut(image, rect, style.color);

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        contrast_color(style.color),
        label_x + padding as i32,
        label_y + padding as i32,
        scale,
        font,
        label,
      );
    }
  }
}

/// 线宽随图像尺寸增长，保证缩小预览后依然可见
pub fn line_width(width: u32, height: u32) -> i32 {
  let mean_side = (width as f32 + height as f32) / 2.0;
  ((mean_side * LINE_WIDTH_RATIO).round() as i32).max(MIN_LINE_WIDTH)
}

fn contrast_color(background: Rgb<u8>) -> Rgb<u8> {
  let [r, g, b] = background.0;
  let luminance = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
  if luminance > 150.0 {
    Rgb([0, 0, 0])
  } else {
    Rgb([255, 255, 255])
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::BoundingBox;

  const BACKGROUND: Rgb<u8> = Rgb([40, 40, 40]);

  fn source(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, BACKGROUND)
  }

  fn det(class_id: u32, name: &str, bbox: [f32; 4]) -> Detection {
    Detection::new(
      class_id,
      name,
      0.8,
      BoundingBox::new(bbox[0], bbox[1], bbox[2], bbox[3]),
    )
  }

  #[test]
  fn draw_all_leaves_source_untouched_and_is_deterministic() {
    let draw = Draw::without_font();
    let src = source(200, 160);
    let set = DetectionSet::from(vec![
      det(16, "dog", [20.0, 60.0, 120.0, 150.0]),
      det(15, "cat", [130.0, 10.0, 190.0, 80.0]),
    ]);

    let first = draw.draw_all(&src, &set);
    let second = draw.draw_all(&src, &set);
    assert_eq!(first.as_raw(), second.as_raw());
    assert_ne!(first.as_raw(), src.as_raw());
    assert!(src.pixels().all(|p| *p == BACKGROUND));
  }

  #[test]
  fn box_edges_use_class_color() {
    let draw = Draw::without_font();
    let src = source(200, 160);
    let set = DetectionSet::from(vec![det(16, "dog", [20.0, 60.0, 120.0, 150.0])]);
    let out = draw.draw_all(&src, &set);
    let color = draw.class_color(16);

    assert_eq!(*out.get_pixel(20, 100), color);
    assert_eq!(*out.get_pixel(120, 100), color);
    assert_eq!(*out.get_pixel(70, 150), color);
    // 内部未被填充
    assert_eq!(*out.get_pixel(70, 100), BACKGROUND);
  }

  #[test]
  fn label_sits_above_box_when_space_allows() {
    let draw = Draw::without_font();
    let src = source(200, 160);
    let set = DetectionSet::from(vec![det(16, "dog", [20.0, 60.0, 120.0, 150.0])]);
    let out = draw.draw_all(&src, &set);
    let color = draw.class_color(16);

    assert_eq!(*out.get_pixel(22, 58), color);
    assert_eq!(*out.get_pixel(22, 10), BACKGROUND);
  }

  #[test]
  fn label_moves_inside_box_at_top_edge() {
    let draw = Draw::without_font();
    let src = source(200, 160);
    let set = DetectionSet::from(vec![det(16, "dog", [20.0, 0.0, 120.0, 150.0])]);
    let out = draw.draw_all(&src, &set);

    assert_eq!(*out.get_pixel(25, 5), draw.class_color(16));
  }

  #[test]
  fn out_of_bounds_boxes_are_clamped() {
    let draw = Draw::without_font();
    let src = source(100, 80);
    let set = DetectionSet::from(vec![
      det(1, "bicycle", [-40.0, -40.0, 500.0, 500.0]),
      det(2, "car", [300.0, 300.0, 400.0, 400.0]),
    ]);
    let out = draw.draw_all(&src, &set);
    let color = draw.class_color(1);

    assert_eq!(out.dimensions(), (100, 80));
    assert_eq!(*out.get_pixel(99, 79), color);
    assert_eq!(*out.get_pixel(0, 79), color);
    assert_eq!(*out.get_pixel(99, 40), color);
  }

  #[test]
  fn thin_box_at_image_edge_is_still_drawn() {
    let draw = Draw::without_font();
    let src = source(100, 80);
    let target = det(16, "dog", [99.5, 10.0, 100.0, 60.0]);

    let all = draw.draw_all(&src, &DetectionSet::from(vec![target.clone()]));
    assert_eq!(*all.get_pixel(99, 50), draw.class_color(16));

    let one = draw.draw_one(&src, &target);
    assert_eq!(*one.get_pixel(99, 50), Rgb(HIGHLIGHT_COLOR));
  }

  #[test]
  fn label_text_is_rendered_in_contrast_color() {
    let draw = Draw::with_system_font();
    let Some(font) = draw.font.clone() else {
      eprintln!("未找到系统字体，跳过文字渲染检查");
      return;
    };
    let src = source(200, 160);
    let target = det(16, "dog", [20.0, 60.0, 120.0, 150.0]);
    let set = DetectionSet::from(vec![target.clone()]);

    let first = draw.draw_all(&src, &set);
    let second = draw.draw_all(&src, &set);
    assert_eq!(first.as_raw(), second.as_raw());
    assert_ne!(
      first.as_raw(),
      Draw::without_font().draw_all(&src, &set).as_raw()
    );

    let background = draw.class_color(16);
    let text = contrast_color(background);
    let luminance =
      |p: &Rgb<u8>| 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;

    // 线宽 2 时字号 16、内边距 2，标签位于边框上方
    let (tw, th) = text_size(PxScale::from(LABEL_FONT_SIZE), &font, &target.label());
    let (label_w, label_h) = (tw + 4, th + 4);
    let top = 60 - label_h;
    assert_eq!(*first.get_pixel(20, top), background);

    let text_pixels = (top..60)
      .flat_map(|y| (20..20 + label_w).map(move |x| (x, y)))
      .filter(|&(x, y)| (luminance(first.get_pixel(x, y)) - luminance(&text)).abs() < 60.0)
      .count();
    assert!(text_pixels > 0);
  }

  #[test]
  fn draw_one_is_bold_and_distinct() {
    let draw = Draw::without_font();
    let src = source(200, 160);
    let target = det(16, "dog", [20.0, 60.0, 120.0, 150.0]);
    let other = det(15, "cat", [130.0, 10.0, 190.0, 80.0]);

    let all = draw.draw_all(&src, &DetectionSet::from(vec![target.clone(), other]));
    let one = draw.draw_one(&src, &target);

    let thin = line_width(200, 160);
    assert_eq!(*one.get_pixel(20 + thin as u32, 100), Rgb(HIGHLIGHT_COLOR));
    assert_eq!(*all.get_pixel(20 + thin as u32, 100), BACKGROUND);
    // 其他目标不绘制
    assert_eq!(*one.get_pixel(190, 45), BACKGROUND);
    assert_eq!(one.as_raw(), draw.draw_one(&src, &target).as_raw());
  }

  #[test]
  fn line_width_scales_with_image() {
    assert_eq!(line_width(200, 160), 2);
    assert_eq!(line_width(4000, 3000), 11);
  }

  #[test]
  fn contrast_picks_readable_text() {
    assert_eq!(contrast_color(Rgb([255, 255, 0])), Rgb([0, 0, 0]));
    assert_eq!(contrast_color(Rgb([0, 0, 200])), Rgb([255, 255, 255]));
  }

  #[test]
  fn missing_font_file_is_reported() {
    assert!(matches!(
      Draw::with_font_file("/nonexistent/font.ttf"),
      Err(DrawError::IoError(..))
    ));
  }
}
