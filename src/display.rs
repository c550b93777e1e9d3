// 该文件是 Chakan （查看） 项目的一部分。
// src/display.rs - 预览缩放与坐标映射
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

use image::{RgbImage, imageops::FilterType};

pub const DEFAULT_MAX_PREVIEW_WIDTH: u32 = 800;
pub const DEFAULT_MAX_PREVIEW_HEIGHT: u32 = 600;

/// 仅用于屏幕预览的缩放，永远不作用于已保存的检测坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
  pub scale: f32,
  pub width: u32,
  pub height: u32,
}

/// 计算把 width x height 等比放入 max_width x max_height 的缩放，不放大
pub fn compute_transform(width: u32, height: u32, max_width: u32, max_height: u32) -> DisplayTransform {
  let (max_width, max_height) = (max_width.max(1), max_height.max(1));
  if width == 0 || height == 0 || (width <= max_width && height <= max_height) {
    return DisplayTransform {
      scale: 1.0,
      width,
      height,
    };
  }

  let scale = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
  let fit = |side: u32, max: u32| ((side as f64 * scale).round() as u32).clamp(1, max);

  DisplayTransform {
    scale: scale as f32,
    width: fit(width, max_width),
    height: fit(height, max_height),
  }
}

impl DisplayTransform {
  pub fn is_identity(&self) -> bool {
    self.scale >= 1.0
  }

  /// 生成预览图，原图不变
  pub fn preview(&self, image: &RgbImage) -> RgbImage {
    if self.is_identity() {
      return image.clone();
    }
    image::imageops::resize(image, self.width, self.height, FilterType::Triangle)
  }

  pub fn to_display(&self, point: [f32; 2]) -> [f32; 2] {
    [point[0] * self.scale, point[1] * self.scale]
  }

  pub fn to_source(&self, point: [f32; 2]) -> [f32; 2] {
    [point[0] / self.scale, point[1] / self.scale]
  }
}
