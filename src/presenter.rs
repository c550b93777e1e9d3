// 该文件是 Chakan （查看） 项目的一部分。
// src/presenter.rs - 会话状态机与结果展示
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

use std::{fmt, path::Path, rc::Rc, str::FromStr};

use image::RgbImage;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  detection::{Detection, DetectionError, DetectionSet, run_detection},
  display::{
    DEFAULT_MAX_PREVIEW_HEIGHT, DEFAULT_MAX_PREVIEW_WIDTH, DisplayTransform, compute_transform,
  },
  input::{LoadError, SourceImage},
  model::{Model, ModelOutput},
  output::{
    DEFAULT_JPEG_QUALITY, SaveImageFileError, SaveImageFileOutput,
    draw::Draw,
    record::{Record, RecordError},
  },
};

mod list;
pub use self::list::{LIST_SEPARATOR, ListEntry, list_entries};

/// 保存时使用的检测结果来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavePolicy {
  /// 复用会话中已还原到原图坐标的检测结果
  #[default]
  Reuse,
  /// 保存前在原图上重新推理一次
  Redetect,
}

impl FromStr for SavePolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "reuse" => Ok(SavePolicy::Reuse),
      "redetect" => Ok(SavePolicy::Redetect),
      other => Err(format!("未知的保存策略: {}（可选 reuse, redetect）", other)),
    }
  }
}

#[derive(Debug, Clone)]
pub struct PresenterConfig {
  pub max_preview_width: u32,
  pub max_preview_height: u32,
  pub save_policy: SavePolicy,
  pub jpeg_quality: u8,
}

impl Default for PresenterConfig {
  fn default() -> Self {
    Self {
      max_preview_width: DEFAULT_MAX_PREVIEW_WIDTH,
      max_preview_height: DEFAULT_MAX_PREVIEW_HEIGHT,
      save_policy: SavePolicy::default(),
      jpeg_quality: DEFAULT_JPEG_QUALITY,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Open,
  Detect,
  Select,
  Save,
  Export,
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Action::Open => "open",
      Action::Detect => "detect",
      Action::Select => "select",
      Action::Save => "save",
      Action::Export => "export",
    };
    f.write_str(name)
  }
}

/// 会话状态，每次转换整体替换
#[derive(Debug, Clone, Default)]
pub enum SessionState {
  #[default]
  Empty,
  Loaded {
    source: Rc<SourceImage>,
  },
  Detected {
    source: Rc<SourceImage>,
    detections: Rc<DetectionSet>,
  },
  Highlighted {
    source: Rc<SourceImage>,
    detections: Rc<DetectionSet>,
    selected: usize,
  },
}

impl SessionState {
  pub fn name(&self) -> &'static str {
    match self {
      SessionState::Empty => "Empty",
      SessionState::Loaded { .. } => "Loaded",
      SessionState::Detected { .. } => "Detected",
      SessionState::Highlighted { .. } => "Highlighted",
    }
  }

  pub fn source(&self) -> Option<&Rc<SourceImage>> {
    match self {
      SessionState::Empty => None,
      SessionState::Loaded { source }
      | SessionState::Detected { source, .. }
      | SessionState::Highlighted { source, .. } => Some(source),
    }
  }

  pub fn detections(&self) -> Option<&Rc<DetectionSet>> {
    match self {
      SessionState::Empty | SessionState::Loaded { .. } => None,
      SessionState::Detected { detections, .. } | SessionState::Highlighted { detections, .. } => {
        Some(detections)
      }
    }
  }

  pub fn selected(&self) -> Option<usize> {
    match self {
      SessionState::Highlighted { selected, .. } => Some(*selected),
      _ => None,
    }
  }
}

/// 当前状态下各操作是否可用，供界面启用或禁用按钮
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
  pub detect: bool,
  pub save: bool,
  pub select: bool,
}

impl Availability {
  pub fn of(state: &SessionState) -> Self {
    let detected = state.detections().is_some();
    Self {
      detect: state.source().is_some(),
      save: detected,
      select: detected,
    }
  }

  pub fn allows(&self, action: Action) -> bool {
    match action {
      Action::Open => true,
      Action::Detect => self.detect,
      Action::Select => self.select,
      Action::Save | Action::Export => self.save,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
  Highlighted(usize),
  Ignored,
}

#[derive(Error, Debug)]
pub enum PresenterError {
  #[error("当前状态 {state} 下不能执行 {action}")]
  Disabled {
    action: Action,
    state: &'static str,
  },
  #[error("图像加载失败: {0}")]
  LoadFailure(#[from] LoadError),
  #[error("目标检测失败: {0}")]
  DetectionFailure(#[from] DetectionError),
  #[error("保存失败: {0}")]
  SaveFailure(#[from] SaveImageFileError),
  #[error("导出失败: {0}")]
  ExportFailure(#[from] RecordError),
}

pub struct Presenter<M> {
  model: M,
  draw: Draw,
  config: PresenterConfig,
  state: SessionState,
}

impl<M, E> Presenter<M>
where
  M: Model<Input = SourceImage, Output = ModelOutput, Error = E>,
  E: std::error::Error + Send + Sync + 'static,
{
  pub fn new(model: M, draw: Draw, config: PresenterConfig) -> Self {
    Self {
      model,
      draw,
      config,
      state: SessionState::Empty,
    }
  }

  pub fn state(&self) -> &SessionState {
    &self.state
  }

  pub fn config(&self) -> &PresenterConfig {
    &self.config
  }

  pub fn availability(&self) -> Availability {
    Availability::of(&self.state)
  }

  fn require(&self, action: Action) -> Result<(), PresenterError> {
    if self.availability().allows(action) {
      Ok(())
    } else {
      warn!("操作 {} 在状态 {} 下不可用", action, self.state.name());
      Err(self.disabled(action))
    }
  }

  fn disabled(&self, action: Action) -> PresenterError {
    PresenterError::Disabled {
      action,
      state: self.state.name(),
    }
  }

  fn transition(&mut self, next: SessionState) {
    info!("状态转换: {} -> {}", self.state.name(), next.name());
    self.state = next;
  }

  /// 打开新图像，丢弃之前的检测结果与选中项；失败时状态不变
  pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), PresenterError> {
    let source = SourceImage::open(path.as_ref()).map_err(|e| {
      error!("无法打开图像 {}: {}", path.as_ref().display(), e);
      e
    })?;
    self.transition(SessionState::Loaded {
      source: Rc::new(source),
    });
    Ok(())
  }

  /// 重新推理并整体替换检测结果，选中项随之失效；失败时保留之前的结果
  pub fn detect(&mut self) -> Result<usize, PresenterError> {
    self.require(Action::Detect)?;
    let Some(source) = self.state.source().cloned() else {
      return Err(self.disabled(Action::Detect));
    };

    let detections = run_detection(&self.model, &source).map_err(|e| {
      error!("目标检测失败: {}", e);
      e
    })?;
    let count = detections.len();
    self.transition(SessionState::Detected {
      source,
      detections: Rc::new(detections),
    });
    Ok(count)
  }

  /// 按列表位置选择，只有检测行会产生高亮
  pub fn select(&mut self, position: usize) -> Result<Selection, PresenterError> {
    self.require(Action::Select)?;
    let entry = self.entries().into_iter().nth(position);
    match entry.and_then(|entry| entry.detection_index()) {
      Some(index) => {
        self.highlight(index);
        Ok(Selection::Highlighted(index))
      }
      None => {
        info!("列表第 {} 行不是检测结果，忽略", position);
        Ok(Selection::Ignored)
      }
    }
  }

  /// 按预览图上的点击位置选择，包含该点的最小检测框优先
  pub fn click(&mut self, x: f32, y: f32) -> Result<Selection, PresenterError> {
    self.require(Action::Select)?;
    let (Some(transform), Some(detections)) = (self.transform(), self.state.detections()) else {
      return Ok(Selection::Ignored);
    };

    let [sx, sy] = transform.to_source([x, y]);
    let hit = detections
      .iter()
      .enumerate()
      .filter(|(_, det)| det.bbox().contains(sx, sy))
      .min_by(|(_, a), (_, b)| a.bbox().area().total_cmp(&b.bbox().area()))
      .map(|(index, _)| index);

    match hit {
      Some(index) => {
        self.highlight(index);
        Ok(Selection::Highlighted(index))
      }
      None => {
        info!("预览点 ({}, {}) 未命中任何检测框", x, y);
        Ok(Selection::Ignored)
      }
    }
  }

  fn highlight(&mut self, index: usize) {
    let (Some(source), Some(detections)) = (
      self.state.source().cloned(),
      self.state.detections().cloned(),
    ) else {
      return;
    };
    if let Some(det) = detections.get(index) {
      info!("高亮第 {} 个目标: {}", index, det.label());
    }
    self.transition(SessionState::Highlighted {
      source,
      detections,
      selected: index,
    });
  }

  /// 以原图分辨率保存全部检测框，不改变会话状态
  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PresenterError> {
    self.require(Action::Save)?;
    let (Some(source), Some(stored)) = (self.state.source(), self.state.detections()) else {
      return Err(self.disabled(Action::Save));
    };

    let fresh;
    let detections = match self.config.save_policy {
      SavePolicy::Reuse => stored.as_ref(),
      SavePolicy::Redetect => {
        info!("保存前在原图上重新推理");
        fresh = run_detection(&self.model, source)?;
        &fresh
      }
    };

    let annotated = self.draw.draw_all(source.image(), detections);
    SaveImageFileOutput::new(path.as_ref())
      .with_jpeg_quality(self.config.jpeg_quality)
      .save(&annotated)
      .map_err(|e| {
        error!("保存 {} 失败: {}", path.as_ref().display(), e);
        e
      })?;
    Ok(())
  }

  /// 导出当前检测结果记录（`.txt` 或 `.json`）
  pub fn export(&self, path: impl AsRef<Path>) -> Result<(), PresenterError> {
    self.require(Action::Export)?;
    let (Some(source), Some(detections)) = (self.state.source(), self.state.detections()) else {
      return Err(self.disabled(Action::Export));
    };
    Record::default().record(detections, source.width(), source.height(), path.as_ref())?;
    Ok(())
  }

  /// 与当前 DetectionSet 对齐的列表行
  pub fn entries(&self) -> Vec<ListEntry> {
    self
      .state
      .detections()
      .map(|detections| list_entries(detections))
      .unwrap_or_default()
  }

  pub fn selected(&self) -> Option<&Detection> {
    let index = self.state.selected()?;
    self.state.detections()?.get(index)
  }

  pub fn transform(&self) -> Option<DisplayTransform> {
    let source = self.state.source()?;
    Some(compute_transform(
      source.width(),
      source.height(),
      self.config.max_preview_width,
      self.config.max_preview_height,
    ))
  }

  /// 当前视图的原图分辨率渲染结果
  pub fn render(&self) -> Option<RgbImage> {
    let image = match &self.state {
      SessionState::Empty => return None,
      SessionState::Loaded { source } => source.image().clone(),
      SessionState::Detected { source, detections } => {
        self.draw.draw_all(source.image(), detections)
      }
      SessionState::Highlighted {
        source,
        detections,
        selected,
      } => match detections.get(*selected) {
        Some(det) => self.draw.draw_one(source.image(), det),
        None => self.draw.draw_all(source.image(), detections),
      },
    };
    Some(image)
  }

  /// 缩放到预览尺寸的当前视图，仅用于显示
  pub fn preview(&self) -> Option<RgbImage> {
    let transform = self.transform()?;
    self.render().map(|image| transform.preview(&image))
  }
}
