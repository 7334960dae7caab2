// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/config.rs - 节点配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(100);
pub const DEFAULT_COORDINATES_TOPIC: &str = "wheel_coordinates";
pub const DEFAULT_IMAGE_TOPIC: &str = "captured_image";
pub const DEFAULT_FRAME_ID: &str = "camera";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值必须在 [0, 1] 之间, 实际为 {0}")]
  ConfidenceOutOfRange(f32),
  #[error("帧尺寸无效: {0}x{1}")]
  InvalidFrameSize(u32, u32),
  #[error("节拍周期不能为 0")]
  ZeroTickPeriod,
  #[error("话题名称不能为空")]
  EmptyTopic,
}

/// 节点配置，构造后在整个进程生命周期内不变
#[derive(Debug, Clone)]
pub struct NodeConfig {
  confidence: f32,
  frame_width: u32,
  frame_height: u32,
  tick_period: Duration,
  coordinates_topic: String,
  image_topic: String,
  frame_id: String,
  font_path: Option<PathBuf>,
}

impl Default for NodeConfig {
  fn default() -> Self {
    Self {
      confidence: DEFAULT_CONFIDENCE,
      frame_width: DEFAULT_FRAME_WIDTH,
      frame_height: DEFAULT_FRAME_HEIGHT,
      tick_period: DEFAULT_TICK_PERIOD,
      coordinates_topic: DEFAULT_COORDINATES_TOPIC.to_string(),
      image_topic: DEFAULT_IMAGE_TOPIC.to_string(),
      frame_id: DEFAULT_FRAME_ID.to_string(),
      font_path: None,
    }
  }
}

impl NodeConfig {
  pub fn with_confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
    self.frame_width = width;
    self.frame_height = height;
    self
  }

  pub fn with_tick_period(mut self, period: Duration) -> Self {
    self.tick_period = period;
    self
  }

  pub fn with_topics(mut self, coordinates: impl Into<String>, image: impl Into<String>) -> Self {
    self.coordinates_topic = coordinates.into();
    self.image_topic = image.into();
    self
  }

  pub fn with_frame_id(mut self, frame_id: impl Into<String>) -> Self {
    self.frame_id = frame_id.into();
    self
  }

  pub fn with_font_path(mut self, font_path: Option<PathBuf>) -> Self {
    self.font_path = font_path;
    self
  }

  /// 检查配置取值
  pub fn validate(self) -> Result<Self, ConfigError> {
    if !(0.0..=1.0).contains(&self.confidence) {
      return Err(ConfigError::ConfidenceOutOfRange(self.confidence));
    }
    if self.frame_width == 0 || self.frame_height == 0 {
      return Err(ConfigError::InvalidFrameSize(
        self.frame_width,
        self.frame_height,
      ));
    }
    if self.tick_period.is_zero() {
      return Err(ConfigError::ZeroTickPeriod);
    }
    if self.coordinates_topic.is_empty() || self.image_topic.is_empty() {
      return Err(ConfigError::EmptyTopic);
    }
    Ok(self)
  }

  pub fn confidence(&self) -> f32 {
    self.confidence
  }

  pub fn frame_size(&self) -> (u32, u32) {
    (self.frame_width, self.frame_height)
  }

  pub fn tick_period(&self) -> Duration {
    self.tick_period
  }

  pub fn coordinates_topic(&self) -> &str {
    &self.coordinates_topic
  }

  pub fn image_topic(&self) -> &str {
    &self.image_topic
  }

  pub fn frame_id(&self) -> &str {
    &self.frame_id
  }

  pub fn font_path(&self) -> Option<&PathBuf> {
    self.font_path.as_ref()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_node_contract() {
    let config = NodeConfig::default().validate().unwrap();
    assert_eq!(config.confidence(), 0.5);
    assert_eq!(config.frame_size(), (640, 480));
    assert_eq!(config.tick_period(), Duration::from_millis(100));
    assert_eq!(config.coordinates_topic(), "wheel_coordinates");
    assert_eq!(config.image_topic(), "captured_image");
  }

  #[test]
  fn rejects_bad_values() {
    assert_eq!(
      NodeConfig::default().with_confidence(1.5).validate().unwrap_err(),
      ConfigError::ConfidenceOutOfRange(1.5)
    );
    assert_eq!(
      NodeConfig::default().with_frame_size(0, 480).validate().unwrap_err(),
      ConfigError::InvalidFrameSize(0, 480)
    );
    assert_eq!(
      NodeConfig::default()
        .with_tick_period(Duration::ZERO)
        .validate()
        .unwrap_err(),
      ConfigError::ZeroTickPeriod
    );
    assert_eq!(
      NodeConfig::default().with_topics("", "img").validate().unwrap_err(),
      ConfigError::EmptyTopic
    );
  }
}
