// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/publish.rs - 消息总线发布
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl,
  config::NodeConfig,
  extract::{WheelCoordinate, flatten},
  frame::Frame,
};

mod json_lines;
pub use self::json_lines::{JsonLinesBus, JsonLinesBusError};

#[cfg(feature = "ros2")]
mod ros2;
#[cfg(feature = "ros2")]
pub use self::ros2::{Ros2Bus, Ros2BusError};

/// 消息时间戳
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stamp {
  pub sec: i32,
  pub nanosec: u32,
}

impl Stamp {
  pub fn now() -> Self {
    let now = Utc::now();
    Self {
      sec: now.timestamp() as i32,
      nanosec: now.timestamp_subsec_nanos(),
    }
  }
}

/// 轮子坐标消息，data 为 [x0, y0, x1, y1, ...]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateMessage {
  pub data: Vec<f32>,
}

/// 图像消息
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMessage {
  pub stamp: Stamp,
  pub frame_id: String,
  pub width: u32,
  pub height: u32,
  pub encoding: String,
  pub step: u32,
  pub data: Vec<u8>,
}

impl ImageMessage {
  pub fn from_frame(frame: &Frame, frame_id: &str) -> Self {
    Self {
      stamp: Stamp::now(),
      frame_id: frame_id.to_string(),
      width: frame.width(),
      height: frame.height(),
      encoding: frame.encoding().to_string(),
      step: frame.step(),
      data: frame.as_nhwc().to_vec(),
    }
  }
}

/// 消息总线，只负责发送，序列化与传输由具体实现决定
pub trait Bus {
  type Error: std::fmt::Display;

  fn send_coordinates(&mut self, topic: &str, message: &CoordinateMessage) -> Result<(), Self::Error>;
  fn send_image(&mut self, topic: &str, message: &ImageMessage) -> Result<(), Self::Error>;
}

impl<B: Bus + ?Sized> Bus for Box<B> {
  type Error = B::Error;

  fn send_coordinates(&mut self, topic: &str, message: &CoordinateMessage) -> Result<(), Self::Error> {
    (**self).send_coordinates(topic, message)
  }

  fn send_image(&mut self, topic: &str, message: &ImageMessage) -> Result<(), Self::Error> {
    (**self).send_image(topic, message)
  }
}

/// 向总线发布坐标与图像。发送即忘，失败只记录日志，不重试
pub struct Publisher<B> {
  bus: B,
  coordinates_topic: String,
  image_topic: String,
  frame_id: String,
}

impl<B: Bus> Publisher<B> {
  pub fn new(bus: B, config: &NodeConfig) -> Self {
    Self {
      bus,
      coordinates_topic: config.coordinates_topic().to_string(),
      image_topic: config.image_topic().to_string(),
      frame_id: config.frame_id().to_string(),
    }
  }

  pub fn bus(&self) -> &B {
    &self.bus
  }

  /// 空坐标不发送，下游只会看到“没有消息”而不是空消息。返回是否发送成功
  pub fn publish_coordinates(&mut self, coordinates: &[WheelCoordinate]) -> bool {
    if coordinates.is_empty() {
      return false;
    }

    let message = CoordinateMessage {
      data: flatten(coordinates),
    };
    debug!(
      "发布 {} 个轮子坐标到 {}",
      coordinates.len(),
      self.coordinates_topic
    );
    match self.bus.send_coordinates(&self.coordinates_topic, &message) {
      Ok(()) => true,
      Err(e) => {
        warn!("发布坐标失败 ({}): {}", self.coordinates_topic, e);
        false
      }
    }
  }

  /// 每个节拍都发送，作为下游的画面心跳。返回是否发送成功
  pub fn publish_image(&mut self, frame: &Frame) -> bool {
    let message = ImageMessage::from_frame(frame, &self.frame_id);
    match self.bus.send_image(&self.image_topic, &message) {
      Ok(()) => true,
      Err(e) => {
        warn!("发布图像失败 ({}): {}", self.image_topic, e);
        false
      }
    }
  }
}

#[derive(Error, Debug)]
pub enum BusError {
  #[error("JSON 总线错误: {0}")]
  JsonLinesBusError(#[from] JsonLinesBusError),
  #[cfg(feature = "ros2")]
  #[error("ROS2 总线错误: {0}")]
  Ros2BusError(#[from] Ros2BusError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum BusWrapper {
  JsonLines(JsonLinesBus),
  #[cfg(feature = "ros2")]
  Ros2(Ros2Bus),
}

impl FromUrl for BusWrapper {
  type Error = BusError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "ros2")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == Ros2Bus::SCHEME {
        return Ok(BusWrapper::Ros2(Ros2Bus::from_url(url)?));
      }
    }
    if JsonLinesBus::accepts(url) {
      return Ok(BusWrapper::JsonLines(JsonLinesBus::from_url(url)?));
    }
    Err(BusError::SchemeMismatch)
  }
}

impl Bus for BusWrapper {
  type Error = BusError;

  fn send_coordinates(&mut self, topic: &str, message: &CoordinateMessage) -> Result<(), Self::Error> {
    match self {
      BusWrapper::JsonLines(bus) => bus.send_coordinates(topic, message).map_err(BusError::from),
      #[cfg(feature = "ros2")]
      BusWrapper::Ros2(bus) => bus.send_coordinates(topic, message).map_err(BusError::from),
    }
  }

  fn send_image(&mut self, topic: &str, message: &ImageMessage) -> Result<(), Self::Error> {
    match self {
      BusWrapper::JsonLines(bus) => bus.send_image(topic, message).map_err(BusError::from),
      #[cfg(feature = "ros2")]
      BusWrapper::Ros2(bus) => bus.send_image(topic, message).map_err(BusError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Default)]
  struct RecordingBus {
    coordinates: Vec<(String, CoordinateMessage)>,
    images: Vec<(String, ImageMessage)>,
    fail: bool,
  }

  impl Bus for RecordingBus {
    type Error = String;

    fn send_coordinates(&mut self, topic: &str, message: &CoordinateMessage) -> Result<(), Self::Error> {
      if self.fail {
        return Err("link down".to_string());
      }
      self.coordinates.push((topic.to_string(), message.clone()));
      Ok(())
    }

    fn send_image(&mut self, topic: &str, message: &ImageMessage) -> Result<(), Self::Error> {
      if self.fail {
        return Err("link down".to_string());
      }
      self.images.push((topic.to_string(), message.clone()));
      Ok(())
    }
  }

  fn publisher(fail: bool) -> Publisher<RecordingBus> {
    let bus = RecordingBus {
      fail,
      ..Default::default()
    };
    Publisher::new(bus, &NodeConfig::default())
  }

  #[test]
  fn empty_coordinates_are_not_sent() {
    let mut publisher = publisher(false);
    assert!(!publisher.publish_coordinates(&[]));
    assert!(publisher.bus().coordinates.is_empty());
  }

  #[test]
  fn coordinates_are_flattened_in_order() {
    let mut publisher = publisher(false);
    let coords = [
      WheelCoordinate { x: 1.0, y: 2.0 },
      WheelCoordinate { x: 3.0, y: 4.0 },
    ];
    assert!(publisher.publish_coordinates(&coords));
    let (topic, message) = &publisher.bus().coordinates[0];
    assert_eq!(topic, "wheel_coordinates");
    assert_eq!(message.data, vec![1.0, 2.0, 3.0, 4.0]);
  }

  #[test]
  fn image_message_describes_frame() {
    let mut publisher = publisher(false);
    assert!(publisher.publish_image(&Frame::blank(4, 2)));
    let (topic, message) = &publisher.bus().images[0];
    assert_eq!(topic, "captured_image");
    assert_eq!((message.width, message.height, message.step), (4, 2, 12));
    assert_eq!(message.encoding, "rgb8");
    assert_eq!(message.frame_id, "camera");
    assert_eq!(message.data.len(), 24);
  }

  #[test]
  fn bus_failures_are_swallowed() {
    let mut publisher = publisher(true);
    assert!(!publisher.publish_coordinates(&[WheelCoordinate { x: 1.0, y: 1.0 }]));
    assert!(!publisher.publish_image(&Frame::blank(2, 2)));
    assert!(publisher.bus().coordinates.is_empty());
    assert!(publisher.bus().images.is_empty());
  }
}
