// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/publish/ros2.rs - ROS2 总线
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::HashMap;
use std::time::Duration;

use r2r::{
  Context, Node, QosProfile,
  builtin_interfaces::msg::Time,
  sensor_msgs::msg::Image,
  std_msgs::msg::{Float32MultiArray, Header},
};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  publish::{Bus, CoordinateMessage, ImageMessage},
  url_query,
};

const ROS2_QUEUE_DEPTH: usize = 10;
const ROS2_DEFAULT_NODE: &str = "camera_ai_node";

#[derive(Error, Debug)]
pub enum Ros2BusError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("ROS2 错误: {0}")]
  R2rError(#[from] r2r::Error),
}

/// 通过 r2r 发布到 ROS2 话题，发布者按话题名懒创建
pub struct Ros2Bus {
  node: Node,
  coordinates: HashMap<String, r2r::Publisher<Float32MultiArray>>,
  images: HashMap<String, r2r::Publisher<Image>>,
}

impl FromUrlWithScheme for Ros2Bus {
  const SCHEME: &'static str = "ros2";
}

impl FromUrl for Ros2Bus {
  type Error = Ros2BusError;

  /// `ros2://<node_name>?namespace=<ns>`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Ros2BusError::SchemeMismatch);
    }

    let name = url
      .host_str()
      .filter(|h| !h.is_empty())
      .unwrap_or(ROS2_DEFAULT_NODE)
      .to_string();
    let namespace: String = url_query(url, "namespace").unwrap_or_default();

    let ctx = Context::create()?;
    let node = Node::create(ctx, &name, &namespace)?;
    info!("ROS2 节点已创建: {} (namespace: '{}')", name, namespace);

    Ok(Self {
      node,
      coordinates: HashMap::new(),
      images: HashMap::new(),
    })
  }
}

fn qos() -> QosProfile {
  QosProfile::default().keep_last(ROS2_QUEUE_DEPTH)
}

impl Bus for Ros2Bus {
  type Error = Ros2BusError;

  fn send_coordinates(&mut self, topic: &str, message: &CoordinateMessage) -> Result<(), Self::Error> {
    if !self.coordinates.contains_key(topic) {
      let publisher = self.node.create_publisher::<Float32MultiArray>(topic, qos())?;
      self.coordinates.insert(topic.to_string(), publisher);
    }

    let msg = Float32MultiArray {
      data: message.data.clone(),
      ..Default::default()
    };
    if let Some(publisher) = self.coordinates.get(topic) {
      publisher.publish(&msg)?;
    }
    self.node.spin_once(Duration::ZERO);
    Ok(())
  }

  fn send_image(&mut self, topic: &str, message: &ImageMessage) -> Result<(), Self::Error> {
    if !self.images.contains_key(topic) {
      let publisher = self.node.create_publisher::<Image>(topic, qos())?;
      self.images.insert(topic.to_string(), publisher);
    }

    let msg = Image {
      header: Header {
        stamp: Time {
          sec: message.stamp.sec,
          nanosec: message.stamp.nanosec,
        },
        frame_id: message.frame_id.clone(),
      },
      height: message.height,
      width: message.width,
      encoding: message.encoding.clone(),
      is_bigendian: 0,
      step: message.step,
      data: message.data.clone(),
    };
    if let Some(publisher) = self.images.get(topic) {
      publisher.publish(&msg)?;
    }
    self.node.spin_once(Duration::ZERO);
    Ok(())
  }
}
