// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

use wheelcam::config::{ConfigError, NodeConfig};

/// Wheelcam 轮子检测节点
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型，例如 yolo26:///opt/models/wheel.rknn
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源
  /// - V4L2: v4l:///dev/video0
  /// - 图片: image:///path/to/frame.png
  #[arg(long, value_name = "SOURCE", default_value = "v4l:///dev/video0")]
  pub input: Url,

  /// 消息总线
  /// - ros2://camera_ai_node?namespace=robot
  /// - jsonl:///var/log/wheelcam/messages.jsonl
  /// - stdout://
  #[arg(long, value_name = "BUS", default_value = "stdout://")]
  pub bus: Url,

  /// 可选的本地显示或记录输出
  /// - display://?fps=10
  /// - folder:///path/to/dir?every=10
  #[arg(long, value_name = "OUTPUT")]
  pub display: Option<Url>,

  /// 置信度阈值 (0.0 - 1.0)，严格大于才算命中
  #[arg(long, default_value_t = 0.5, value_name = "THRESHOLD")]
  pub confidence: f32,

  #[arg(long, default_value_t = 640)]
  pub width: u32,

  #[arg(long, default_value_t = 480)]
  pub height: u32,

  /// 节拍周期（毫秒）
  #[arg(long, default_value_t = 100, value_name = "MS")]
  pub period_ms: u64,

  #[arg(long, default_value = "wheel_coordinates", value_name = "TOPIC")]
  pub coordinates_topic: String,

  #[arg(long, default_value = "captured_image", value_name = "TOPIC")]
  pub image_topic: String,

  #[arg(long, default_value = "camera")]
  pub frame_id: String,

  /// 标签字体 (TTF/OTF)，不指定时尝试系统字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 最大节拍数，不指定则一直运行到中断
  #[arg(long, value_name = "COUNT")]
  pub max_ticks: Option<usize>,
}

impl Args {
  pub fn node_config(&self) -> Result<NodeConfig, ConfigError> {
    NodeConfig::default()
      .with_confidence(self.confidence)
      .with_frame_size(self.width, self.height)
      .with_tick_period(Duration::from_millis(self.period_ms))
      .with_topics(self.coordinates_topic.clone(), self.image_topic.clone())
      .with_frame_id(self.frame_id.clone())
      .with_font_path(self.font.clone())
      .validate()
  }
}
