// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/node.rs - 感知节点
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! 每个节拍依次执行：采集 → 推理 → 标注（+ 本地显示）→ 提取坐标 →
//! 发布坐标 → 发布图像。采集失败时跳过本拍其余步骤。

use std::convert::Infallible;
use std::fmt::Display;

use tracing::{debug, error, info, warn};

use crate::{
  config::NodeConfig,
  extract::extract_wheel_coordinates,
  frame::Frame,
  input::{FrameSource, InputError},
  model::Model,
  output::{FrameSink, draw::Draw},
  publish::{Bus, Publisher},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
  Stopped,
  Running,
}

/// 单个节拍的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
  /// 没有拿到帧（未启动或采集失败），本拍未做任何处理
  Skipped,
  /// 推理失败，本拍不发布
  InferenceFailed,
  /// 已发布图像，wheels 为本拍检测到的轮子数量
  Published { wheels: usize },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NodeStats {
  pub ticks: u64,
  pub skipped: u64,
  pub inference_failures: u64,
  pub coordinate_messages: u64,
  pub image_messages: u64,
}

/// 无本地显示
pub struct Headless;

impl FrameSink for Headless {
  type Error = Infallible;

  fn show(&mut self, _frame: &Frame) -> Result<(), Self::Error> {
    Ok(())
  }
}

/// 感知节点，独占输入源与模型。Drop 时释放输入源
pub struct Node<S: FrameSource, M, B, K = Headless> {
  config: NodeConfig,
  source: S,
  model: M,
  draw: Draw,
  publisher: Publisher<B>,
  sink: Option<K>,
  state: NodeState,
  stats: NodeStats,
}

impl<S, M, B> Node<S, M, B, Headless>
where
  S: FrameSource,
  M: Model,
  M::Error: Display,
  B: Bus,
{
  pub fn new(config: NodeConfig, source: S, model: M, bus: B) -> Self {
    Self::build(config, source, model, bus, None)
  }
}

impl<S, M, B, K> Node<S, M, B, K>
where
  S: FrameSource,
  M: Model,
  M::Error: Display,
  B: Bus,
  K: FrameSink,
  K::Error: Display,
{
  /// 带本地显示的节点，显示失败不影响发布
  pub fn with_sink(config: NodeConfig, source: S, model: M, bus: B, sink: K) -> Self {
    Self::build(config, source, model, bus, Some(sink))
  }

  fn build(config: NodeConfig, source: S, model: M, bus: B, sink: Option<K>) -> Self {
    let draw =
      Draw::new(config.confidence()).with_font_path(config.font_path().map(|p| p.as_path()));
    let publisher = Publisher::new(bus, &config);
    Self {
      config,
      source,
      model,
      draw,
      publisher,
      sink,
      state: NodeState::Stopped,
      stats: NodeStats::default(),
    }
  }

  pub fn config(&self) -> &NodeConfig {
    &self.config
  }

  pub fn state(&self) -> NodeState {
    self.state
  }

  pub fn stats(&self) -> NodeStats {
    self.stats
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  pub fn publisher(&self) -> &Publisher<B> {
    &self.publisher
  }

  /// 打开输入源。设备不可用是致命错误
  pub fn start(&mut self) -> Result<(), InputError> {
    if self.state == NodeState::Running {
      return Ok(());
    }

    self.source.start()?;
    let (width, height) = self.source.frame_size();
    info!(
      "节点启动: {}x{}, 阈值 {}, 周期 {:?}",
      width,
      height,
      self.config.confidence(),
      self.config.tick_period()
    );
    self.state = NodeState::Running;
    Ok(())
  }

  /// 执行一个节拍
  pub fn tick(&mut self) -> TickOutcome {
    if self.state != NodeState::Running {
      debug!("节点未运行，跳过节拍");
      return TickOutcome::Skipped;
    }
    self.stats.ticks += 1;

    let mut frame = match self.source.capture_frame() {
      Ok(frame) => frame,
      Err(e) => {
        warn!("采集失败，跳过本拍: {}", e);
        self.stats.skipped += 1;
        return TickOutcome::Skipped;
      }
    };

    let detections = match self.model.infer(&frame) {
      Ok(detections) => detections,
      Err(e) => {
        error!("第 {} 帧推理失败: {}", frame.index, e);
        self.stats.inference_failures += 1;
        return TickOutcome::InferenceFailed;
      }
    };
    debug!("第 {} 帧: {} 个检测结果", frame.index, detections.len());

    self.draw.draw_detections(&mut frame, &detections);
    if let Some(sink) = self.sink.as_mut()
      && let Err(e) = sink.show(&frame)
    {
      warn!("本地显示失败: {}", e);
    }

    let wheels = extract_wheel_coordinates(&detections, self.config.confidence());
    if self.publisher.publish_coordinates(&wheels) {
      self.stats.coordinate_messages += 1;
    }
    if self.publisher.publish_image(&frame) {
      self.stats.image_messages += 1;
    }

    TickOutcome::Published {
      wheels: wheels.len(),
    }
  }

  /// 释放输入源，可重复调用
  pub fn shutdown(&mut self) {
    if self.state == NodeState::Stopped {
      return;
    }

    self.source.stop();
    self.state = NodeState::Stopped;
    info!(
      "节点停止: 共 {} 拍, 跳过 {}, 推理失败 {}, 坐标消息 {}, 图像消息 {}",
      self.stats.ticks,
      self.stats.skipped,
      self.stats.inference_failures,
      self.stats.coordinate_messages,
      self.stats.image_messages
    );
  }
}

impl<S: FrameSource, M, B, K> Drop for Node<S, M, B, K> {
  fn drop(&mut self) {
    if self.state == NodeState::Running {
      self.source.stop();
      self.state = NodeState::Stopped;
    }
  }
}
