// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/frame.rs - 帧定义
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

use image::RgbImage;

pub const RGB_CHANNELS: usize = 3;

/// 总线上的图像编码，所有输入源都输出 RGB 顺序
pub const ENCODING: &str = "rgb8";

/// 一次采集得到的帧，NHWC 布局，每通道 8 位
#[derive(Debug, Clone)]
pub struct Frame {
  /// 图像数据
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒，自输入源启动起）
  pub timestamp_ms: u64,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  /// 全零帧，主要用于测试和占位
  pub fn blank(width: u32, height: u32) -> Self {
    Self::new(RgbImage::new(width, height), 0, 0)
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  /// 每行字节数
  pub fn step(&self) -> u32 {
    self.width() * RGB_CHANNELS as u32
  }

  pub fn encoding(&self) -> &'static str {
    ENCODING
  }

  pub fn as_nhwc(&self) -> &[u8] {
    self.image.as_raw()
  }
}

impl AsMut<RgbImage> for Frame {
  fn as_mut(&mut self) -> &mut RgbImage {
    &mut self.image
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_frame_geometry() {
    let frame = Frame::blank(64, 48);
    assert_eq!(frame.width(), 64);
    assert_eq!(frame.height(), 48);
    assert_eq!(frame.step(), 64 * 3);
    assert_eq!(frame.as_nhwc().len(), 64 * 48 * 3);
    assert_eq!(frame.encoding(), "rgb8");
  }
}
