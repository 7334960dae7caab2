// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/input.rs - 相机/图像输入
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

use thiserror::Error;

use crate::{FromUrl, frame::Frame};

#[cfg(feature = "read_image_file")]
mod image_file;
#[cfg(feature = "read_image_file")]
pub use self::image_file::{ImageFileSource, ImageFileSourceError};

#[cfg(feature = "v4l_input")]
mod v4l2_source;
#[cfg(feature = "v4l_input")]
pub use self::v4l2_source::{V4l2Source, V4l2SourceError, yuyv_to_rgb};

/// 启动阶段的错误，对节点来说是致命的
#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileSourceError(#[from] ImageFileSourceError),
  #[cfg(feature = "v4l_input")]
  #[error("V4L2 input error: {0}")]
  V4l2SourceError(#[from] V4l2SourceError),
  #[error("Capture device unavailable: {0}")]
  DeviceUnavailable(String),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

/// 运行期的采集错误，只影响当前节拍
#[derive(Error, Debug, PartialEq)]
pub enum CaptureError {
  #[error("输入源未启动")]
  NotStarted,
  #[error("读取帧失败: {0}")]
  Read(String),
  #[error("缓冲区大小不匹配: 期望 {expected}, 实际 {actual}")]
  BufferSize { expected: usize, actual: usize },
}

/// 帧来源
pub trait FrameSource {
  /// 打开设备并（重新）应用帧尺寸
  fn start(&mut self) -> Result<(), InputError>;
  /// 释放设备，可重复调用
  fn stop(&mut self);
  fn is_started(&self) -> bool;
  /// 当前帧尺寸（启动后为设备协商结果）
  fn frame_size(&self) -> (u32, u32);
  fn capture_frame(&mut self) -> Result<Frame, CaptureError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
  fn start(&mut self) -> Result<(), InputError> {
    (**self).start()
  }

  fn stop(&mut self) {
    (**self).stop()
  }

  fn is_started(&self) -> bool {
    (**self).is_started()
  }

  fn frame_size(&self) -> (u32, u32) {
    (**self).frame_size()
  }

  fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
    (**self).capture_frame()
  }
}

pub enum InputWrapper {
  #[cfg(feature = "v4l_input")]
  V4l2(V4l2Source),
  #[cfg(feature = "read_image_file")]
  ImageFile(ImageFileSource),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "v4l_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == V4l2Source::SCHEME {
        return Ok(InputWrapper::V4l2(V4l2Source::from_url(url)?));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileSource::SCHEME {
        return Ok(InputWrapper::ImageFile(ImageFileSource::from_url(url)?));
      }
    }
    let _ = url;
    Err(InputError::SchemeMismatch)
  }
}

impl InputWrapper {
  pub fn with_frame_size(self, width: u32, height: u32) -> Self {
    match self {
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l2(source) => InputWrapper::V4l2(source.with_frame_size(width, height)),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageFile(source) => {
        InputWrapper::ImageFile(source.with_frame_size(width, height))
      }
    }
  }

  fn inner(&self) -> &dyn FrameSource {
    match self {
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l2(source) => source as &dyn FrameSource,
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageFile(source) => source as &dyn FrameSource,
    }
  }

  fn inner_mut(&mut self) -> &mut dyn FrameSource {
    match self {
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l2(source) => source as &mut dyn FrameSource,
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageFile(source) => source as &mut dyn FrameSource,
    }
  }
}

impl FrameSource for InputWrapper {
  fn start(&mut self) -> Result<(), InputError> {
    self.inner_mut().start()
  }

  fn stop(&mut self) {
    self.inner_mut().stop()
  }

  fn is_started(&self) -> bool {
    self.inner().is_started()
  }

  fn frame_size(&self) -> (u32, u32) {
    self.inner().frame_size()
  }

  fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
    self.inner_mut().capture_frame()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = url::Url::parse("rtsp://camera.local/stream").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch)
    ));
  }
}
