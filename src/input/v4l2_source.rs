// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/input/v4l2_source.rs - V4L2 摄像头输入源
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::pin::Pin;
use std::time::Instant;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH},
  frame::{Frame, RGB_CHANNELS},
  input::{CaptureError, FrameSource, InputError},
  url_path,
};

const V4L2_BUFFER_COUNT: u32 = 4;
const V4L2_DEFAULT_DEVICE: &str = "/dev/video0";

#[derive(Error, Debug)]
pub enum V4l2SourceError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("无法打开设备 {0}: {1}")]
  OpenDevice(String, std::io::Error),
  #[error("无法设置视频格式: {0}")]
  SetFormat(std::io::Error),
  #[error("无法创建捕获流: {0}")]
  Stream(std::io::Error),
  #[error("Unsupported pixel format: {0}")]
  UnsupportedPixelFormat(String),
}

/// 打开中的设备与其捕获流
///
/// v4l 的 Stream 需要引用 Device，用 Pin<Box> 固定 Device 的地址，
/// 从而可以在同一结构体内保存引用它的 Stream。
struct Session {
  device: Pin<Box<Device>>,
  stream: Option<Stream<'static>>,
  width: u32,
  height: u32,
}

impl Drop for Session {
  fn drop(&mut self) {
    // stream 必须先于 device 释放
    self.stream.take();
  }
}

/// V4L2 摄像头输入源
pub struct V4l2Source {
  device_path: String,
  width: u32,
  height: u32,
  session: Option<Session>,
  frame_index: u64,
  start_time: Instant,
}

impl FromUrlWithScheme for V4l2Source {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4l2Source {
  type Error = V4l2SourceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4l2SourceError::SchemaMismatch);
    }

    // v4l:///dev/video0
    let path = url_path(url);
    let device_path = if path.is_empty() || path == "/" {
      V4L2_DEFAULT_DEVICE.to_string()
    } else {
      path
    };

    Ok(Self::new(device_path))
  }
}

impl V4l2Source {
  pub fn new(device_path: impl Into<String>) -> Self {
    Self {
      device_path: device_path.into(),
      width: DEFAULT_FRAME_WIDTH,
      height: DEFAULT_FRAME_HEIGHT,
      session: None,
      frame_index: 0,
      start_time: Instant::now(),
    }
  }

  pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
    self.width = width;
    self.height = height;
    self
  }

  pub fn device_path(&self) -> &str {
    &self.device_path
  }

  fn open(&self) -> Result<Session, V4l2SourceError> {
    let device = Box::pin(
      Device::with_path(&self.device_path)
        .map_err(|e| V4l2SourceError::OpenDevice(self.device_path.clone(), e))?,
    );

    // 部分设备打开时会重置分辨率，所以每次打开后都要重新设置
    let mut format = device.format().map_err(V4l2SourceError::SetFormat)?;
    format.width = self.width;
    format.height = self.height;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device
      .set_format(&format)
      .map_err(V4l2SourceError::SetFormat)?;

    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(V4l2SourceError::UnsupportedPixelFormat(
        format.fourcc.to_string(),
      ));
    }
    if format.width != self.width || format.height != self.height {
      warn!(
        "设备协商的分辨率 {}x{} 与请求的 {}x{} 不一致",
        format.width, format.height, self.width, self.height
      );
    }

    let mut session = Session {
      device,
      stream: None,
      width: format.width,
      height: format.height,
    };

    // SAFETY: device 被 Pin<Box> 固定在堆上，不会移动；
    // stream 与 device 存于同一个 Session 中，并在 Drop 中先于 device 释放
    let device_ref: &Device = &session.device;
    let stream = unsafe {
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, V4L2_BUFFER_COUNT)
        .map_err(V4l2SourceError::Stream)?
    };
    session.stream = Some(stream);

    Ok(session)
  }
}

impl FrameSource for V4l2Source {
  fn start(&mut self) -> Result<(), InputError> {
    if self.session.is_some() {
      debug!("设备 {} 已经打开", self.device_path);
      return Ok(());
    }

    if !std::path::Path::new(&self.device_path).exists() {
      error!("摄像头设备不存在: {}", self.device_path);
      return Err(InputError::DeviceUnavailable(self.device_path.clone()));
    }

    info!("打开摄像头: {}", self.device_path);
    let session = self.open()?;
    info!(
      "摄像头已打开: {}x{} YUYV",
      session.width, session.height
    );

    self.session = Some(session);
    self.frame_index = 0;
    self.start_time = Instant::now();
    Ok(())
  }

  fn stop(&mut self) {
    if self.session.take().is_some() {
      info!("摄像头已释放: {}", self.device_path);
    }
  }

  fn is_started(&self) -> bool {
    self.session.is_some()
  }

  fn frame_size(&self) -> (u32, u32) {
    match &self.session {
      Some(session) => (session.width, session.height),
      None => (self.width, self.height),
    }
  }

  fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
    let session = self.session.as_mut().ok_or(CaptureError::NotStarted)?;
    let (width, height) = (session.width, session.height);
    let stream = session.stream.as_mut().ok_or(CaptureError::NotStarted)?;

    let (buffer, _meta) = stream
      .next()
      .map_err(|e| CaptureError::Read(e.to_string()))?;

    let rgb = yuyv_to_rgb(buffer);
    let expected = width as usize * height as usize * RGB_CHANNELS;
    let actual = rgb.len();
    let image = RgbImage::from_raw(width, height, rgb)
      .ok_or(CaptureError::BufferSize { expected, actual })?;

    let frame = Frame::new(
      image,
      self.frame_index,
      self.start_time.elapsed().as_millis() as u64,
    );
    self.frame_index += 1;
    Ok(frame)
  }
}

/// 将 YUYV 格式转换为 RGB
pub fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
  let mut rgb = Vec::with_capacity(yuyv.len() / 2 * RGB_CHANNELS);

  for chunk in yuyv.chunks_exact(4) {
    let y0 = chunk[0] as f32;
    let u = chunk[1] as f32 - 128.0;
    let y1 = chunk[2] as f32;
    let v = chunk[3] as f32 - 128.0;

    for y in [y0, y1] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn neutral_chroma_is_gray() {
    let rgb = yuyv_to_rgb(&[100, 128, 200, 128]);
    assert_eq!(rgb, vec![100, 100, 100, 200, 200, 200]);
  }

  #[test]
  fn trailing_partial_macropixel_is_ignored() {
    assert_eq!(yuyv_to_rgb(&[16, 128, 16, 128, 1, 2]).len(), 6);
  }

  #[test]
  fn capture_before_start_is_unavailable() {
    let mut source = V4l2Source::new("/dev/video-does-not-exist");
    assert!(!source.is_started());
    assert_eq!(source.capture_frame().unwrap_err(), CaptureError::NotStarted);
  }

  #[test]
  fn missing_device_fails_at_start() {
    let mut source = V4l2Source::new("/dev/video-does-not-exist");
    assert!(matches!(
      source.start(),
      Err(InputError::DeviceUnavailable(path)) if path == "/dev/video-does-not-exist"
    ));
    assert!(!source.is_started());
  }

  #[test]
  fn default_device_from_url() {
    let url = Url::parse("v4l:///").unwrap();
    let source = V4l2Source::from_url(&url).unwrap();
    assert_eq!(source.device_path(), "/dev/video0");
    let url = Url::parse("v4l:///dev/video2").unwrap();
    let source = V4l2Source::from_url(&url).unwrap();
    assert_eq!(source.device_path(), "/dev/video2");
  }
}
