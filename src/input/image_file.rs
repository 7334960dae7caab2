// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/input/image_file.rs - 图像文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::time::Instant;

use image::imageops::{self, FilterType};
use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH},
  frame::Frame,
  input::{CaptureError, FrameSource, InputError},
  url_path,
};

#[derive(Error, Debug)]
pub enum ImageFileSourceError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 把一张静态图片当作摄像头，每次采集都返回它的一份拷贝
pub struct ImageFileSource {
  path: String,
  width: u32,
  height: u32,
  image: Option<RgbImage>,
  frame_index: u64,
  start_time: Instant,
}

impl FromUrlWithScheme for ImageFileSource {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileSource {
  type Error = ImageFileSourceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileSourceError::SchemaMismatch);
    }

    Ok(Self::new(url_path(url)))
  }
}

impl ImageFileSource {
  pub fn new(path: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      width: DEFAULT_FRAME_WIDTH,
      height: DEFAULT_FRAME_HEIGHT,
      image: None,
      frame_index: 0,
      start_time: Instant::now(),
    }
  }

  pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
    self.width = width;
    self.height = height;
    self
  }

  fn load(&self) -> Result<RgbImage, ImageFileSourceError> {
    let image: RgbImage = ImageReader::open(&self.path)?.decode()?.into();
    if image.dimensions() == (self.width, self.height) {
      return Ok(image);
    }

    info!(
      "图像尺寸 {}x{} 缩放到 {}x{}",
      image.width(),
      image.height(),
      self.width,
      self.height
    );
    Ok(imageops::resize(
      &image,
      self.width,
      self.height,
      FilterType::Triangle,
    ))
  }
}

impl FrameSource for ImageFileSource {
  fn start(&mut self) -> Result<(), InputError> {
    info!("加载图像文件: {}", self.path);
    self.image = Some(self.load()?);
    self.frame_index = 0;
    self.start_time = Instant::now();
    Ok(())
  }

  fn stop(&mut self) {
    self.image = None;
  }

  fn is_started(&self) -> bool {
    self.image.is_some()
  }

  fn frame_size(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
    let image = self.image.as_ref().ok_or(CaptureError::NotStarted)?;
    let frame = Frame::new(
      image.clone(),
      self.frame_index,
      self.start_time.elapsed().as_millis() as u64,
    );
    self.frame_index += 1;
    Ok(frame)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn write_fixture(name: &str, width: u32, height: u32) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("wheelcam-{}-{}.png", name, std::process::id()));
    RgbImage::from_pixel(width, height, Rgb([10, 20, 30]))
      .save(&path)
      .unwrap();
    path
  }

  #[test]
  fn replays_resized_frames() {
    let path = write_fixture("replay", 32, 16);
    let mut source = ImageFileSource::new(path.to_string_lossy()).with_frame_size(8, 4);

    assert_eq!(source.capture_frame().unwrap_err(), CaptureError::NotStarted);
    source.start().unwrap();

    let first = source.capture_frame().unwrap();
    let second = source.capture_frame().unwrap();
    assert_eq!((first.width(), first.height()), (8, 4));
    assert_eq!(first.index, 0);
    assert_eq!(second.index, 1);
    assert_eq!(first.image.get_pixel(0, 0), &Rgb([10, 20, 30]));

    source.stop();
    assert!(!source.is_started());
    assert_eq!(source.capture_frame().unwrap_err(), CaptureError::NotStarted);

    std::fs::remove_file(path).ok();
  }

  #[test]
  fn missing_file_fails_at_start() {
    let mut source = ImageFileSource::new("/nonexistent/wheelcam/frame.png");
    assert!(source.start().is_err());
  }
}
