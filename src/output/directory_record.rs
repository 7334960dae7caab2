// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, output::FrameSink, url_path, url_query};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("记录间隔必须大于 0")]
  ZeroInterval,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按日期目录保存标注后的帧：`<root>/YYYY/MM/DD/HH-MM-SS-XXXX.png`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  every: u64,
  seen: u64,
  frame_counter: u16,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let every = url_query(uri, "every").unwrap_or(1);
    Self::new(url_path(uri), every)
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, every: u64) -> Result<Self, DirectoryRecordOutputError> {
    if every == 0 {
      return Err(DirectoryRecordOutputError::ZeroInterval);
    }
    Ok(Self {
      directory: directory.into(),
      every,
      seen: 0,
      frame_counter: 0,
    })
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn frame_id(&mut self) -> u16 {
    self.frame_counter = self.frame_counter.wrapping_add(1);
    self.frame_counter
  }

  fn frame_path(&mut self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl FrameSink for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn show(&mut self, frame: &Frame) -> Result<(), Self::Error> {
    self.seen += 1;
    if (self.seen - 1) % self.every != 0 {
      return Ok(());
    }

    let path = self.frame_path()?;
    frame.image.save(&path)?;
    debug!("保存第 {} 帧到 {}", frame.index, path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn count_png(dir: &Path) -> usize {
    let mut count = 0;
    for entry in std::fs::read_dir(dir).unwrap() {
      let path = entry.unwrap().path();
      if path.is_dir() {
        count += count_png(&path);
      } else if path.extension().is_some_and(|e| e == "png") {
        count += 1;
      }
    }
    count
  }

  #[test]
  fn saves_every_nth_frame() {
    let root = std::env::temp_dir().join(format!("wheelcam-record-{}", std::process::id()));
    let url = url::Url::parse(&format!("folder://{}?every=2", root.display())).unwrap();
    let mut output = DirectoryRecordOutput::from_url(&url).unwrap();

    let frame = Frame::blank(4, 4);
    for _ in 0..3 {
      output.show(&frame).unwrap();
    }
    assert_eq!(count_png(output.directory()), 2);

    std::fs::remove_dir_all(&root).ok();
  }

  #[test]
  fn zero_interval_is_rejected() {
    assert!(matches!(
      DirectoryRecordOutput::new("/tmp", 0),
      Err(DirectoryRecordOutputError::ZeroInterval)
    ));
  }
}
