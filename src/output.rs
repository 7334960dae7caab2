// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/output.rs - 本地显示与记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;
use url::Url;

use crate::{FromUrl, frame::Frame};

pub mod draw;

#[cfg(feature = "gstreamer_output")]
mod gstreamer_display;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_display::{GStreamerDisplay, GStreamerDisplayError};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

/// 标注完成后的帧观察者，只用于本地显示或调试，不影响发布
pub trait FrameSink {
  type Error;
  fn show(&mut self, frame: &Frame) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "gstreamer_output")]
  #[error("GStreamer 显示错误: {0}")]
  GStreamerDisplayError(#[from] GStreamerDisplayError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  #[cfg(feature = "gstreamer_output")]
  GStreamerDisplay(GStreamerDisplay),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "gstreamer_output")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == GStreamerDisplay::SCHEME {
        return Ok(OutputWrapper::GStreamerDisplay(GStreamerDisplay::from_url(url)?));
      }
    }
    #[cfg(feature = "directory_record")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == DirectoryRecordOutput::SCHEME {
        return Ok(OutputWrapper::DirectoryRecordOutput(
          DirectoryRecordOutput::from_url(url)?,
        ));
      }
    }
    let _ = url;
    Err(OutputError::SchemeMismatch)
  }
}

impl FrameSink for OutputWrapper {
  type Error = OutputError;

  fn show(&mut self, frame: &Frame) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerDisplay(output) => output.show(frame).map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output.show(frame).map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("window://main").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch)
    ));
  }
}
