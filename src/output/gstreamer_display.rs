// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/output/gstreamer_display.rs - GStreamer 本地窗口显示
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # GStreamer 本地显示
//!
//! 把标注后的帧推送到 `autovideosink`，在桌面上弹出窗口实时查看。
//! 仅用于调试，无显示环境时不要启用。
//!
//! ## URL Scheme
//!
//! `display://?fps=10`

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, output::FrameSink, url_query};

const DISPLAY_PIPELINE: &str = "appsrc name=src is-live=true ! videoconvert ! autovideosink sync=false";

#[derive(Error, Debug)]
pub enum GStreamerDisplayError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("Buffer creation error")]
  BufferCreationError,
}

pub struct GStreamerDisplay {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  fps: i32,
  /// 已协商的帧尺寸，首帧到达时设置 caps
  size: Option<(u32, u32)>,
}

impl FromUrlWithScheme for GStreamerDisplay {
  const SCHEME: &'static str = "display";
}

impl FromUrl for GStreamerDisplay {
  type Error = GStreamerDisplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(GStreamerDisplayError::SchemeMismatch);
    }

    gst::init()?;

    let fps = url_query(url, "fps").unwrap_or(10);

    info!("创建显示管道: {}", DISPLAY_PIPELINE);
    let pipeline = gst::parse::launch(DISPLAY_PIPELINE)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerDisplayError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerDisplayError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerDisplayError::AppSrcNotFound)?;
    appsrc.set_format(gst::Format::Time);

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerDisplay {
      pipeline,
      appsrc,
      fps,
      size: None,
    })
  }
}

impl GStreamerDisplay {
  fn ensure_caps(&mut self, width: u32, height: u32) -> Result<(), GStreamerDisplayError> {
    if self.size == Some((width, height)) {
      return Ok(());
    }

    let caps = gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgb, width, height)
      .fps(gst::Fraction::new(self.fps, 1))
      .build()?
      .to_caps()?;
    self.appsrc.set_caps(Some(&caps));
    self.size = Some((width, height));

    info!("显示窗口: {}x{} @ {} fps", width, height, self.fps);
    Ok(())
  }
}

impl FrameSink for GStreamerDisplay {
  type Error = GStreamerDisplayError;

  fn show(&mut self, frame: &Frame) -> Result<(), Self::Error> {
    self.ensure_caps(frame.width(), frame.height())?;

    let data = frame.as_nhwc();
    let mut buffer =
      gst::Buffer::with_size(data.len()).map_err(|_| GStreamerDisplayError::BufferCreationError)?;
    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerDisplayError::BufferCreationError)?;
      buffer_ref.set_pts(gst::ClockTime::from_mseconds(frame.timestamp_ms));
      let mut buffer_map = buffer_ref
        .map_writable()
        .map_err(|_| GStreamerDisplayError::PipelineError("Failed to map buffer".to_string()))?;
      buffer_map.copy_from_slice(data);
    }

    self.appsrc.push_buffer(buffer).map_err(|e| {
      GStreamerDisplayError::PipelineError(format!("Failed to push buffer: {:?}", e))
    })?;

    Ok(())
  }
}

impl Drop for GStreamerDisplay {
  fn drop(&mut self) {
    let _ = self.appsrc.end_of_stream();
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer display pipeline: {}", e);
    }
    info!("显示窗口已关闭");
  }
}
