// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/publish/json_lines.rs - JSON Lines 总线
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! 每条消息写成一行 JSON，便于在没有机器人中间件的环境里联调。
//!
//! - `stdout://` 写到标准输出
//! - `jsonl:///path/to/messages.jsonl` 追加写入文件
//!
//! 图像只记录尺寸、编码和字节数，不写像素数据。

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl,
  publish::{Bus, CoordinateMessage, ImageMessage, Stamp},
  url_path,
};

const JSONL_SCHEME: &str = "jsonl";
const STDOUT_SCHEME: &str = "stdout";

#[derive(Error, Debug)]
pub enum JsonLinesBusError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct Record<'a, T: Serialize> {
  topic: &'a str,
  #[serde(flatten)]
  message: T,
}

#[derive(Serialize)]
struct ImageSummary<'a> {
  stamp: Stamp,
  frame_id: &'a str,
  width: u32,
  height: u32,
  encoding: &'a str,
  step: u32,
  bytes: usize,
}

impl<'a> From<&'a ImageMessage> for ImageSummary<'a> {
  fn from(message: &'a ImageMessage) -> Self {
    Self {
      stamp: message.stamp,
      frame_id: &message.frame_id,
      width: message.width,
      height: message.height,
      encoding: &message.encoding,
      step: message.step,
      bytes: message.data.len(),
    }
  }
}

pub struct JsonLinesBus {
  writer: Box<dyn Write + Send>,
}

impl FromUrl for JsonLinesBus {
  type Error = JsonLinesBusError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      STDOUT_SCHEME => {
        info!("消息输出到标准输出");
        Ok(Self::from_writer(std::io::stdout()))
      }
      JSONL_SCHEME => {
        let path = url_path(url);
        if let Some(parent) = std::path::Path::new(&path).parent()
          && !parent.as_os_str().is_empty()
        {
          std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("消息输出到文件: {}", path);
        Ok(Self::from_writer(BufWriter::new(file)))
      }
      _ => Err(JsonLinesBusError::SchemeMismatch),
    }
  }
}

impl JsonLinesBus {
  pub fn accepts(url: &Url) -> bool {
    matches!(url.scheme(), JSONL_SCHEME | STDOUT_SCHEME)
  }

  pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
    Self {
      writer: Box::new(writer),
    }
  }

  fn write_record<T: Serialize>(&mut self, topic: &str, message: T) -> Result<(), JsonLinesBusError> {
    serde_json::to_writer(&mut self.writer, &Record { topic, message })?;
    self.writer.write_all(b"\n")?;
    self.writer.flush()?;
    Ok(())
  }
}

impl Bus for JsonLinesBus {
  type Error = JsonLinesBusError;

  fn send_coordinates(&mut self, topic: &str, message: &CoordinateMessage) -> Result<(), Self::Error> {
    self.write_record(topic, message)
  }

  fn send_image(&mut self, topic: &str, message: &ImageMessage) -> Result<(), Self::Error> {
    self.write_record(topic, ImageSummary::from(message))
  }
}
