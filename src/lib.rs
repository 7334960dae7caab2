// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod config;
pub mod extract;
pub mod frame;
pub mod input;
pub mod model;
pub mod node;
pub mod output;
pub mod publish;
pub mod task;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 取出 URL 中的文件路径，并做百分号解码
pub fn url_path(url: &url::Url) -> String {
  match urlencoding::decode(url.path()) {
    Ok(path) => path.into_owned(),
    Err(_) => url.path().to_string(),
  }
}

/// 读取 URL 查询参数并解析为指定类型，缺失或解析失败时返回 None
pub fn url_query<T: std::str::FromStr>(url: &url::Url, key: &str) -> Option<T> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .and_then(|(_, v)| v.parse().ok())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_path_is_percent_decoded() {
    let url = url::Url::parse("image:///tmp/my%20frame.png").unwrap();
    assert_eq!(url_path(&url), "/tmp/my frame.png");
  }

  #[test]
  fn url_query_parses_known_keys() {
    let url = url::Url::parse("v4l:///dev/video0?width=1280&height=abc").unwrap();
    assert_eq!(url_query::<u32>(&url, "width"), Some(1280));
    assert_eq!(url_query::<u32>(&url, "height"), None);
    assert_eq!(url_query::<u32>(&url, "fps"), None);
  }
}
