// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::{
  frame::Frame,
  model::{Detection, WithLabel},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 40.0;
const LABEL_OFFSET_Y: i32 = 10;
const BOX_THICKNESS: i32 = 4;
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色

/// 未指定字体时依次尝试的系统字体
const FALLBACK_FONTS: [&str; 3] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
];

pub struct Draw {
  threshold: f32,
  font: Option<FontArc>,
  font_scale: PxScale,
  box_thickness: i32,
  color: Rgb<u8>,
}

impl Draw {
  /// 只绘制框，不绘制文字标签
  pub fn new(threshold: f32) -> Self {
    Self {
      threshold,
      font: None,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      box_thickness: BOX_THICKNESS,
      color: Rgb(BOX_COLOR),
    }
  }

  /// 加载字体：优先使用给定路径，否则尝试系统字体。找不到字体时只画框
  pub fn with_font_path(mut self, font_path: Option<&Path>) -> Self {
    let candidates = font_path
      .map(|p| vec![p.to_path_buf()])
      .unwrap_or_else(|| FALLBACK_FONTS.iter().map(PathBuf::from).collect());

    self.font = candidates.iter().find_map(|path| {
      let data = std::fs::read(path).ok()?;
      match FontArc::try_from_vec(data) {
        Ok(font) => {
          debug!("使用字体: {}", path.display());
          Some(font)
        }
        Err(e) => {
          warn!("字体 {} 无法解析: {}", path.display(), e);
          None
        }
      }
    });

    if self.font.is_none() {
      warn!("未找到可用字体，标注时将只绘制边框");
    }
    self
  }

  /// 在帧上原地绘制通过阈值且类别已知的检测，返回绘制数量
  pub fn draw_detections(&self, frame: &mut Frame, detections: &[Detection]) -> usize {
    let mut drawn = 0;
    for detection in detections {
      let label = detection.label();
      if !detection.passes(self.threshold) || !label.is_known() {
        continue;
      }
      let text = label.to_label_str().to_uppercase();
      if self.draw_bbox_with_label(&mut frame.image, &detection.bbox, &text) {
        drawn += 1;
      }
    }
    drawn
  }

  fn draw_bbox_with_label(&self, image: &mut RgbImage, bbox: &[f32; 4], text: &str) -> bool {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return false;
    }

    let x_min = (bbox[0] as i32).clamp(0, w - 1);
    let y_min = (bbox[1] as i32).clamp(0, h - 1);
    let x_max = (bbox[2] as i32).clamp(0, w - 1);
    let y_max = (bbox[3] as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return false;
    }

    // 向内逐像素收缩，画出加粗边框
    for t in 0..self.box_thickness {
      let width = x_max - x_min - 2 * t;
      let height = y_max - y_min - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32 + 1, height as u32 + 1);
      draw_hollow_rect_mut(image, rect, self.color);
    }

    if let Some(font) = &self.font {
      let label_y = (y_min - LABEL_OFFSET_Y - self.font_scale.y as i32).max(0);
      draw_text_mut(image, self.color, x_min, label_y, self.font_scale, font, text);
    }

    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

  fn det(bbox: [f32; 4], score: f32, class_id: u32) -> Detection {
    Detection::new(bbox, score, class_id)
  }

  fn untouched(frame: &Frame) -> bool {
    frame.image.pixels().all(|p| p.0 == [0, 0, 0])
  }

  #[test]
  fn draws_box_for_confident_wheel() {
    let draw = Draw::new(0.5);
    let mut frame = Frame::blank(64, 64);
    let drawn = draw.draw_detections(&mut frame, &[det([10.0, 10.0, 30.0, 30.0], 0.9, 0)]);
    assert_eq!(drawn, 1);
    assert_eq!(frame.image.get_pixel(10, 10), &GREEN);
    assert_eq!(frame.image.get_pixel(30, 30), &GREEN);
    assert_eq!(frame.image.get_pixel(13, 20), &GREEN);
    // 边框内部保持不变
    assert_eq!(frame.image.get_pixel(20, 20), &Rgb([0, 0, 0]));
  }

  #[test]
  fn ball_is_drawn_too() {
    let draw = Draw::new(0.5);
    let mut frame = Frame::blank(32, 32);
    assert_eq!(draw.draw_detections(&mut frame, &[det([0.0, 0.0, 10.0, 10.0], 0.9, 1)]), 1);
    assert!(!untouched(&frame));
  }

  #[test]
  fn threshold_boundary_leaves_frame_untouched() {
    let draw = Draw::new(0.5);
    let mut frame = Frame::blank(64, 64);
    let drawn = draw.draw_detections(
      &mut frame,
      &[
        det([10.0, 10.0, 30.0, 30.0], 0.5, 0),
        det([10.0, 10.0, 30.0, 30.0], 0.1, 1),
      ],
    );
    assert_eq!(drawn, 0);
    assert!(untouched(&frame));
  }

  #[test]
  fn unknown_class_is_skipped() {
    let draw = Draw::new(0.5);
    let mut frame = Frame::blank(64, 64);
    assert_eq!(draw.draw_detections(&mut frame, &[det([1.0, 1.0, 20.0, 20.0], 0.99, 9)]), 0);
    assert!(untouched(&frame));
  }

  #[test]
  fn out_of_bounds_box_is_clamped() {
    let draw = Draw::new(0.5);
    let mut frame = Frame::blank(16, 16);
    assert_eq!(draw.draw_detections(&mut frame, &[det([-5.0, -5.0, 100.0, 100.0], 0.9, 0)]), 1);
    assert_eq!(frame.image.get_pixel(0, 0), &GREEN);
    assert_eq!(frame.image.get_pixel(15, 15), &GREEN);
  }

  #[test]
  fn missing_font_path_still_draws_boxes() {
    let draw = Draw::new(0.5).with_font_path(Some(Path::new("/nonexistent/font.ttf")));
    let mut frame = Frame::blank(64, 64);
    assert_eq!(draw.draw_detections(&mut frame, &[det([10.0, 10.0, 30.0, 30.0], 0.9, 0)]), 1);
  }
}
