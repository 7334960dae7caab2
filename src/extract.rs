// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/extract.rs - 轮子中心坐标提取
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::model::{ClassLabel, Detection};

/// 轮子中心点（像素坐标）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelCoordinate {
  pub x: f32,
  pub y: f32,
}

/// 按输入顺序提取 wheel 且分数严格大于阈值的检测框中心
pub fn extract_wheel_coordinates(detections: &[Detection], threshold: f32) -> Vec<WheelCoordinate> {
  detections
    .iter()
    .filter(|det| det.label() == ClassLabel::Wheel && det.passes(threshold))
    .map(|det| {
      let (x, y) = det.center();
      WheelCoordinate { x, y }
    })
    .collect()
}

/// 展平为总线格式 [x0, y0, x1, y1, ...]
pub fn flatten(coordinates: &[WheelCoordinate]) -> Vec<f32> {
  coordinates.iter().flat_map(|c| [c.x, c.y]).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn det(bbox: [f32; 4], score: f32, class_id: u32) -> Detection {
    Detection::new(bbox, score, class_id)
  }

  #[test]
  fn single_wheel_center() {
    let coords = extract_wheel_coordinates(&[det([10.0, 10.0, 30.0, 30.0], 0.9, 0)], 0.5);
    assert_eq!(coords, vec![WheelCoordinate { x: 20.0, y: 20.0 }]);
    assert_eq!(flatten(&coords), vec![20.0, 20.0]);
  }

  #[test]
  fn balls_and_unknown_classes_are_excluded() {
    let detections = [
      det([0.0, 0.0, 10.0, 10.0], 0.9, 1),
      det([0.0, 0.0, 10.0, 10.0], 0.9, 5),
    ];
    assert!(extract_wheel_coordinates(&detections, 0.5).is_empty());
  }

  #[test]
  fn threshold_boundary_is_excluded() {
    let detections = [
      det([0.0, 0.0, 10.0, 10.0], 0.5, 0),
      det([0.0, 0.0, 10.0, 10.0], 0.2, 0),
    ];
    assert!(extract_wheel_coordinates(&detections, 0.5).is_empty());
  }

  #[test]
  fn order_follows_detections() {
    let detections = [
      det([100.0, 50.0, 120.0, 70.0], 0.8, 0),
      det([0.0, 0.0, 4.0, 4.0], 0.95, 1),
      det([0.0, 0.0, 10.0, 20.0], 0.7, 0),
    ];
    let coords = extract_wheel_coordinates(&detections, 0.5);
    assert_eq!(flatten(&coords), vec![110.0, 60.0, 5.0, 10.0]);
    // 重复调用结果一致
    assert_eq!(extract_wheel_coordinates(&detections, 0.5), coords);
  }

  #[test]
  fn empty_input() {
    assert!(extract_wheel_coordinates(&[], 0.5).is_empty());
    assert!(flatten(&[]).is_empty());
  }
}
