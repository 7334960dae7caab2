// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::frame::Frame;

/// 检测模型。分数与类别原样透传，不做二次打分
pub trait Model {
  type Error;

  fn infer(&self, frame: &Frame) -> Result<Vec<Detection>, Self::Error>;
}

impl<M: Model + ?Sized> Model for Box<M> {
  type Error = M::Error;

  fn infer(&self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
    (**self).infer(frame)
  }
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn from_label_id(id: u32) -> Self;
  fn to_label_id(&self) -> u32;
}

/// 训练集中的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassLabel {
  Wheel,
  Ball,
  Unknown(u32),
}

pub const WHEEL_CLASS_ID: u32 = 0;
pub const BALL_CLASS_ID: u32 = 1;
/// 模型输出的类别数量
pub const CLASS_NUM: usize = 2;

impl ClassLabel {
  pub fn is_known(&self) -> bool {
    !matches!(self, ClassLabel::Unknown(_))
  }
}

impl WithLabel for ClassLabel {
  fn to_label_str(&self) -> String {
    match self {
      ClassLabel::Wheel => "wheel".to_string(),
      ClassLabel::Ball => "ball".to_string(),
      ClassLabel::Unknown(id) => format!("unknown-{}", id),
    }
  }

  fn from_label_id(id: u32) -> Self {
    match id {
      WHEEL_CLASS_ID => ClassLabel::Wheel,
      BALL_CLASS_ID => ClassLabel::Ball,
      other => ClassLabel::Unknown(other),
    }
  }

  fn to_label_id(&self) -> u32 {
    match self {
      ClassLabel::Wheel => WHEEL_CLASS_ID,
      ClassLabel::Ball => BALL_CLASS_ID,
      ClassLabel::Unknown(id) => *id,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，像素坐标
}

impl Detection {
  pub fn new(bbox: [f32; 4], score: f32, class_id: u32) -> Self {
    Self {
      class_id,
      score,
      bbox,
    }
  }

  pub fn label(&self) -> ClassLabel {
    ClassLabel::from_label_id(self.class_id)
  }

  /// 分数严格大于阈值才算通过
  pub fn passes(&self, threshold: f32) -> bool {
    self.score > threshold
  }

  pub fn center(&self) -> (f32, f32) {
    let [x1, y1, x2, y2] = self.bbox;
    ((x1 + x2) / 2.0, (y1 + y2) / 2.0)
  }
}

#[cfg(feature = "model_yolo26")]
mod yolo26;
#[cfg(feature = "model_yolo26")]
pub use self::yolo26::{Yolo26, Yolo26Builder, Yolo26Error};
