// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/model/yolo26.rs - RKNN YOLO26 轮子检测模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::imageops::{self, FilterType};
use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{CLASS_NUM, Detection, Model},
  url_path,
};

const YOLO26_NUM_INPUTS: u32 = 1;
const YOLO26_NUM_OUTPUTS: u32 = 6;
const YOLO26_INPUT_W: u32 = 640;
const YOLO26_INPUT_H: u32 = 640;
const YOLO26_HEAD_SIZES: [(usize, usize); 3] = [(80, 80), (40, 40), (20, 20)];
const YOLO26_STRIDES: [f32; 3] = [8.0, 16.0, 32.0];
/// 后端候选下限，节点阈值在此之后单独应用
const YOLO26_CANDIDATE_THRESH: f32 = 0.25;

pub struct Yolo26 {
  context: Context,
}

#[derive(Error, Debug)]
pub enum Yolo26Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(#[from] rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型输出形状错误: {0}")]
  OutputShape(String),
}

impl Yolo26Error {
  pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
    Yolo26Error::ModelInvalid(msg.to_string(), e)
  }
}

pub struct Yolo26Builder {
  model_path: String,
  flags: InitFlags,
}

impl FromUrlWithScheme for Yolo26Builder {
  const SCHEME: &'static str = "yolo26";
}

impl FromUrl for Yolo26Builder {
  type Error = Yolo26Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolo26Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(Yolo26Builder {
      model_path: url_path(url),
      flags: InitFlags::default(),
    })
  }
}

impl Yolo26Builder {
  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn build(self) -> Result<Yolo26, Yolo26Error> {
    info!("加载模型文件: {}", self.model_path);
    let mode_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      mode_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&mode_data, self.flags)?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(Yolo26Error::invalid("无法查询 SDK 版本", e));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输出数量", e))?;

    if num_inputs != YOLO26_NUM_INPUTS || num_outputs != YOLO26_NUM_OUTPUTS {
      let msg = format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        YOLO26_NUM_INPUTS, YOLO26_NUM_OUTPUTS, num_inputs, num_outputs
      );
      error!("{}", msg);
      return Err(Yolo26Error::invalid(&msg, rknpu::Error::InvalidModel));
    }

    info!("模型加载完成");
    Ok(Yolo26 { context })
  }
}

/// 根据张量大小匹配回归和分类输出
/// 返回 (reg, cls) 元组，如果大小不匹配则返回 None
fn match_reg_cls_tensors<'a>(
  tensor1: &'a [f32],
  tensor2: &'a [f32],
  reg_expected: usize,
  cls_expected: usize,
) -> Option<(&'a [f32], &'a [f32])> {
  if tensor1.len() == reg_expected && tensor2.len() == cls_expected {
    Some((tensor1, tensor2))
  } else if tensor1.len() == cls_expected && tensor2.len() == reg_expected {
    Some((tensor2, tensor1))
  } else {
    None
  }
}

/// 解码单个检测头，bbox 为相对网络输入的归一化坐标
fn decode_head(reg: &[f32], cls: &[f32], map_h: usize, map_w: usize, stride: f32) -> Vec<Detection> {
  let spatial = map_h * map_w;
  let (input_w, input_h) = (YOLO26_INPUT_W as f32, YOLO26_INPUT_H as f32);
  let mut items = Vec::new();

  for h in 0..map_h {
    for w in 0..map_w {
      let idx = h * map_w + w;

      let (score, class_id) = {
        let mut max_logit = f32::MIN;
        let mut cls_idx = 0usize;
        for c in 0..CLASS_NUM {
          let logit = cls[c * spatial + idx];
          if logit > max_logit {
            max_logit = logit;
            cls_idx = c;
          }
        }
        (sigmoid(max_logit), cls_idx as u32)
      };

      if score <= YOLO26_CANDIDATE_THRESH {
        continue;
      }

      let grid_x = (w as f32) + 0.5;
      let grid_y = (h as f32) + 0.5;

      let xmin = ((grid_x - reg[idx]) * stride).clamp(0.0, input_w);
      let ymin = ((grid_y - reg[spatial + idx]) * stride).clamp(0.0, input_h);
      let xmax = ((grid_x + reg[2 * spatial + idx]) * stride).clamp(0.0, input_w);
      let ymax = ((grid_y + reg[3 * spatial + idx]) * stride).clamp(0.0, input_h);

      items.push(Detection::new(
        [
          xmin / input_w,
          ymin / input_h,
          xmax / input_w,
          ymax / input_h,
        ],
        score,
        class_id,
      ));
    }
  }

  items
}

/// 解码全部检测头。RKNN 输出顺序可能不同，每个头按张量大小区分回归与分类。
/// 任一检测头大小不符都视为推理失败，不能当作“没有目标”
fn decode_outputs(tensors: &[&[f32]]) -> Result<Vec<Detection>, Yolo26Error> {
  if tensors.len() != YOLO26_NUM_OUTPUTS as usize {
    return Err(Yolo26Error::OutputShape(format!(
      "预期 {} 个输出张量, 实际为 {}",
      YOLO26_NUM_OUTPUTS,
      tensors.len()
    )));
  }

  let mut items = Vec::new();
  for (head_idx, (&(map_h, map_w), stride)) in
    YOLO26_HEAD_SIZES.iter().zip(YOLO26_STRIDES).enumerate()
  {
    let spatial = map_h * map_w;
    let (tensor1, tensor2) = (tensors[head_idx * 2], tensors[head_idx * 2 + 1]);

    let Some((reg, cls)) =
      match_reg_cls_tensors(tensor1, tensor2, 4 * spatial, CLASS_NUM * spatial)
    else {
      return Err(Yolo26Error::OutputShape(format!(
        "检测头 {} 输出大小不匹配 - 张量1: {}, 张量2: {}, 预期 {}/{}",
        head_idx,
        tensor1.len(),
        tensor2.len(),
        4 * spatial,
        CLASS_NUM * spatial
      )));
    };
    items.extend(decode_head(reg, cls, map_h, map_w, stride));
  }

  Ok(items)
}

/// 把归一化坐标映射回原始帧的像素坐标
fn to_pixel_space(mut items: Vec<Detection>, width: u32, height: u32) -> Vec<Detection> {
  let (w, h) = (width as f32, height as f32);
  for item in items.iter_mut() {
    item.bbox = [
      item.bbox[0] * w,
      item.bbox[1] * h,
      item.bbox[2] * w,
      item.bbox[3] * h,
    ];
  }
  items
}

impl Model for Yolo26 {
  type Error = Yolo26Error;

  fn infer(&self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
    let input = if frame.width() == YOLO26_INPUT_W && frame.height() == YOLO26_INPUT_H {
      frame.image.clone()
    } else {
      imageops::resize(
        &frame.image,
        YOLO26_INPUT_W,
        YOLO26_INPUT_H,
        FilterType::Triangle,
      )
    };

    debug!("设置模型输入");
    self
      .context
      .set_input(0, input.as_raw(), TensorFormat::NHWC, TensorType::UInt8)?;

    debug!("执行模型推理");
    self.context.run()?;

    let output = self.context.get_outputs()?;
    let tensors = (0..YOLO26_NUM_OUTPUTS as usize)
      .map(|i| output.get_f32(i))
      .collect::<Result<Vec<_>, _>>()?;

    let items = decode_outputs(&tensors)?;
    debug!("检测到 {} 个候选目标", items.len());
    Ok(to_pixel_space(items, frame.width(), frame.height()))
  }
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tensors_are_matched_by_size() {
    let a = vec![0.0; 8];
    let b = vec![0.0; 4];
    let (reg, cls) = match_reg_cls_tensors(&b, &a, 4, 8).unwrap();
    assert_eq!((reg.len(), cls.len()), (4, 8));
    let (reg, cls) = match_reg_cls_tensors(&a, &b, 4, 8).unwrap();
    assert_eq!((reg.len(), cls.len()), (4, 8));
    assert!(match_reg_cls_tensors(&a, &a, 4, 8).is_none());
  }

  #[test]
  fn decode_single_cell_head() {
    // 1x1 特征图，stride 取整幅输入，只有 wheel 通道激活
    let reg = [0.25, 0.25, 0.25, 0.25];
    let cls = [5.0, -5.0];
    let items = decode_head(&reg, &cls, 1, 1, 640.0);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].class_id, 0);
    assert!(items[0].score > 0.99);
    assert_eq!(items[0].bbox, [0.25, 0.25, 0.75, 0.75]);

    let items = to_pixel_space(items, 640, 480);
    assert_eq!(items[0].bbox, [160.0, 120.0, 480.0, 360.0]);
  }

  #[test]
  fn low_logits_are_dropped() {
    let reg = [0.25, 0.25, 0.25, 0.25];
    let cls = [-5.0, -5.0];
    assert!(decode_head(&reg, &cls, 1, 1, 640.0).is_empty());
  }

  fn head_tensors(classes: usize) -> Vec<Vec<f32>> {
    YOLO26_HEAD_SIZES
      .iter()
      .flat_map(|&(h, w)| {
        let spatial = h * w;
        [vec![0.0; 4 * spatial], vec![-5.0; classes * spatial]]
      })
      .collect()
  }

  #[test]
  fn well_shaped_outputs_decode() {
    let tensors = head_tensors(CLASS_NUM);
    let views: Vec<&[f32]> = tensors.iter().map(|t| t.as_slice()).collect();
    assert!(decode_outputs(&views).unwrap().is_empty());
  }

  #[test]
  fn wrong_class_count_is_an_error() {
    // 80 类的通用模型，分类张量大小与轮子模型不符
    let tensors = head_tensors(80);
    let views: Vec<&[f32]> = tensors.iter().map(|t| t.as_slice()).collect();
    assert!(matches!(
      decode_outputs(&views),
      Err(Yolo26Error::OutputShape(_))
    ));
  }

  #[test]
  fn missing_outputs_are_an_error() {
    let tensors = head_tensors(CLASS_NUM);
    let views: Vec<&[f32]> = tensors.iter().take(4).map(|t| t.as_slice()).collect();
    assert!(matches!(
      decode_outputs(&views),
      Err(Yolo26Error::OutputShape(_))
    ));
  }
}
