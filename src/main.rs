// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use wheelcam::{
  FromUrl,
  input::InputWrapper,
  model::Yolo26Builder,
  node::Node,
  output::OutputWrapper,
  publish::BusWrapper,
  task::{PeriodicTask, install_ctrlc_handler},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();
  let config = args.node_config()?;

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("消息总线: {}", args.bus);

  let model = Yolo26Builder::from_url(&args.model)?.build()?;
  let (width, height) = config.frame_size();
  let source = InputWrapper::from_url(&args.input)?.with_frame_size(width, height);
  let bus = BusWrapper::from_url(&args.bus)?;

  let shutdown = install_ctrlc_handler()?;
  let task = PeriodicTask::new(config.tick_period()).with_max_ticks(args.max_ticks);

  match &args.display {
    Some(url) => {
      info!("本地输出: {}", url);
      let sink = OutputWrapper::from_url(url)?;
      let mut node = Node::with_sink(config, source, model, bus, sink);
      node.start()?;
      task.run(&mut node, &shutdown);
    }
    None => {
      let mut node = Node::new(config, source, model, bus);
      node.start()?;
      task.run(&mut node, &shutdown);
    }
  }

  Ok(())
}
