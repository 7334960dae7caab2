// 该文件是 Wheelcam （轮眼） 项目的一部分。
// src/task.rs - 周期任务
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

use std::fmt::Display;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{
  config::DEFAULT_TICK_PERIOD,
  input::FrameSource,
  model::Model,
  node::{Node, TickOutcome},
  output::FrameSink,
  publish::Bus,
};

/// 收到中断后等待正常退出的最长时间
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

/// 注册 Ctrl-C 处理，返回关闭信号的接收端
pub fn install_ctrlc_handler() -> Result<Receiver<()>, ctrlc::Error> {
  let (tx, rx) = mpsc::channel();

  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(FORCE_EXIT_AFTER);
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;

  Ok(rx)
}

/// 在调用线程上按固定周期驱动节点。
///
/// 节拍之间不会重叠。某一拍超时后下一拍立即开始，但不会补发错过的节拍。
#[derive(Debug, Clone, Copy)]
pub struct PeriodicTask {
  period: Duration,
  max_ticks: Option<usize>,
}

impl Default for PeriodicTask {
  fn default() -> Self {
    Self::new(DEFAULT_TICK_PERIOD)
  }
}

impl PeriodicTask {
  pub fn new(period: Duration) -> Self {
    Self {
      period,
      max_ticks: None,
    }
  }

  pub fn with_max_ticks(mut self, max_ticks: Option<usize>) -> Self {
    self.max_ticks = max_ticks;
    self
  }

  pub fn period(&self) -> Duration {
    self.period
  }

  /// 运行到收到关闭信号或达到最大节拍数，返回执行的节拍数。
  /// 无论以何种方式结束都会关闭节点。
  pub fn run<S, M, B, K>(self, node: &mut Node<S, M, B, K>, shutdown: &Receiver<()>) -> usize
  where
    S: FrameSource,
    M: Model,
    M::Error: Display,
    B: Bus,
    K: FrameSink,
    K::Error: Display,
  {
    info!("开始周期任务，周期 {:?}", self.period);
    let mut ticks = 0usize;
    let mut signal_closed = false;

    loop {
      if !signal_closed {
        match shutdown.try_recv() {
          Ok(()) => {
            warn!("中断信号接收，退出任务循环");
            break;
          }
          Err(TryRecvError::Disconnected) => signal_closed = true,
          Err(TryRecvError::Empty) => {}
        }
      }

      if self.max_ticks.is_some_and(|n| ticks >= n) {
        info!("达到指定节拍数 {}, 退出任务循环", ticks);
        break;
      }

      let started = Instant::now();
      let outcome = node.tick();
      ticks += 1;
      let elapsed = started.elapsed();
      match outcome {
        TickOutcome::Published { wheels } => {
          debug!("第 {} 拍完成: {} 个轮子, 耗时 {:.2?}", ticks, wheels, elapsed)
        }
        other => debug!("第 {} 拍: {:?}, 耗时 {:.2?}", ticks, other, elapsed),
      }

      if self.max_ticks.is_some_and(|n| ticks >= n) {
        continue;
      }

      let remaining = self.period.saturating_sub(elapsed);
      if remaining.is_zero() {
        warn!("第 {} 拍超出周期: {:.2?} > {:?}", ticks, elapsed, self.period);
        continue;
      }

      if signal_closed {
        thread::sleep(remaining);
        continue;
      }
      match shutdown.recv_timeout(remaining) {
        Ok(()) => {
          warn!("中断信号接收，退出任务循环");
          break;
        }
        Err(RecvTimeoutError::Timeout) => {}
        Err(RecvTimeoutError::Disconnected) => {
          signal_closed = true;
          thread::sleep(self.period.saturating_sub(started.elapsed()));
        }
      }
    }

    node.shutdown();
    info!("任务完成，共 {} 拍", ticks);
    ticks
  }
}
