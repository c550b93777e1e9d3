// 该文件是 Chakan （查看） 项目的一部分。
// src/console.rs - 交互式命令行
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

use std::{
  io::{BufRead, Write},
  path::PathBuf,
};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
  input::SourceImage,
  model::{Model, ModelOutput},
  output::{OutputFormat, SaveImageFileError, SaveImageFileOutput},
  presenter::{Presenter, PresenterError, Selection},
};

pub const HELP: &str = "\
可用命令:
  open <path>      打开图像
  detect           执行目标检测
  list             显示检测结果列表
  select <n>       选择列表第 n 行（从 1 开始）
  click <x> <y>    按预览图坐标选择检测框
  save <path>      保存标注后的原图
  export <path>    导出检测记录（.txt 或 .json）
  state            显示当前状态
  help             显示本帮助
  quit             退出";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
  Open(PathBuf),
  Detect,
  List,
  /// 列表位置，从 1 开始
  Select(usize),
  Click(f32, f32),
  Save(PathBuf),
  Export(PathBuf),
  State,
  Help,
  Quit,
}

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
  #[error("未知命令: {0}（输入 help 查看可用命令）")]
  Unknown(String),
  #[error("命令 {command} 缺少参数 <{argument}>")]
  MissingArgument {
    command: &'static str,
    argument: &'static str,
  },
  #[error("参数 <{argument}> 无效: {value}")]
  InvalidArgument {
    argument: &'static str,
    value: String,
  },
  #[error("命令 {0} 的参数过多")]
  TooManyArguments(&'static str),
}

impl Command {
  /// 解析一行输入，空行返回 None
  pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
    let line = line.trim();
    let Some((name, rest)) = split_word(line) else {
      return Ok(None);
    };

    let command = match name {
      "open" => Command::Open(path_argument("open", rest)?),
      "save" => Command::Save(path_argument("save", rest)?),
      "export" => Command::Export(path_argument("export", rest)?),
      "detect" => no_argument("detect", rest, Command::Detect)?,
      "list" => no_argument("list", rest, Command::List)?,
      "state" => no_argument("state", rest, Command::State)?,
      "help" | "?" => no_argument("help", rest, Command::Help)?,
      "quit" | "exit" => no_argument("quit", rest, Command::Quit)?,
      "select" => {
        let mut args = rest.split_whitespace();
        let n = number_argument("select", "n", args.next())?;
        if args.next().is_some() {
          return Err(CommandError::TooManyArguments("select"));
        }
        if n == 0 {
          return Err(CommandError::InvalidArgument {
            argument: "n",
            value: "0".to_string(),
          });
        }
        Command::Select(n)
      }
      "click" => {
        let mut args = rest.split_whitespace();
        let x = number_argument("click", "x", args.next())?;
        let y = number_argument("click", "y", args.next())?;
        if args.next().is_some() {
          return Err(CommandError::TooManyArguments("click"));
        }
        Command::Click(x, y)
      }
      other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
  }
}

fn split_word(line: &str) -> Option<(&str, &str)> {
  if line.is_empty() {
    return None;
  }
  match line.split_once(char::is_whitespace) {
    Some((name, rest)) => Some((name, rest.trim())),
    None => Some((line, "")),
  }
}

/// 路径参数取整行剩余部分，允许包含空格
fn path_argument(command: &'static str, rest: &str) -> Result<PathBuf, CommandError> {
  if rest.is_empty() {
    return Err(CommandError::MissingArgument {
      command,
      argument: "path",
    });
  }
  Ok(PathBuf::from(rest))
}

fn no_argument(command: &'static str, rest: &str, value: Command) -> Result<Command, CommandError> {
  if rest.is_empty() {
    Ok(value)
  } else {
    Err(CommandError::TooManyArguments(command))
  }
}

fn number_argument<T: std::str::FromStr>(
  command: &'static str,
  argument: &'static str,
  value: Option<&str>,
) -> Result<T, CommandError> {
  let value = value.ok_or(CommandError::MissingArgument { command, argument })?;
  value.parse().map_err(|_| CommandError::InvalidArgument {
    argument,
    value: value.to_string(),
  })
}

#[derive(Error, Debug)]
pub enum ConsoleError {
  #[error(transparent)]
  Command(#[from] CommandError),
  #[error(transparent)]
  Presenter(#[from] PresenterError),
  #[error("预览图路径无效: {0}")]
  Preview(#[from] SaveImageFileError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
  Continue,
  Quit,
}

/// 把文本命令映射为 Presenter 操作，结果写到 `out`
pub struct Console<M, W> {
  presenter: Presenter<M>,
  out: W,
  preview: Option<PathBuf>,
}

impl<M, E, W> Console<M, W>
where
  M: Model<Input = SourceImage, Output = ModelOutput, Error = E>,
  E: std::error::Error + Send + Sync + 'static,
  W: Write,
{
  pub fn new(presenter: Presenter<M>, out: W) -> Self {
    Self {
      presenter,
      out,
      preview: None,
    }
  }

  /// 每次改变视图后重写的预览图路径，扩展名必须是可写出的图像格式
  pub fn with_preview(mut self, path: impl Into<PathBuf>) -> Result<Self, ConsoleError> {
    let path = path.into();
    OutputFormat::from_path(&path)?;
    self.preview = Some(path);
    Ok(self)
  }

  pub fn presenter(&self) -> &Presenter<M> {
    &self.presenter
  }

  pub fn into_inner(self) -> (Presenter<M>, W) {
    (self.presenter, self.out)
  }

  /// 逐行读取并执行命令，单条命令失败不会结束会话
  pub fn run<R: BufRead>(&mut self, input: R) -> Result<(), std::io::Error> {
    writeln!(self.out, "{}", HELP)?;
    self.prompt()?;
    for line in input.lines() {
      let line = line?;
      match self.execute(&line) {
        Ok(Flow::Quit) => break,
        Ok(Flow::Continue) => {}
        Err(ConsoleError::IoError(e)) => return Err(e),
        Err(e) => {
          error!("命令 '{}' 执行失败: {}", line.trim(), e);
          writeln!(self.out, "错误: {}", e)?;
        }
      }
      self.prompt()?;
    }
    self.out.flush()
  }

  fn prompt(&mut self) -> Result<(), std::io::Error> {
    write!(self.out, "[{}]> ", self.presenter.state().name())?;
    self.out.flush()
  }

  pub fn execute(&mut self, line: &str) -> Result<Flow, ConsoleError> {
    let Some(command) = Command::parse(line)? else {
      return Ok(Flow::Continue);
    };
    debug!("执行命令: {:?}", command);

    match command {
      Command::Open(path) => {
        self.presenter.open(&path)?;
        if let Some(source) = self.presenter.state().source() {
          writeln!(
            self.out,
            "已打开 {} ({}x{})",
            path.display(),
            source.width(),
            source.height()
          )?;
        }
        self.refresh_preview()?;
      }
      Command::Detect => {
        let count = self.presenter.detect()?;
        writeln!(self.out, "检测到 {} 个目标", count)?;
        self.write_list()?;
        self.refresh_preview()?;
      }
      Command::List => self.write_list()?,
      Command::Select(n) => {
        let selection = self.presenter.select(n - 1)?;
        self.write_selection(selection)?;
      }
      Command::Click(x, y) => {
        let selection = self.presenter.click(x, y)?;
        self.write_selection(selection)?;
      }
      Command::Save(path) => {
        self.presenter.save(&path)?;
        writeln!(self.out, "已保存到 {}", path.display())?;
      }
      Command::Export(path) => {
        self.presenter.export(&path)?;
        writeln!(self.out, "已导出到 {}", path.display())?;
      }
      Command::State => self.write_state()?,
      Command::Help => writeln!(self.out, "{}", HELP)?,
      Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
  }

  fn write_list(&mut self) -> Result<(), std::io::Error> {
    for entry in self.presenter.entries() {
      writeln!(self.out, "{}", entry)?;
    }
    Ok(())
  }

  fn write_selection(&mut self, selection: Selection) -> Result<(), std::io::Error> {
    match selection {
      Selection::Highlighted(index) => {
        if let Some(det) = self.presenter.selected() {
          writeln!(self.out, "已选中第 {} 行: {}", index + 1, det.label())?;
        }
        self.refresh_preview()?;
      }
      Selection::Ignored => writeln!(self.out, "未选中任何检测结果")?,
    }
    Ok(())
  }

  fn write_state(&mut self) -> Result<(), std::io::Error> {
    let availability = self.presenter.availability();
    let on_off = |enabled: bool| if enabled { "可用" } else { "不可用" };
    writeln!(self.out, "状态: {}", self.presenter.state().name())?;
    if let Some(transform) = self.presenter.transform() {
      writeln!(
        self.out,
        "预览: {}x{} (缩放 {:.3})",
        transform.width, transform.height, transform.scale
      )?;
    }
    writeln!(
      self.out,
      "detect: {}, save: {}, select: {}",
      on_off(availability.detect),
      on_off(availability.save),
      on_off(availability.select)
    )
  }

  /// 预览写出失败只提示用户，不影响已经完成的操作
  fn refresh_preview(&mut self) -> Result<(), std::io::Error> {
    let (Some(path), Some(preview)) = (&self.preview, self.presenter.preview()) else {
      return Ok(());
    };
    match SaveImageFileOutput::new(path).save(&preview) {
      Ok(()) => debug!("预览已更新: {}", path.display()),
      Err(e) => {
        warn!("预览图 {} 写入失败: {}", path.display(), e);
        writeln!(self.out, "预览图未更新: {}", e)?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_commands() {
    assert_eq!(Command::parse("   "), Ok(None));
    assert_eq!(
      Command::parse("open /tmp/my photo.jpg"),
      Ok(Some(Command::Open(PathBuf::from("/tmp/my photo.jpg"))))
    );
    assert_eq!(Command::parse("detect"), Ok(Some(Command::Detect)));
    assert_eq!(Command::parse(" select 2 "), Ok(Some(Command::Select(2))));
    assert_eq!(
      Command::parse("click 12.5 40"),
      Ok(Some(Command::Click(12.5, 40.0)))
    );
    assert_eq!(Command::parse("exit"), Ok(Some(Command::Quit)));
  }

  #[test]
  fn rejects_bad_input() {
    assert_eq!(
      Command::parse("zoom"),
      Err(CommandError::Unknown("zoom".to_string()))
    );
    assert_eq!(
      Command::parse("save"),
      Err(CommandError::MissingArgument {
        command: "save",
        argument: "path"
      })
    );
    assert!(matches!(
      Command::parse("select two"),
      Err(CommandError::InvalidArgument { argument: "n", .. })
    ));
    assert!(matches!(
      Command::parse("select 0"),
      Err(CommandError::InvalidArgument { .. })
    ));
    assert_eq!(
      Command::parse("detect now"),
      Err(CommandError::TooManyArguments("detect"))
    );
    assert!(matches!(
      Command::parse("click 1"),
      Err(CommandError::MissingArgument { argument: "y", .. })
    ));
  }
}
