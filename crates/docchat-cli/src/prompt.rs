//! Line input from stdin, shared by the one-shot prompts and the chat loop.

use std::io::Write as _;

use anyhow::bail;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

pub struct Prompt {
  lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
  pub fn stdin() -> Self {
    Self { lines: BufReader::new(tokio::io::stdin()).lines() }
  }

  /// Print `label` and read one line. `None` at end of input.
  pub async fn line(&mut self, label: &str) -> anyhow::Result<Option<String>> {
    print!("{label}");
    std::io::stdout().flush().ok();
    let line = self.lines.next_line().await?;
    Ok(line.map(|l| l.trim_end_matches('\r').to_owned()))
  }

  /// Like [`Prompt::line`], but end of input is an error.
  pub async fn required(&mut self, label: &str) -> anyhow::Result<String> {
    match self.line(label).await? {
      Some(line) => Ok(line),
      None => bail!("input closed while waiting for {}", label.trim_end_matches([' ', ':'])),
    }
  }
}
