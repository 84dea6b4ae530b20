//! The interactive chat loop.

use std::path::Path;

use anyhow::Context as _;
use docchat_core::message::Role;

use crate::app::{App, print_documents, print_messages, read_pdf, upload_with_progress};

const HELP: &str = "\
/select [id]       select a document (no id clears the selection)
/docs              list documents
/upload <file>     upload a PDF and select it
/search [term]     filter messages (no term clears the filter)
/edit <n> <text>   replace message n
/rm <n>            delete message n
/clear             clear the conversation on screen
/export            write the conversation to a JSON file
/quit              leave
anything else is asked about the selected document";

/// One line of chat input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
  Ask(String),
  Select(Option<String>),
  Docs,
  Upload(String),
  Search(String),
  /// 1-based index into the visible messages.
  Edit(usize, String),
  Remove(usize),
  Clear,
  Export,
  Help,
  Quit,
  Nothing,
}

impl Input {
  pub fn parse(line: &str) -> Result<Self, String> {
    let line = line.trim();
    if line.is_empty() {
      return Ok(Input::Nothing);
    }
    let Some(command) = line.strip_prefix('/') else {
      return Ok(Input::Ask(line.to_owned()));
    };

    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    let rest = rest.trim();
    let index = |s: &str| {
      s.parse::<usize>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| format!("not a message number: {s:?}"))
    };

    match name {
      "select" => Ok(Input::Select((!rest.is_empty()).then(|| rest.to_owned()))),
      "docs" => Ok(Input::Docs),
      "upload" if !rest.is_empty() => Ok(Input::Upload(rest.to_owned())),
      "upload" => Err("usage: /upload <file>".into()),
      "search" => Ok(Input::Search(rest.to_owned())),
      "edit" => {
        let (n, text) = rest.split_once(' ').ok_or("usage: /edit <n> <text>")?;
        let text = text.trim();
        if text.is_empty() {
          return Err("usage: /edit <n> <text>".into());
        }
        Ok(Input::Edit(index(n)?, text.to_owned()))
      }
      "rm" => Ok(Input::Remove(index(rest)?)),
      "clear" => Ok(Input::Clear),
      "export" => Ok(Input::Export),
      "help" | "?" => Ok(Input::Help),
      "quit" | "exit" | "q" => Ok(Input::Quit),
      other => Err(format!("unknown command /{other}; try /help")),
    }
  }
}

pub async fn run(app: &App) -> anyhow::Result<()> {
  let chat = &app.chat;
  println!("Type a question, or /help for commands.");
  print_messages(&chat.visible_messages());

  loop {
    let prompt = match chat.selected_document() {
      Some(doc) => format!("{doc}> "),
      None => "> ".to_owned(),
    };
    let Some(line) = app.prompt.lock().await.line(&prompt).await? else {
      break;
    };

    let input = match Input::parse(&line) {
      Ok(input) => input,
      Err(usage) => {
        eprintln!("{usage}");
        continue;
      }
    };

    match input {
      Input::Nothing => continue,
      Input::Quit => break,
      Input::Help => println!("{HELP}"),
      Input::Ask(question) => {
        let before = chat.messages().len();
        chat.send(&question).await;
        let fresh = chat.messages();
        for msg in fresh.iter().skip(before).filter(|m| m.role == Role::Assistant) {
          println!("{}: {}", msg.role, msg.content);
        }
      }
      Input::Select(doc) => {
        chat.select_document(doc).await;
        print_messages(&chat.visible_messages());
      }
      Input::Docs => {
        chat.refresh_documents().await;
        print_documents(&chat.documents(), chat.selected_document().as_deref());
      }
      Input::Upload(path) => match read_pdf(Path::new(&path)).await {
        Ok(file) => {
          upload_with_progress(chat, file).await;
          if let Some(last) = chat.messages().last() {
            println!("{}", last.content);
          }
        }
        Err(e) => eprintln!("{e:#}"),
      },
      Input::Search(term) => {
        // Wait out the debounce window so the filter is applied.
        chat.search(term).await.context("search task failed")?;
        print_messages(&chat.visible_messages());
      }
      Input::Edit(n, text) => match chat.visible_messages().get(n - 1) {
        Some(msg) => {
          chat.set_editing(&msg.id, true);
          chat.edit_message(&msg.id, &text);
          print_messages(&chat.visible_messages());
        }
        None => eprintln!("no message {n}"),
      },
      Input::Remove(n) => match chat.visible_messages().get(n - 1) {
        Some(msg) => {
          chat.delete_message(&msg.id);
          print_messages(&chat.visible_messages());
        }
        None => eprintln!("no message {n}"),
      },
      Input::Clear => chat.clear_chat(),
      Input::Export => {
        let export = chat.export_chat();
        let path = export.file_name();
        let json = serde_json::to_string_pretty(&export)?;
        tokio::fs::write(&path, json)
          .await
          .with_context(|| format!("failed to write {path}"))?;
        println!("Wrote {path}");
      }
    }
    app.report();
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_text_is_a_question() {
    assert_eq!(Input::parse("  what is this? "), Ok(Input::Ask("what is this?".into())));
    assert_eq!(Input::parse("   "), Ok(Input::Nothing));
  }

  #[test]
  fn select_with_and_without_id() {
    assert_eq!(Input::parse("/select doc-1"), Ok(Input::Select(Some("doc-1".into()))));
    assert_eq!(Input::parse("/select"), Ok(Input::Select(None)));
  }

  #[test]
  fn edit_keeps_the_whole_text() {
    assert_eq!(
      Input::parse("/edit 2 the owl is  nocturnal"),
      Ok(Input::Edit(2, "the owl is  nocturnal".into()))
    );
    assert!(Input::parse("/edit 2").is_err());
    assert!(Input::parse("/edit x hello").is_err());
  }

  #[test]
  fn message_numbers_start_at_one() {
    assert_eq!(Input::parse("/rm 1"), Ok(Input::Remove(1)));
    assert!(Input::parse("/rm 0").is_err());
    assert!(Input::parse("/rm").is_err());
  }

  #[test]
  fn search_may_be_empty() {
    assert_eq!(Input::parse("/search"), Ok(Input::Search(String::new())));
    assert_eq!(Input::parse("/search Owl Wings"), Ok(Input::Search("Owl Wings".into())));
  }

  #[test]
  fn unknown_commands_are_rejected() {
    let err = Input::parse("/frobnicate").unwrap_err();
    assert!(err.contains("/frobnicate"));
  }
}
