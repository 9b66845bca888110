use std::collections::HashMap;
use std::io::{self, Write};

use crate::domain::{Message, MessageId, MessageLog, MessageRole};

/// Writes the transcript to a terminal as it changes.
///
/// User lines are already on screen because the user typed them, so only
/// assistant messages are streamed: the first sighting prints a label and the
/// current text, later renders print whatever was appended since.
pub struct TranscriptPrinter<W: Write> {
    out: W,
    progress: HashMap<MessageId, usize>,
}

impl<W: Write> TranscriptPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            progress: HashMap::new(),
        }
    }

    pub fn print_history(&mut self, messages: &[Message]) -> io::Result<()> {
        for message in messages {
            writeln!(self.out, "{}> {}", message.role, message.content)?;
            if message.role == MessageRole::Assistant {
                self.progress
                    .insert(message.id.clone(), message.content.len());
            }
        }
        self.out.flush()
    }

    pub fn render(&mut self, log: &MessageLog) -> io::Result<()> {
        for message in log.messages() {
            if message.role != MessageRole::Assistant {
                continue;
            }
            match self.progress.get(&message.id).copied() {
                None => {
                    write!(self.out, "{}> {}", message.role, message.content)?;
                }
                Some(printed) if message.content.len() > printed => {
                    write!(self.out, "{}", &message.content[printed..])?;
                }
                Some(_) => continue,
            }
            self.progress
                .insert(message.id.clone(), message.content.len());
        }

        let discarded: Vec<MessageId> = self
            .progress
            .keys()
            .filter(|id| !log.contains(id))
            .cloned()
            .collect();
        for id in discarded {
            self.progress.remove(&id);
            writeln!(self.out, " [reply discarded]")?;
        }

        self.out.flush()
    }

    /// Ends the current reply line.
    pub fn finish_reply(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.flush()
    }

    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "! {}", text)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
