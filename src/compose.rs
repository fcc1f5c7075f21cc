//! Email body drafting through an external text generator.
//!
//! The generator is opaque: a prompt goes in, text comes out. It is never
//! part of the stage engine and its failures never touch existing content.

use crate::notify::{Notification, Notifier};
use anyhow::{bail, Context, Result};
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Runs a shell command with the prompt on stdin; stdout is the generated text.
///
/// Configured with the `compose.command` rc key.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    command: String,
}

impl CommandGenerator {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

impl TextGenerator for CommandGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start generator '{}'", self.command))?;
        // Feed stdin from its own thread so a large answer cannot block the prompt
        let stdin = child.stdin.take();
        let prompt = prompt.to_owned();
        let writer = thread::spawn(move || -> io::Result<()> {
            match stdin {
                Some(mut stdin) => stdin.write_all(prompt.as_bytes()),
                None => Ok(()),
            }
        });
        let output = child.wait_with_output().context("Generator did not finish")?;
        let written = writer
            .join()
            .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "prompt writer panicked")));
        if !output.status.success() {
            bail!(
                "Generator exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        match written {
            // The command may answer without reading its whole prompt
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
            other => other.context("Failed to send prompt to generator")?,
        }
        let text = String::from_utf8(output.stdout).context("Generator output is not UTF-8")?;
        Ok(text.trim().to_string())
    }
}

/// Fill `body` from the generator when it is empty.
///
/// Returns whether the body was filled. A non-empty body is never
/// overwritten; a generator failure (or empty answer) is reported through
/// the notifier and leaves `body` as it was.
pub fn prefill_body(generator: &dyn TextGenerator, prompt: &str, body: &mut String, notifier: &dyn Notifier) -> bool {
    if !body.trim().is_empty() {
        return false;
    }
    match generator.generate(prompt) {
        Ok(text) if !text.trim().is_empty() => {
            *body = text;
            true
        }
        Ok(_) => {
            notifier.notify(Notification::error("Génération impossible", "Le générateur n'a rien renvoyé"));
            false
        }
        Err(e) => {
            log::warn!("text generation failed: {:#}", e);
            notifier.notify(Notification::error("Génération impossible", e.to_string()));
            false
        }
    }
}
