//! Terminal helpers for the interactive chat shell

mod spinner;

pub use spinner::ThinkingSpinner;

use crate::agents::message::{AgentMessage, Attachment, AttachmentKind};
use termimad::MadSkin;

/// Renders advisor messages as markdown in the terminal
pub struct Renderer {
    skin: MadSkin,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            skin: MadSkin::default(),
        }
    }

    /// Print one finalized message: content, then attachments and chips
    pub fn print_message(&self, message: &AgentMessage) {
        self.skin.print_text(&message.content);

        if !message.attachments.is_empty() {
            println!();
            for attachment in &message.attachments {
                println!("  {}", format_attachment(attachment));
            }
        }

        if !message.quick_actions.is_empty() {
            let chips: Vec<&str> = message
                .quick_actions
                .iter()
                .map(|a| a.label.as_str())
                .collect();
            println!("\n  [{}]", chips.join("] ["));
        }
        println!();
    }

    pub fn print_markdown(&self, text: &str) {
        self.skin.print_text(text);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn format_attachment(attachment: &Attachment) -> String {
    let marker = match attachment.kind {
        AttachmentKind::Link => "link",
        AttachmentKind::Document => "doc",
        AttachmentKind::Checklist => "checklist",
        AttachmentKind::Calculator => "calc",
        AttachmentKind::Resource => "resource",
    };
    match &attachment.url {
        Some(url) => format!("({marker}) {} -> {url}", attachment.title),
        None => format!("({marker}) {}", attachment.title),
    }
}
