//! Confirmation email template.

use crate::domain::entities::EnrollmentRecord;
use crate::domain::errors::RenderError;
use crate::domain::notification::RenderedMessage;
use crate::ports::MessageRenderer;

/// Renders the "you're on the waitlist" message.
#[derive(Debug, Clone)]
pub struct ConfirmationRenderer {
    project_name: String,
}

impl ConfirmationRenderer {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
        }
    }
}

impl MessageRenderer for ConfirmationRenderer {
    fn render(&self, record: &EnrollmentRecord) -> Result<RenderedMessage, RenderError> {
        if self.project_name.trim().is_empty() {
            return Err(RenderError("project name is empty".into()));
        }

        let project = escape_html(&self.project_name);
        let greeting = match &record.name {
            Some(name) => format!("Hi {},", escape_html(name)),
            None => "Hi there,".to_string(),
        };

        let content = format!(
            "<h1>You're on the list!</h1>\
             <p>{greeting}</p>\
             <p>Thanks for joining the {project} waitlist with <strong>{email}</strong>.</p>\
             <p>You are number <strong>{position}</strong> in line. We'll let you know as soon as we're ready.</p>",
            email = escape_html(&record.email),
            position = record.position,
        );

        Ok(RenderedMessage {
            subject: format!("You're on the {} waitlist!", self.project_name),
            content,
        })
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
