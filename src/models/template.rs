use crate::error::CrmResult;
use crate::models::contact::Contact;
use crate::models::tenant::TenantId;
use crate::models::validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reusable email template with `{{placeholder}}` variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: String,
    pub organization_id: TenantId,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub created_ts: i64,
    pub modified_ts: i64,
}

/// Values substituted into a template
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: BTreeMap<String, String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard variables for a contact: prenom, nom, email, telephone
    pub fn for_contact(contact: &Contact) -> Self {
        let mut vars = Self::new();
        vars.set("prenom", &contact.first_name);
        vars.set("nom", &contact.last_name);
        if let Some(email) = &contact.email {
            vars.set("email", email);
        }
        if let Some(phone) = &contact.phone {
            vars.set("telephone", phone);
        }
        vars
    }

    pub fn set(&mut self, key: &str, value: &str) -> &mut Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Rendered subject and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

impl EmailTemplate {
    pub fn render(&self, vars: &TemplateVars) -> RenderedEmail {
        RenderedEmail {
            subject: render_text(&self.subject, vars),
            body: render_text(&self.body, vars),
        }
    }

    /// Placeholder names used by subject and body, in order of first appearance
    pub fn placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        for text in [&self.subject, &self.body] {
            let mut rest = text.as_str();
            while let Some(start) = rest.find("{{") {
                let after = &rest[start + 2..];
                match after.find("}}") {
                    Some(end) => {
                        let name = after[..end].trim().to_string();
                        if !name.is_empty() && !names.contains(&name) {
                            names.push(name);
                        }
                        rest = &after[end + 2..];
                    }
                    None => break,
                }
            }
        }
        names
    }
}

/// Substitute `{{name}}` occurrences. Unknown placeholders are kept verbatim.
pub fn render_text(text: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub subject: String,
    pub body: String,
}

impl NewTemplate {
    pub fn validate(&self) -> CrmResult<()> {
        validate::non_empty(&self.name, "Template name")?;
        validate::non_empty(&self.subject, "Subject")?;
        Ok(())
    }

    pub fn into_template(self, tenant: &TenantId) -> EmailTemplate {
        let now = chrono::Utc::now().timestamp();
        EmailTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: tenant.clone(),
            name: self.name.trim().to_string(),
            subject: self.subject,
            body: self.body,
            created_ts: now,
            modified_ts: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}
