use crate::config::CompanyProfile;
use crate::types::ChatMessage;

/// Persona and policy instructions for the support assistant.
pub fn persona_prompt(company: &CompanyProfile) -> String {
    format!(
        "You are a helpful customer support assistant for {name}.\n\
         \n\
         Company Contact Info:\n\
         - Phone: {phone}\n\
         - Email: {email}\n\
         \n\
         Instructions:\n\
         1. Answer the user's question using ONLY the provided context.\n\
         2. If the answer is found in the context, you MUST cite the document name and page number as [Source: file_name, Page: X].\n\
         3. If the answer is NOT found in the context, strictly state that you couldn't find the answer and suggest creating a support ticket.\n\
         4. If the user asks to create a ticket, collect necessary details (Name, Email, Summary, Description) if not provided, and call the create_support_ticket tool.",
        name = company.name,
        phone = company.phone,
        email = company.email,
    )
}

/// Builds the message sequence sent to the model.
///
/// Order is fixed: persona, retrieved context, history as given, query.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    system_prompt: String,
}

impl PromptAssembler {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    pub fn for_company(company: &CompanyProfile) -> Self {
        Self::new(persona_prompt(company))
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn build(&self, context: &str, history: &[ChatMessage], query: &str) -> Vec<ChatMessage> {
        build_messages(&self.system_prompt, context, history, query)
    }
}

pub fn build_messages(
    system_prompt: &str,
    context: &str,
    history: &[ChatMessage],
    query: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(ChatMessage::system(system_prompt));
    messages.push(ChatMessage::system(format!("Context available:\n{}", context)));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(query));
    messages
}
