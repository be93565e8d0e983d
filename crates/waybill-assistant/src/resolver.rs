//! Response resolution for the assistant widget.
//!
//! Maps (role, context, optional free text) to a reply without any UI
//! dependency. Every input yields a reply; there is no error path.

use std::sync::Arc;

use waybill_core::{QuickOption, Response, Role};

use crate::knowledge::KnowledgeBase;

/// Tokens that mark a greeting.
pub const GREETING_TOKENS: [&str; 5] = ["oi", "olá", "bom dia", "boa tarde", "boa noite"];
/// Tokens that mark thanks.
pub const THANKS_TOKENS: [&str; 3] = ["obrigad", "valeu", "agradeço"];
/// Tokens that mark a farewell.
pub const FAREWELL_TOKENS: [&str; 3] = ["tchau", "até logo", "até mais"];

const GREETING_REPLY: &str = "Olá! Em que posso ajudar? Escolha uma das opções abaixo ou digite sua pergunta.";
const THANKS_REPLY: &str = "De nada! Estou aqui se precisar de mais alguma ajuda.";
const FAREWELL_REPLY: &str = "Até logo! Volte sempre que precisar.";
const NOT_UNDERSTOOD_REPLY: &str =
    "Desculpe, não entendi. Escolha uma das opções abaixo ou reformule sua pergunta.";

/// Small-talk category, checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmallTalk {
    Greeting,
    Thanks,
    Farewell,
}

impl SmallTalk {
    /// Classify an already-normalized query.
    pub fn detect(normalized: &str) -> Option<Self> {
        let has_any = |tokens: &[&str]| tokens.iter().any(|t| normalized.contains(t));
        if has_any(&GREETING_TOKENS) {
            Some(SmallTalk::Greeting)
        } else if has_any(&THANKS_TOKENS) {
            Some(SmallTalk::Thanks)
        } else if has_any(&FAREWELL_TOKENS) {
            Some(SmallTalk::Farewell)
        } else {
            None
        }
    }
}

/// Lowercase and trim a free-text query.
pub fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

// =============================================================================
// ResponseResolver
// =============================================================================

/// Resolves replies from the knowledge catalog.
#[derive(Debug, Clone)]
pub struct ResponseResolver {
    knowledge: Arc<KnowledgeBase>,
}

impl ResponseResolver {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Resolve a reply.
    ///
    /// `None` is the greeting path: the catalog entry for (role, context),
    /// or the role's default entry when the context is unmapped. Free text
    /// goes through the option scan, then small talk, then the
    /// not-understood reply.
    pub fn resolve(&self, role: Role, context: &str, query: Option<&str>) -> Response {
        let Some(query) = query else {
            return Response::from(self.knowledge.entry(role, context));
        };

        let normalized = normalize(query);
        if normalized.is_empty() {
            return self.not_understood(role, context);
        }

        if let Some(option) = self.search_options(role, &normalized) {
            tracing::debug!(role = %role, trigger = %option.trigger, "Option matched free text");
            return Response::text(option.answer.clone());
        }

        match SmallTalk::detect(&normalized) {
            Some(SmallTalk::Greeting) => Response {
                message: GREETING_REPLY.to_string(),
                options: self.context_options(role, context),
            },
            Some(SmallTalk::Thanks) => Response::text(THANKS_REPLY),
            Some(SmallTalk::Farewell) => Response::text(FAREWELL_REPLY),
            None => self.not_understood(role, context),
        }
    }

    /// Scan every option of every context visible to `role`.
    ///
    /// Matches when `normalized` is a substring of the lowercased trigger or
    /// answer. The last match in enumeration order wins.
    pub fn search_options(&self, role: Role, normalized: &str) -> Option<&QuickOption> {
        self.knowledge
            .branch(role)
            .options()
            .filter(|option| {
                option.trigger.to_lowercase().contains(normalized)
                    || option.answer.to_lowercase().contains(normalized)
            })
            .last()
    }

    fn context_options(&self, role: Role, context: &str) -> Vec<QuickOption> {
        self.knowledge.entry(role, context).options.clone()
    }

    fn not_understood(&self, role: Role, context: &str) -> Response {
        tracing::debug!(role = %role, context = %context, "Query not understood");
        Response {
            message: NOT_UNDERSTOOD_REPLY.to_string(),
            options: self.context_options(role, context),
        }
    }
}

impl Default for ResponseResolver {
    fn default() -> Self {
        Self::new(Arc::new(KnowledgeBase::builtin()))
    }
}

// =============================================================================
// Tests
// =============================================================================
