//! Role- and context-aware assistant widget for the Waybill logistics platform.
//!
//! Answers questions from a hand-authored knowledge catalog chosen by the
//! user's role and the area of the application they are viewing, and
//! delivers replies through a simulated typing delay.

pub mod error;
pub mod knowledge;
pub mod renderer;
pub mod resolver;
pub mod session;
pub mod signals;

pub use error::AssistantError;
pub use knowledge::{KnowledgeBase, RoleBranch};
pub use renderer::{
    ConversationRenderer, EventLog, PendingReply, RenderEvent, RenderTarget, ReplyCycle, TurnState,
};
pub use resolver::{ResponseResolver, SmallTalk};
pub use session::{AssistantWidget, WidgetState};
pub use signals::{
    classify_role, select_context, IdentitySource, LocationSource, SignalDetector, StaticIdentity,
    ROLE_PRECEDENCE,
};
