//! Session controller: the assistant widget instance.
//!
//! Wires the signal detector, resolver and renderer together, tracks
//! visibility and the unread badge, and debounces navigation notifications.
//! Each instance owns its own state; any number may coexist.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use waybill_core::config::AssistantConfig;
use waybill_core::{Context, QuickOption, Response, Role, Turn};

use crate::error::AssistantError;
use crate::knowledge::KnowledgeBase;
use crate::renderer::{ConversationRenderer, PendingReply, RenderTarget};
use crate::resolver::ResponseResolver;
use crate::signals::{IdentitySource, LocationSource, SignalDetector};

/// Observable widget state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetState {
    pub open: bool,
    pub role: Role,
    pub context: Context,
    pub unread_badge: bool,
}

struct WidgetShared {
    id: Uuid,
    config: AssistantConfig,
    resolver: ResponseResolver,
    detector: SignalDetector,
    renderer: Arc<ConversationRenderer>,
    target: Arc<dyn RenderTarget>,
    state: Mutex<WidgetState>,
    navigation_epoch: AtomicU64,
    runtime: Handle,
    cancel: CancellationToken,
}

impl WidgetShared {
    fn state(&self) -> MutexGuard<'_, WidgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn show_badge(&self) {
        let mut state = self.state();
        if state.open {
            tracing::debug!(widget = %self.id, "Badge skipped, widget already open");
            return;
        }
        state.unread_badge = true;
        self.target.set_badge(true);
        tracing::debug!(widget = %self.id, "Unread badge shown");
    }

    fn redetect_context(&self) -> Context {
        let context = self.detector.detect_context();
        let mut state = self.state();
        if state.context != context {
            tracing::info!(
                widget = %self.id,
                from = %state.context,
                to = %context,
                "Active context changed"
            );
            state.context = context.clone();
        }
        context
    }
}

/// An embedded assistant widget bound to one host page.
///
/// Dropping the widget cancels every pending timer.
pub struct AssistantWidget {
    shared: Arc<WidgetShared>,
}

impl AssistantWidget {
    /// Create a widget and start its badge timer.
    ///
    /// Must be called from within a Tokio runtime; the role is classified
    /// once here and never changes afterwards.
    pub fn new(
        config: AssistantConfig,
        knowledge: Arc<KnowledgeBase>,
        identity: Arc<dyn IdentitySource>,
        location: Arc<dyn LocationSource>,
        target: Arc<dyn RenderTarget>,
    ) -> Result<Self, AssistantError> {
        let runtime =
            Handle::try_current().map_err(|e| AssistantError::NoRuntime(e.to_string()))?;
        let detector = SignalDetector::new(identity, location);
        let role = detector.detect_role();
        let context = detector.detect_context();
        let renderer = Arc::new(ConversationRenderer::new(
            Arc::clone(&target),
            config.typing_delay(),
        ));

        let shared = Arc::new(WidgetShared {
            id: Uuid::new_v4(),
            config,
            resolver: ResponseResolver::new(knowledge),
            detector,
            renderer,
            target,
            state: Mutex::new(WidgetState {
                open: false,
                role,
                context,
                unread_badge: false,
            }),
            navigation_epoch: AtomicU64::new(0),
            runtime,
            cancel: CancellationToken::new(),
        });

        tracing::info!(widget = %shared.id, role = %role, "Assistant widget created");

        let widget = Self { shared };
        widget.schedule_badge();
        Ok(widget)
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn state(&self) -> WidgetState {
        self.shared.state().clone()
    }

    pub fn role(&self) -> Role {
        self.shared.state().role
    }

    pub fn context(&self) -> Context {
        self.shared.state().context.clone()
    }

    pub fn is_open(&self) -> bool {
        self.shared.state().open
    }

    pub fn has_unread_badge(&self) -> bool {
        self.shared.state().unread_badge
    }

    /// Snapshot of the conversation so far.
    pub fn transcript(&self) -> Vec<Turn> {
        self.shared.renderer.transcript()
    }

    /// Show the widget and clear the badge.
    ///
    /// With an empty transcript the active context is re-read and the
    /// greeting for it is scheduled; the returned handle resolves when it is
    /// revealed.
    pub fn open(&self) -> Result<Option<PendingReply>, AssistantError> {
        {
            let mut state = self.shared.state();
            state.open = true;
            if state.unread_badge {
                state.unread_badge = false;
                self.shared.target.set_badge(false);
            }
        }
        self.shared.target.set_visible(true);
        tracing::debug!(widget = %self.shared.id, "Widget opened");

        if !self.shared.renderer.is_empty() {
            return Ok(None);
        }

        let context = self.shared.redetect_context();
        let role = self.role();
        let cycle = self.shared.renderer.start_cycle(None)?;
        let shared = Arc::clone(&self.shared);
        let pending = self.shared.renderer.schedule_reveal(
            &self.shared.runtime,
            cycle,
            self.shared.cancel.child_token(),
            move || shared.resolver.resolve(role, context.as_str(), None),
        )?;
        Ok(Some(pending))
    }

    /// Hide the widget. The transcript is kept.
    pub fn close(&self) {
        self.shared.state().open = false;
        self.shared.target.set_visible(false);
        tracing::debug!(widget = %self.shared.id, "Widget closed");
    }

    /// Flip visibility, as the launcher button does.
    pub fn toggle(&self) -> Result<Option<PendingReply>, AssistantError> {
        if self.is_open() {
            self.close();
            Ok(None)
        } else {
            self.open()
        }
    }

    /// Submit free text typed by the user.
    ///
    /// The reply is resolved against the context active when it is revealed.
    pub fn submit_text(&self, query: &str) -> Result<PendingReply, AssistantError> {
        let text = query.trim();
        if text.is_empty() {
            return Err(AssistantError::EmptyMessage);
        }
        let max = self.shared.config.max_message_length;
        if text.chars().count() > max {
            return Err(AssistantError::MessageTooLong(max));
        }

        let cycle = self.shared.renderer.start_cycle(Some(text))?;
        let shared = Arc::clone(&self.shared);
        let query = text.to_string();
        self.shared.renderer.schedule_reveal(
            &self.shared.runtime,
            cycle,
            self.shared.cancel.child_token(),
            move || {
                let (role, context) = {
                    let state = shared.state();
                    (state.role, state.context.clone())
                };
                shared
                    .resolver
                    .resolve(role, context.as_str(), Some(&query))
            },
        )
    }

    /// Submit a quick-reply click. The answer is revealed verbatim; no text
    /// search takes place.
    pub fn submit_option(
        &self,
        trigger: &str,
        answer: &str,
    ) -> Result<PendingReply, AssistantError> {
        let cycle = self.shared.renderer.start_cycle(Some(trigger))?;
        let answer = answer.to_string();
        self.shared.renderer.schedule_reveal(
            &self.shared.runtime,
            cycle,
            self.shared.cancel.child_token(),
            move || Response::text(answer),
        )
    }

    /// Click a [`QuickOption`] taken from an assistant turn.
    pub fn choose(&self, option: &QuickOption) -> Result<PendingReply, AssistantError> {
        self.submit_option(&option.trigger, &option.answer)
    }

    /// Host notification that the user interacted with the page.
    ///
    /// The active context is re-read after the debounce period; a newer
    /// notification supersedes a pending one. The transcript is not touched.
    pub fn notify_navigation(&self) {
        let epoch = self.shared.navigation_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let shared = Arc::clone(&self.shared);
        let cancel = self.shared.cancel.child_token();
        let debounce = self.shared.config.navigation_debounce();

        self.shared.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(debounce) => {
                    if shared.navigation_epoch.load(Ordering::SeqCst) == epoch {
                        shared.redetect_context();
                    }
                }
            }
        });
    }

    // -- Private helpers --

    fn schedule_badge(&self) {
        let shared = Arc::clone(&self.shared);
        let cancel = self.shared.cancel.child_token();
        let delay = self.shared.config.badge_delay();

        self.shared.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => shared.show_badge(),
            }
        });
    }
}

impl Drop for AssistantWidget {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
        tracing::debug!(widget = %self.shared.id, "Assistant widget dropped");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{EventLog, RenderEvent};
    use crate::signals::StaticIdentity;
    use std::time::Duration;
    use waybill_core::TurnKind;

    struct Sections(Mutex<Vec<String>>);

    impl Sections {
        fn new(ids: &[&str]) -> Arc<Self> {
            Arc::new(Self(Mutex::new(
                ids.iter().map(|s| s.to_string()).collect(),
            )))
        }

        fn show(&self, ids: &[&str]) {
            *self.0.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
        }
    }

    impl LocationSource for Sections {
        fn visible_sections(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn widget(route: &str, sections: Arc<Sections>) -> (AssistantWidget, Arc<EventLog>) {
        let log = Arc::new(EventLog::new());
        let widget = AssistantWidget::new(
            AssistantConfig::default(),
            Arc::new(KnowledgeBase::builtin()),
            Arc::new(StaticIdentity(route.to_string())),
            sections,
            log.clone(),
        )
        .unwrap();
        (widget, log)
    }

    fn last_assistant(widget: &AssistantWidget) -> (String, Vec<QuickOption>) {
        widget
            .transcript()
            .into_iter()
            .rev()
            .find_map(|turn| match turn.kind {
                TurnKind::Assistant { message, options } => Some((message, options)),
                _ => None,
            })
            .unwrap()
    }

    // ---- Construction ----

    #[test]
    fn test_new_without_runtime_errors() {
        let result = AssistantWidget::new(
            AssistantConfig::default(),
            Arc::new(KnowledgeBase::builtin()),
            Arc::new(StaticIdentity::default()),
            Sections::new(&[]),
            Arc::new(EventLog::new()),
        );
        assert!(matches!(result, Err(AssistantError::NoRuntime(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state() {
        let (widget, _) = widget("/admin/home", Sections::new(&["finance-view"]));
        let state = widget.state();
        assert!(!state.open);
        assert_eq!(state.role, Role::Admin);
        assert_eq!(state.context.as_str(), "finance-view");
        assert!(!state.unread_badge);
        assert!(widget.transcript().is_empty());
    }

    // ---- Open / close ----

    #[tokio::test(start_paused = true)]
    async fn test_open_greets_with_typing_delay() {
        let (widget, _) = widget("/client/box", Sections::new(&["box-view"]));
        let pending = widget.open().unwrap().expect("greeting scheduled");
        assert!(widget.is_open());

        let transcript = widget.transcript();
        assert_eq!(transcript.len(), 1);
        assert!(transcript[0].is_typing());

        pending.revealed().await.unwrap();
        let (message, options) = last_assistant(&widget);
        assert!(message.contains("caixa"));
        assert!(options.iter().any(|o| o.trigger == "Como enviar?"));
        assert_eq!(widget.transcript().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_uses_fresh_context() {
        let sections = Sections::new(&[]);
        let (widget, _) = widget("/client", sections.clone());
        assert!(widget.context().is_default());

        sections.show(&["box-view"]);
        let pending = widget.open().unwrap().unwrap();
        assert_eq!(widget.context().as_str(), "box-view");
        pending.revealed().await.unwrap();
        assert!(last_assistant(&widget).0.contains("acumulados"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_does_not_repeat_greeting() {
        let (widget, log) = widget("/employee", Sections::new(&[]));
        widget.open().unwrap().unwrap().revealed().await.unwrap();
        widget.close();
        assert!(!widget.is_open());
        assert!(widget.open().unwrap().is_none());
        assert_eq!(widget.transcript().len(), 1);
        assert!(log.events().contains(&RenderEvent::Visibility(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle() {
        let (widget, _) = widget("/", Sections::new(&[]));
        assert!(widget.toggle().unwrap().is_some());
        assert!(widget.is_open());
        assert!(widget.toggle().unwrap().is_none());
        assert!(!widget.is_open());
    }

    // ---- Badge ----

    #[tokio::test(start_paused = true)]
    async fn test_badge_appears_after_delay_and_clears_on_open() {
        let (widget, log) = widget("/", Sections::new(&[]));
        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert!(!widget.has_unread_badge());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(widget.has_unread_badge());
        assert!(log.events().contains(&RenderEvent::Badge(true)));

        widget.open().unwrap();
        assert!(!widget.has_unread_badge());
        assert!(log.events().contains(&RenderEvent::Badge(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_badge_skipped_when_already_open() {
        let (widget, log) = widget("/", Sections::new(&[]));
        widget.open().unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!widget.has_unread_badge());
        assert!(!log.events().contains(&RenderEvent::Badge(true)));
    }

    // ---- Submissions ----

    #[tokio::test(start_paused = true)]
    async fn test_submit_text_appends_user_turn_immediately() {
        let (widget, _) = widget("/admin", Sections::new(&[]));
        let pending = widget.submit_text("  lucro ").unwrap();

        let transcript = widget.transcript();
        assert_eq!(
            transcript[0].kind,
            TurnKind::User {
                text: "lucro".to_string()
            }
        );
        assert_eq!(transcript[1].id, pending.placeholder());

        pending.revealed().await.unwrap();
        let (message, options) = last_assistant(&widget);
        assert!(message.contains("Financeiro > Relatórios"));
        assert!(options.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_text_rejects_empty() {
        let (widget, _) = widget("/", Sections::new(&[]));
        assert!(matches!(
            widget.submit_text("   "),
            Err(AssistantError::EmptyMessage)
        ));
        assert!(widget.transcript().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_text_rejects_too_long() {
        let (widget, _) = widget("/", Sections::new(&[]));
        let long = "é".repeat(501);
        assert!(matches!(
            widget.submit_text(&long),
            Err(AssistantError::MessageTooLong(500))
        ));
        let at_limit = "é".repeat(500);
        assert!(widget.submit_text(&at_limit).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_option_reveals_answer_verbatim() {
        let (widget, _) = widget("/visitor", Sections::new(&[]));
        // The answer is not in the catalog and would never match a scan.
        let pending = widget
            .submit_option("Rastrear pacote", "resposta injetada 🚚")
            .unwrap();
        pending.revealed().await.unwrap();

        let transcript = widget.transcript();
        assert_eq!(
            transcript[0].kind,
            TurnKind::User {
                text: "Rastrear pacote".to_string()
            }
        );
        assert_eq!(
            transcript[1].kind,
            TurnKind::Assistant {
                message: "resposta injetada 🚚".to_string(),
                options: vec![],
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_choose_option_from_greeting() {
        let (widget, _) = widget("/client", Sections::new(&["box-view"]));
        widget.open().unwrap().unwrap().revealed().await.unwrap();
        let (_, options) = last_assistant(&widget);
        let prohibited = options
            .iter()
            .find(|o| o.trigger == "Itens proibidos")
            .unwrap()
            .clone();

        widget.choose(&prohibited).unwrap().revealed().await.unwrap();
        assert_eq!(last_assistant(&widget).0, prohibited.answer);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_submissions_each_reveal() {
        let (widget, _) = widget("/client", Sections::new(&[]));
        let first = widget.submit_text("rastrear").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = widget.submit_text("obrigado").unwrap();

        first.revealed().await.unwrap();
        second.revealed().await.unwrap();

        let transcript = widget.transcript();
        assert_eq!(transcript.len(), 4);
        assert!(transcript.iter().all(|t| !t.is_typing()));
        // user, user, assistant, assistant
        assert!(matches!(transcript[0].kind, TurnKind::User { .. }));
        assert!(matches!(transcript[1].kind, TurnKind::User { .. }));
        assert!(matches!(transcript[2].kind, TurnKind::Assistant { .. }));
        assert!(matches!(transcript[3].kind, TurnKind::Assistant { .. }));
    }

    // ---- Navigation ----

    #[tokio::test(start_paused = true)]
    async fn test_navigation_is_debounced() {
        let sections = Sections::new(&[]);
        let (widget, _) = widget("/admin", sections.clone());

        sections.show(&["finance-view"]);
        widget.notify_navigation();
        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(widget.context().is_default());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(widget.context().as_str(), "finance-view");
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_navigation_supersedes_pending() {
        let sections = Sections::new(&[]);
        let (widget, _) = widget("/admin", sections.clone());

        sections.show(&["finance-view"]);
        widget.notify_navigation();
        tokio::time::sleep(Duration::from_millis(300)).await;
        widget.notify_navigation();
        tokio::time::sleep(Duration::from_millis(300)).await;
        // First timer fired at 500 ms but was superseded.
        assert!(widget.context().is_default());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(widget.context().as_str(), "finance-view");
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_leaves_transcript_untouched() {
        let sections = Sections::new(&[]);
        let (widget, _) = widget("/admin", sections.clone());
        widget.open().unwrap().unwrap().revealed().await.unwrap();
        let before = widget.transcript();

        sections.show(&["finance-view"]);
        widget.notify_navigation();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(widget.transcript(), before);
        assert_eq!(widget.context().as_str(), "finance-view");

        // Future misses use the new context's options.
        widget.submit_text("xyzzy").unwrap().revealed().await.unwrap();
        let (_, options) = last_assistant(&widget);
        assert!(options.iter().any(|o| o.trigger == "Relatório de lucro"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_role_is_fixed_for_widget_lifetime() {
        let (widget, _) = widget("/client/area", Sections::new(&[]));
        widget.notify_navigation();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(widget.role(), Role::Client);
    }

    // ---- Drop ----

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_reveal() {
        let (widget, log) = widget("/", Sections::new(&[]));
        let pending = widget.submit_text("oi").unwrap();
        drop(widget);
        assert_eq!(pending.revealed().await, None);
        assert!(!log
            .events()
            .iter()
            .any(|e| matches!(e, RenderEvent::Removed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_instances() {
        let (a, _) = widget("/admin", Sections::new(&[]));
        let (b, _) = widget("/client", Sections::new(&[]));
        assert_ne!(a.id(), b.id());
        a.submit_text("lucro").unwrap().revealed().await.unwrap();
        assert!(b.transcript().is_empty());
        assert_eq!(a.role(), Role::Admin);
        assert_eq!(b.role(), Role::Client);
    }
}
