use anyhow::Result;
use careerbot_core::{
    route, AuthClient, AuthError, AuthRequest, AuthScreen, AuthState, ChatController, ChatSession,
    Config, ConnectionState, QuestionInput, SessionEvent, SessionStore, TokenStorage, View,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub type Storage = Box<dyn TokenStorage>;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub config: Config,
    pub store: SessionStore<Storage>,
    auth_state: watch::Receiver<AuthState>,

    // Auth screen state
    pub auth: AuthScreen,
    pub auth_client: AuthClient,
    pub auth_task: Option<JoinHandle<Result<String, AuthError>>>,

    // Chat state
    pub chat: Option<ChatSession>,
    pub session_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    pub input: QuestionInput,
    input_revision: u64,
    pub input_error: Option<String>,
    /// Problems outside the chat itself (bad API URL, token file trouble)
    pub status: Option<String>,

    // Chat scroll state
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_bottom: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    /// Builds the app and, when a token was persisted, opens the chat.
    pub fn new(config: Config, storage: Storage) -> Result<Self> {
        let mut store = SessionStore::new(storage);
        let auth_state = store.subscribe();
        store.init()?;

        let auth_client = AuthClient::new(&config.api_url());

        let mut app = Self {
            should_quit: false,
            config,
            store,
            auth_state,
            auth: AuthScreen::new(),
            auth_client,
            auth_task: None,
            chat: None,
            session_rx: None,
            input: QuestionInput::default(),
            input_revision: 0,
            input_error: None,
            status: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_bottom: true,
            animation_frame: 0,
        };
        app.sync_session();
        Ok(app)
    }

    pub fn view(&self) -> View {
        route(self.store.state())
    }

    /// Opens or tears down the chat when the session store changed.
    pub fn sync_session(&mut self) {
        if !self.auth_state.has_changed().unwrap_or(false) {
            return;
        }
        let state = *self.auth_state.borrow_and_update();
        match state {
            AuthState::Authenticated => self.open_chat(),
            AuthState::Unauthenticated => self.close_chat(),
        }
    }

    fn open_chat(&mut self) {
        let Some(token) = self.store.token() else {
            return;
        };
        let url = match self.config.chat_url(token) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "cannot build chat address");
                self.status = Some(format!("Bad API URL: {}", e));
                return;
            }
        };

        self.close_chat();
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = ChatController::new(self.config.total_questions());
        let mut session = ChatSession::new(controller, url, tx);
        session.start();
        self.chat = Some(session);
        self.session_rx = Some(rx);
        self.status = None;
        self.follow_bottom = true;
        self.sync_input();
    }

    fn close_chat(&mut self) {
        if let Some(mut chat) = self.chat.take() {
            chat.shutdown();
        }
        self.session_rx = None;
        self.input = QuestionInput::default();
        self.input_revision = 0;
        self.input_error = None;
        self.chat_scroll = 0;
    }

    // Auth

    pub fn submit_auth(&mut self) {
        if self.auth_task.is_some() {
            return;
        }
        let Some(request) = self.auth.request() else {
            return;
        };
        let client = self.auth_client.clone();
        self.auth_task = Some(tokio::spawn(async move {
            match request {
                AuthRequest::Login { login, password } => client.login(&login, &password).await,
                AuthRequest::Register {
                    login,
                    email,
                    password,
                } => client.register(&login, &email, &password).await,
            }
        }));
    }

    /// Collects a finished auth request, if any.
    pub async fn poll_auth_task(&mut self) {
        if !self.auth_task.as_ref().is_some_and(|t| t.is_finished()) {
            return;
        }
        let Some(task) = self.auth_task.take() else {
            return;
        };
        match task.await {
            Ok(Ok(token)) => self.sign_in(&token),
            Ok(Err(e)) => self.auth.fail(e.to_string()),
            Err(e) => {
                error!(error = %e, "auth task failed");
                self.auth.fail("no connection");
            }
        }
    }

    pub fn sign_in(&mut self, token: &str) {
        match self.store.set(token) {
            Ok(()) => {
                self.auth.reset();
                self.sync_session();
            }
            Err(e) => {
                error!(error = %e, "could not save session");
                self.auth.fail(format!("Could not save session: {}", e));
            }
        }
    }

    /// Forgets the token, then closes the chat. A token that cannot be
    /// removed keeps the chat open.
    pub fn logout(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "could not remove saved session");
            self.status = Some(format!("Could not log out: {}", e));
            return;
        }
        self.close_chat();
        self.auth.reset();
        self.sync_session();
        info!("logged out");
    }

    // Chat

    pub fn on_session_event(&mut self, event: SessionEvent) {
        if let Some(chat) = self.chat.as_mut() {
            chat.handle_event(event);
        }
        self.sync_input();
        if self.follow_bottom {
            self.scroll_chat_to_bottom();
        }
    }

    /// Rebuilds the input whenever a new question arrived or the old one went away.
    fn sync_input(&mut self) {
        let Some(chat) = self.chat.as_ref() else {
            return;
        };
        let controller = chat.controller();
        if controller.question_revision() != self.input_revision {
            self.input_revision = controller.question_revision();
            self.input.set_question(controller.current_question());
            self.input_error = None;
        }
    }

    pub fn submit_answer(&mut self) {
        let Some(chat) = self.chat.as_mut() else {
            return;
        };
        // Keep what was typed while the answer could not go out.
        if !chat.controller().can_send() {
            return;
        }
        match self.input.submit(|answer| {
            chat.send_answer(&answer);
        }) {
            Ok(()) => {
                self.input_error = None;
                self.follow_bottom = true;
                self.scroll_chat_to_bottom();
            }
            Err(rejection) => self.input_error = Some(rejection.to_string()),
        }
    }

    pub fn new_chat(&mut self) {
        if let Some(chat) = self.chat.as_mut() {
            chat.new_chat();
        }
        self.chat_scroll = 0;
        self.follow_bottom = true;
        self.sync_input();
    }

    pub fn reconnect(&mut self) {
        if let Some(chat) = self.chat.as_mut() {
            if chat.controller().can_reconnect() {
                chat.reconnect();
            }
        }
    }

    /// Esc: drop whichever banners are up.
    pub fn dismiss_banners(&mut self) {
        self.input_error = None;
        self.status = None;
        if let Some(chat) = self.chat.as_mut() {
            chat.dismiss_validation();
            chat.dismiss_notice();
        }
    }

    pub fn controller(&self) -> Option<&ChatController> {
        self.chat.as_ref().map(|c| c.controller())
    }

    pub fn is_busy(&self) -> bool {
        self.auth_task.is_some()
            || self
                .controller()
                .is_some_and(|c| c.is_awaiting_response() || c.state() == ConnectionState::Connecting)
    }

    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.chat_line_count().saturating_sub(self.visible_height());
        self.chat_scroll = (self.chat_scroll + lines).min(max_scroll);
        self.follow_bottom = self.chat_scroll >= max_scroll;
    }

    pub fn page_size(&self) -> u16 {
        (self.visible_height() / 2).max(1)
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        let total_lines = self.chat_line_count();
        let visible_height = self.visible_height();
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Rough count of rendered chat lines, mirroring the layout in `ui`.
    pub fn chat_line_count(&self) -> u16 {
        let Some(controller) = self.controller() else {
            return 0;
        };
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;
        for msg in controller.messages() {
            // Label line ("You:", "Bot:", ...) and the blank line after
            total_lines = total_lines.saturating_add(2);
            for line in msg.content.lines() {
                let char_count = line.chars().count();
                total_lines = total_lines.saturating_add(char_count / wrap_width + 1);
            }
        }
        if controller.is_awaiting_response() {
            total_lines = total_lines.saturating_add(2);
        }
        u16::try_from(total_lines).unwrap_or(u16::MAX)
    }

    /// Closes the chat connection before exit.
    pub fn shutdown(&mut self) {
        self.close_chat();
        if let Some(task) = self.auth_task.take() {
            task.abort();
        }
    }
}

/// Next event of the open chat; pending forever when there is none.
pub async fn next_session_event(
    rx: Option<&mut mpsc::UnboundedReceiver<SessionEvent>>,
) -> Option<SessionEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
