//! View routing and the auth screen model

use crate::session::AuthState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Auth,
    Chat,
}

pub fn route(state: AuthState) -> View {
    match state {
        AuthState::Unauthenticated => View::Auth,
        AuthState::Authenticated => View::Chat,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

impl AuthMode {
    pub fn title(&self) -> &'static str {
        match self {
            AuthMode::Login => "Login",
            AuthMode::Register => "Register",
        }
    }

    pub fn switch_text(&self) -> &'static str {
        match self {
            AuthMode::Login => "Need an account? Register",
            AuthMode::Register => "Have an account? Login",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    Login,
    Email,
    Password,
}

impl AuthField {
    pub fn label(&self) -> &'static str {
        match self {
            AuthField::Login => "Login",
            AuthField::Email => "Email",
            AuthField::Password => "Password",
        }
    }
}

/// A validated form submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequest {
    Login {
        login: String,
        password: String,
    },
    Register {
        login: String,
        email: String,
        password: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct AuthScreen {
    pub mode: AuthMode,
    pub login: String,
    pub email: String,
    pub password: String,
    focus: usize,
    pending: bool,
    error: Option<String>,
}

impl AuthScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields shown in the current mode, in tab order.
    pub fn fields(&self) -> &'static [AuthField] {
        match self.mode {
            AuthMode::Login => &[AuthField::Login, AuthField::Password],
            AuthMode::Register => &[AuthField::Login, AuthField::Email, AuthField::Password],
        }
    }

    pub fn focused(&self) -> AuthField {
        let fields = self.fields();
        fields[self.focus.min(fields.len() - 1)]
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % self.fields().len();
    }

    pub fn focus_prev(&mut self) {
        let len = self.fields().len();
        self.focus = (self.focus + len - 1) % len;
    }

    pub fn value(&self, field: AuthField) -> &str {
        match field {
            AuthField::Login => &self.login,
            AuthField::Email => &self.email,
            AuthField::Password => &self.password,
        }
    }

    fn focused_value_mut(&mut self) -> &mut String {
        match self.focused() {
            AuthField::Login => &mut self.login,
            AuthField::Email => &mut self.email,
            AuthField::Password => &mut self.password,
        }
    }

    pub fn push_char(&mut self, c: char) {
        self.focused_value_mut().push(c);
    }

    pub fn pop_char(&mut self) {
        self.focused_value_mut().pop();
    }

    /// Switches between login and register, clearing the last error.
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        };
        self.focus = 0;
        self.error = None;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Builds a request when every visible field is filled in, and marks the
    /// form as waiting for the server.
    pub fn request(&mut self) -> Option<AuthRequest> {
        if self.pending {
            return None;
        }
        if let Some(empty) = self.fields().iter().find(|f| self.value(**f).trim().is_empty()) {
            self.error = Some(format!("{} is required", empty.label()));
            return None;
        }
        self.error = None;
        self.pending = true;
        let login = self.login.trim().to_string();
        Some(match self.mode {
            AuthMode::Login => AuthRequest::Login {
                login,
                password: self.password.clone(),
            },
            AuthMode::Register => AuthRequest::Register {
                login,
                email: self.email.trim().to_string(),
                password: self.password.clone(),
            },
        })
    }

    /// Records a failed attempt.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.pending = false;
        self.error = Some(message.into());
    }

    /// Clears the form after a successful attempt or a logout.
    pub fn reset(&mut self) {
        let mode = self.mode;
        *self = Self::default();
        self.mode = mode;
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(screen: &mut AuthScreen, s: &str) {
        for c in s.chars() {
            screen.push_char(c);
        }
    }

    #[test]
    fn test_route() {
        assert_eq!(route(AuthState::Unauthenticated), View::Auth);
        assert_eq!(route(AuthState::Authenticated), View::Chat);
    }

    #[test]
    fn test_login_request() {
        let mut screen = AuthScreen::new();
        type_str(&mut screen, "a");
        screen.focus_next();
        assert_eq!(screen.focused(), AuthField::Password);
        type_str(&mut screen, "p");
        assert_eq!(
            screen.request(),
            Some(AuthRequest::Login {
                login: "a".to_string(),
                password: "p".to_string()
            })
        );
        assert!(screen.is_pending());
        // No second request while one is in flight.
        assert_eq!(screen.request(), None);
    }

    #[test]
    fn test_register_requires_email() {
        let mut screen = AuthScreen::new();
        screen.toggle_mode();
        assert_eq!(screen.fields().len(), 3);
        type_str(&mut screen, "user");
        screen.focus_prev();
        assert_eq!(screen.focused(), AuthField::Password);
        type_str(&mut screen, "pw");
        assert_eq!(screen.request(), None);
        assert_eq!(screen.error(), Some("Email is required"));
        assert!(!screen.is_pending());
    }

    #[test]
    fn test_toggle_clears_error() {
        let mut screen = AuthScreen::new();
        screen.fail("invalid credentials");
        assert_eq!(screen.error(), Some("invalid credentials"));
        screen.toggle_mode();
        assert_eq!(screen.mode, AuthMode::Register);
        assert_eq!(screen.error(), None);
        screen.toggle_mode();
        assert_eq!(screen.mode, AuthMode::Login);
    }

    #[test]
    fn test_fail_allows_retry() {
        let mut screen = AuthScreen::new();
        type_str(&mut screen, "a");
        screen.focus_next();
        type_str(&mut screen, "p");
        screen.request().unwrap();
        screen.fail("no connection");
        assert!(!screen.is_pending());
        assert!(screen.request().is_some());
    }
}
