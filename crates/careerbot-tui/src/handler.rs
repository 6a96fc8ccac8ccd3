use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use careerbot_core::{Affordance, View};
use crate::app::App;
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    app.poll_auth_task().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work on every screen
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.view() {
        View::Auth => handle_auth_key(app, key),
        View::Chat => handle_chat_key(app, key),
    }
}

fn handle_auth_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('t') if ctrl => app.auth.toggle_mode(),
        KeyCode::Esc => {
            app.auth.dismiss_error();
            app.status = None;
        }
        KeyCode::Tab | KeyCode::Down => app.auth.focus_next(),
        KeyCode::BackTab | KeyCode::Up => app.auth.focus_prev(),
        KeyCode::Enter => app.submit_auth(),
        KeyCode::Backspace => app.auth.pop_char(),
        KeyCode::Char(c) if !ctrl => app.auth.push_char(c),
        _ => {}
    }
}

fn handle_chat_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Session actions
    if ctrl {
        match key.code {
            KeyCode::Char('n') => app.new_chat(),
            KeyCode::Char('r') => app.reconnect(),
            KeyCode::Char('d') => app.logout(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.dismiss_banners(),
        KeyCode::PageUp => {
            let page = app.page_size();
            app.scroll_up(page);
        }
        KeyCode::PageDown => {
            let page = app.page_size();
            app.scroll_down(page);
        }
        KeyCode::Enter => {
            if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) {
                app.input.insert_newline();
            } else {
                app.submit_answer();
            }
        }
        _ => handle_input_key(app, key),
    }
}

/// Keys that edit the current question's input
fn handle_input_key(app: &mut App, key: KeyEvent) {
    let affordance = app.input.affordance().clone();
    match (key.code, &affordance) {
        (KeyCode::Up, Affordance::Range { .. }) | (KeyCode::Right, Affordance::Range { .. }) => {
            app.input.step_up()
        }
        (KeyCode::Down, Affordance::Range { .. }) | (KeyCode::Left, Affordance::Range { .. }) => {
            app.input.step_down()
        }
        (KeyCode::Up, Affordance::Select { .. } | Affordance::MultiSelect { .. }) => {
            app.input.highlight_prev()
        }
        (KeyCode::Down, Affordance::Select { .. } | Affordance::MultiSelect { .. }) => {
            app.input.highlight_next()
        }
        (KeyCode::Char(' '), Affordance::Select { .. } | Affordance::MultiSelect { .. }) => {
            app.input.toggle_highlighted()
        }
        (KeyCode::Up, _) => app.scroll_up(1),
        (KeyCode::Down, _) => app.scroll_down(1),
        (KeyCode::Left, _) => app.input.move_left(),
        (KeyCode::Right, _) => app.input.move_right(),
        (KeyCode::Home, _) => app.input.move_home(),
        (KeyCode::End, _) => app.input.move_end(),
        (KeyCode::Backspace, _) => app.input.backspace(),
        (KeyCode::Delete, _) => app.input.delete(),
        (KeyCode::Char(c), _) => app.input.insert_char(c),
        _ => return,
    }
    app.input_error = None;
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.view() != View::Chat {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(3),
        MouseEventKind::ScrollDown => app.scroll_down(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careerbot_core::{
        AuthField, AuthMode, Config, MemoryTokenStorage, SessionEvent, TransportEvent,
    };

    const SELECT_QUESTION: &str = r#"{"id":"q4","prompt":"Preferred format?","type":"select","options":["Remote","Office","Hybrid"],"progress":{"current":4,"total":12}}"#;
    const TEXT_QUESTION: &str = r#"{"id":"q5","prompt":"Describe a project","type":"text","constraints":{"max_length":200}}"#;

    fn config() -> Config {
        Config {
            api_url: Some("http://127.0.0.1:9".to_string()),
            default_total_questions: None,
        }
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn press_with(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
        handle_key(app, KeyEvent::new(code, modifiers));
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn chat_app(question: &str) -> App {
        let mut app = App::new(config(), Box::new(MemoryTokenStorage::with_token("tok"))).unwrap();
        let g = app.controller().unwrap().generation();
        app.on_session_event(SessionEvent::new(g, TransportEvent::Opened));
        app.on_session_event(SessionEvent::new(g, TransportEvent::Message(question.to_string())));
        app
    }

    #[tokio::test]
    async fn test_auth_form_keys() {
        let mut app = App::new(config(), Box::new(MemoryTokenStorage::default())).unwrap();
        type_str(&mut app, "ann");
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.auth.focused(), AuthField::Password);
        type_str(&mut app, "pw");
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.auth.login, "ann");
        assert_eq!(app.auth.password, "p");

        press_with(&mut app, KeyCode::Char('t'), KeyModifiers::CONTROL);
        assert_eq!(app.auth.mode, AuthMode::Register);
        assert_eq!(app.auth.focused(), AuthField::Login);
    }

    #[tokio::test]
    async fn test_enter_on_incomplete_form_shows_error() {
        let mut app = App::new(config(), Box::new(MemoryTokenStorage::default())).unwrap();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.auth.error(), Some("Login is required"));
        assert!(app.auth_task.is_none());
    }

    #[tokio::test]
    async fn test_ctrl_c_quits() {
        let mut app = App::new(config(), Box::new(MemoryTokenStorage::default())).unwrap();
        press_with(&mut app, KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_select_with_arrows_and_enter() {
        let mut app = chat_app(SELECT_QUESTION);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.input.chosen(), Some("Hybrid"));
        press(&mut app, KeyCode::Enter);
        let last = app.controller().unwrap().messages().last().unwrap();
        assert_eq!(last.content, "Hybrid");
    }

    #[tokio::test]
    async fn test_shift_enter_adds_newline() {
        let mut app = chat_app(TEXT_QUESTION);
        type_str(&mut app, "one");
        press_with(&mut app, KeyCode::Enter, KeyModifiers::SHIFT);
        type_str(&mut app, "two");
        assert_eq!(app.input.value(), "one\ntwo");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.input.value(), "");
        let last = app.controller().unwrap().messages().last().unwrap();
        assert_eq!(last.content, "one\ntwo");
    }

    #[tokio::test]
    async fn test_logout_key() {
        let mut app = chat_app(TEXT_QUESTION);
        press_with(&mut app, KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(app.view(), View::Auth);
        assert!(app.chat.is_none());
    }
}
