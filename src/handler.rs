use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::App;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
    Ok(())
}

/// Whether the frame is stale after `event`. Idle ticks only matter while a
/// spinner is showing.
pub fn needs_redraw(app: &App, event: &AppEvent) -> bool {
    match event {
        AppEvent::Tick => app.is_loading(),
        _ => true,
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    // Global keys that work whether or not the input is enabled
    match key.code {
        KeyCode::Char('c') if ctrl => app.should_quit = true,
        KeyCode::Char('l') if ctrl && !alt => app.reset_conversation(),
        KeyCode::Esc => app.should_quit = true,
        KeyCode::PageUp => app.page_up(),
        KeyCode::PageDown => app.page_down(),
        _ => handle_composer_key(app, key),
    }
}

fn handle_composer_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    // The input field is disabled while a reply is pending
    if !app.input_enabled() {
        return;
    }

    match key.code {
        KeyCode::Enter => app.submit(),
        KeyCode::Backspace => app.composer.backspace(),
        KeyCode::Delete => app.composer.delete(),
        KeyCode::Left => app.composer.move_left(),
        KeyCode::Right => app.composer.move_right(),
        KeyCode::Home => app.composer.home(),
        KeyCode::End => app.composer.end(),
        // AltGr arrives as Ctrl+Alt on some platforms
        KeyCode::Char(c) if !ctrl || alt => app.composer.insert(c),
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_list = app
        .list_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_list {
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
    use crate::app::tests::test_app;
    use crossterm::event::{KeyEventKind, KeyEventState, KeyModifiers};

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn with_modifiers(c: char, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code: KeyCode::Char(c),
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn ctrl(c: char) -> AppEvent {
        with_modifiers(c, KeyModifiers::CONTROL)
    }

    fn scroll(kind: MouseEventKind, column: u16, row: u16) -> AppEvent {
        AppEvent::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[tokio::test]
    async fn test_typing_and_enter_submits() {
        let (mut app, _updates) = test_app();
        for c in "fuel?".chars() {
            handle_event(&mut app, key(KeyCode::Char(c))).unwrap();
        }
        assert_eq!(app.composer.text(), "fuel?");

        handle_event(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.composer.text(), "");
        assert_eq!(app.ui_state.borrow().messages[0].message, "fuel?");
    }

    #[tokio::test]
    async fn test_keys_ignored_while_disabled() {
        let (mut app, _updates) = test_app();
        handle_event(&mut app, key(KeyCode::Char('a'))).unwrap();
        handle_event(&mut app, key(KeyCode::Enter)).unwrap();
        assert!(!app.input_enabled());

        handle_event(&mut app, key(KeyCode::Char('b'))).unwrap();
        handle_event(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.composer.text(), "");
        assert_eq!(app.ui_state.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_enter_does_nothing() {
        let (mut app, _updates) = test_app();
        handle_event(&mut app, key(KeyCode::Char(' '))).unwrap();
        handle_event(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.composer.text(), " ");
        assert!(app.ui_state.borrow().is_empty());
        assert!(app.input_enabled());
    }

    #[tokio::test]
    async fn test_quit_and_reset_keys() {
        let (mut app, _updates) = test_app();
        handle_event(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert!(!app.should_quit);

        handle_event(&mut app, key(KeyCode::Enter)).unwrap();
        handle_event(&mut app, ctrl('l')).unwrap();
        assert!(app.ui_state.borrow().is_empty());
        assert_eq!(app.composer.text(), "");

        handle_event(&mut app, ctrl('c')).unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_mouse_scroll_only_over_list() {
        let (mut app, _updates) = test_app();
        app.list_area = Some(Rect::new(0, 1, 40, 10));

        handle_event(&mut app, scroll(MouseEventKind::ScrollUp, 5, 5)).unwrap();
        assert_eq!(app.scroll, 3);
        handle_event(&mut app, scroll(MouseEventKind::ScrollUp, 5, 20)).unwrap();
        assert_eq!(app.scroll, 3);
        handle_event(&mut app, scroll(MouseEventKind::ScrollDown, 5, 5)).unwrap();
        assert_eq!(app.scroll, 0);
    }

    #[tokio::test]
    async fn test_altgr_characters_are_typed() {
        let (mut app, _updates) = test_app();
        let altgr = KeyModifiers::CONTROL | KeyModifiers::ALT;
        handle_event(&mut app, with_modifiers('@', altgr)).unwrap();
        handle_event(&mut app, with_modifiers('€', altgr)).unwrap();
        // AltGr+L must not wipe the conversation
        handle_event(&mut app, with_modifiers('l', altgr)).unwrap();
        assert_eq!(app.composer.text(), "@€l");
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn test_control_chords_are_not_typed() {
        let (mut app, _updates) = test_app();
        handle_event(&mut app, ctrl('x')).unwrap();
        handle_event(&mut app, ctrl('a')).unwrap();
        assert_eq!(app.composer.text(), "");
        assert!(!app.should_quit);

        handle_event(&mut app, with_modifiers('E', KeyModifiers::SHIFT)).unwrap();
        assert_eq!(app.composer.text(), "E");
    }

    #[tokio::test]
    async fn test_idle_ticks_skip_redraw() {
        let (mut app, _updates) = test_app();
        assert!(!needs_redraw(&app, &AppEvent::Tick));
        assert!(needs_redraw(&app, &AppEvent::Resize(80, 24)));
        assert!(needs_redraw(&app, &key(KeyCode::Char('a'))));

        handle_event(&mut app, key(KeyCode::Enter)).unwrap();
        assert!(needs_redraw(&app, &AppEvent::Tick));
    }
}
