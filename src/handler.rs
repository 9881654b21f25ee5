use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::App;

/// Handle a key event.
///
/// Tree tasks report back through update notifications, so their handles
/// are dropped here.
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if app.show_help {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
            app.toggle_help();
        }
        return;
    }

    match key.code {
        KeyCode::Char('?') => app.toggle_help(),
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
        KeyCode::Char('g') | KeyCode::Home => app.select_first(),
        KeyCode::Char('G') | KeyCode::End => app.select_last(),
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Enter => {
            app.expand_selected();
        }
        KeyCode::Char('h') | KeyCode::Left => {
            app.collapse_selected();
        }
        KeyCode::Char(' ') => {
            app.toggle_selected();
        }
        KeyCode::Char('E') => {
            app.expand_all();
        }
        KeyCode::Char('C') => {
            app.collapse_all();
        }
        KeyCode::Char('p') => app.cycle_policy(),
        KeyCode::Char('x') => app.cancel_background(),
        _ => {}
    }
}

/// Handle a mouse event: the wheel moves the selection.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.select_next(),
        MouseEventKind::ScrollUp => app.select_previous(),
        _ => {}
    }
}
