use ratatui::{
    layout::{Constraint, Layout},
    widgets::{Block, Borders},
    Frame,
};

use crate::app::App;
use crate::components::help::HelpOverlay;
use crate::components::status_bar::StatusBarWidget;
use crate::components::tree::TreeWidget;

/// Render the application UI.
pub fn render(app: &mut App, frame: &mut Frame) {
    let [tree_area, status_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(frame.area());

    // Account for the border
    app.update_scroll(tree_area.height.saturating_sub(2) as usize);

    let root = app.tree.root();
    let block = Block::default()
        .title(format!(" {} ", root.name))
        .borders(Borders::ALL);
    let tree_widget = TreeWidget::new(&app.rows, app.selected_index, app.scroll_offset).block(block);
    frame.render_widget(tree_widget, tree_area);

    let path_str = app
        .selected_node()
        .map(|n| n.path.display().to_string())
        .unwrap_or_default();
    let cache = app.tree.cache();
    let tree_info = format!(
        "{} | {} rows | cache {}/{}",
        app.tree.policy().label(),
        app.rows.len(),
        cache.len(),
        cache.max_size()
    );

    let mut status = StatusBarWidget::new(&path_str, &tree_info)
        .mapping_active(app.tree.mapping().is_running());
    if let Some((msg, _)) = &app.status_message {
        status = status.status_message(msg);
    }
    frame.render_widget(status, status_area);

    if app.show_help {
        frame.render_widget(HelpOverlay, frame.area());
    }
}
