use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

const KEY_HINTS: &str = " l:open  h:close  E/C:all  p:policy  q:quit ";

/// Status bar widget: selected path, engine info and key hints, or a
/// transient status message.
pub struct StatusBarWidget<'a> {
    path_str: &'a str,
    tree_info: &'a str,
    status_message: Option<&'a str>,
    mapping_active: bool,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(path_str: &'a str, tree_info: &'a str) -> Self {
        Self {
            path_str,
            tree_info,
            status_message: None,
            mapping_active: false,
        }
    }

    pub fn status_message(mut self, msg: &'a str) -> Self {
        self.status_message = Some(msg);
        self
    }

    pub fn mapping_active(mut self, active: bool) -> Self {
        self.mapping_active = active;
        self
    }
}

/// Keep the tail of `s` within `budget` characters, marking the cut.
fn truncate_left(s: &str, budget: usize) -> String {
    let len = s.chars().count();
    if len <= budget {
        return s.to_string();
    }
    if budget <= 3 {
        return s.chars().take(budget).collect();
    }
    let tail: String = s.chars().skip(len - (budget - 3)).collect();
    format!("...{tail}")
}

impl<'a> Widget for StatusBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let width = area.width as usize;

        if let Some(msg) = self.status_message {
            let display: String = format!("{:<width$}", msg, width = width)
                .chars()
                .take(width)
                .collect();
            let line = Line::from(Span::styled(display, Style::default().fg(Color::Green)));
            buf.set_line(area.x, area.y, &line, area.width);
            return;
        }

        // [path] [mapping] [tree_info] [key_hints]
        let mapping = if self.mapping_active { " mapping… " } else { "" };
        let fixed = KEY_HINTS.chars().count() + mapping.chars().count();
        let remaining = width.saturating_sub(fixed);

        let info_display = truncate_left(self.tree_info, remaining);
        let path_budget = remaining
            .saturating_sub(info_display.chars().count())
            .saturating_sub(1);
        let path_display = truncate_left(self.path_str, path_budget);

        let gap = remaining
            .saturating_sub(path_display.chars().count())
            .saturating_sub(info_display.chars().count());

        let spans = vec![
            Span::styled(path_display, Style::default().fg(Color::White)),
            Span::raw(" ".repeat(gap)),
            Span::styled(info_display, Style::default().fg(Color::Cyan)),
            Span::styled(
                mapping,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                KEY_HINTS,
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::DIM),
            ),
        ];

        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_to_string(widget: StatusBarWidget, width: u16) -> (Buffer, String) {
        let area = Rect::new(0, 0, width, 1);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        let content = (0..width)
            .map(|x| buf.cell((x, 0)).unwrap().symbol().to_string())
            .collect();
        (buf, content)
    }

    #[test]
    fn test_basic_widget_creation() {
        let widget = StatusBarWidget::new("/home/user/project", "default | 12 rows");
        assert_eq!(widget.path_str, "/home/user/project");
        assert_eq!(widget.tree_info, "default | 12 rows");
        assert!(widget.status_message.is_none());
        assert!(!widget.mapping_active);
    }

    #[test]
    fn test_status_message() {
        let widget = StatusBarWidget::new("/path", "info").status_message("Policy: single");
        let (buf, content) = render_to_string(widget, 80);
        assert!(content.contains("Policy: single"));
        assert_eq!(buf.cell((0, 0)).unwrap().fg, Color::Green);
    }

    #[test]
    fn test_normal_bar_rendering() {
        let widget = StatusBarWidget::new("/home/user/project", "recursive | cache 4/100");
        let (_, content) = render_to_string(widget, 120);
        assert!(content.contains("/home/user/project"));
        assert!(content.contains("recursive | cache 4/100"));
        assert!(content.contains("p:policy"));
        assert!(!content.contains("mapping"));
    }

    #[test]
    fn test_mapping_indicator() {
        let widget = StatusBarWidget::new("/p", "info").mapping_active(true);
        let (_, content) = render_to_string(widget, 120);
        assert!(content.contains("mapping"));
    }

    #[test]
    fn test_long_path_is_truncated_from_the_left() {
        let long = format!("/very/{}/leaf", "deep/".repeat(40));
        let widget = StatusBarWidget::new(&long, "info");
        let (_, content) = render_to_string(widget, 80);
        assert!(content.starts_with("..."));
        assert!(content.contains("leaf"));
    }

    #[test]
    fn test_zero_area_does_not_panic() {
        let widget = StatusBarWidget::new("/path", "info");
        let area = Rect::new(0, 0, 0, 0);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
    }

    #[test]
    fn truncate_left_keeps_short_strings() {
        assert_eq!(truncate_left("abc", 10), "abc");
        assert_eq!(truncate_left("abcdefgh", 6), "...fgh");
        assert_eq!(truncate_left("abcdef", 2), "ab");
    }
}
