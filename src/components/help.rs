use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

/// A single keybinding entry for display.
struct KeyEntry {
    key: &'static str,
    description: &'static str,
}

/// A category of keybindings.
struct KeyCategory {
    name: &'static str,
    entries: &'static [KeyEntry],
}

const NAVIGATION_KEYS: &[KeyEntry] = &[
    KeyEntry {
        key: "j / ↓",
        description: "Move down",
    },
    KeyEntry {
        key: "k / ↑",
        description: "Move up",
    },
    KeyEntry {
        key: "g / Home",
        description: "Jump to first item",
    },
    KeyEntry {
        key: "G / End",
        description: "Jump to last item",
    },
];

const TREE_KEYS: &[KeyEntry] = &[
    KeyEntry {
        key: "Enter / l / →",
        description: "Expand directory",
    },
    KeyEntry {
        key: "h / ←",
        description: "Collapse directory or go to parent",
    },
    KeyEntry {
        key: "Space",
        description: "Toggle directory",
    },
    KeyEntry {
        key: "E",
        description: "Expand everything",
    },
    KeyEntry {
        key: "C",
        description: "Collapse everything",
    },
    KeyEntry {
        key: "p",
        description: "Cycle expansion policy",
    },
    KeyEntry {
        key: "x",
        description: "Cancel background work",
    },
];

const GENERAL_KEYS: &[KeyEntry] = &[
    KeyEntry {
        key: "?",
        description: "Toggle this help",
    },
    KeyEntry {
        key: "q / Ctrl+C",
        description: "Quit",
    },
];

const CATEGORIES: &[KeyCategory] = &[
    KeyCategory {
        name: "Navigation",
        entries: NAVIGATION_KEYS,
    },
    KeyCategory {
        name: "Tree",
        entries: TREE_KEYS,
    },
    KeyCategory {
        name: "General",
        entries: GENERAL_KEYS,
    },
];

/// Help overlay widget showing all keybindings.
pub struct HelpOverlay;

impl HelpOverlay {
    fn build_content_lines() -> Vec<Line<'static>> {
        let accent = Style::default()
            .fg(Color::LightBlue)
            .add_modifier(Modifier::BOLD);
        let mut lines = vec![
            Line::from(Span::styled(" Keybinding Reference ", accent)),
            Line::from(""),
        ];

        for category in CATEGORIES {
            lines.push(Line::from(vec![
                Span::styled(format!("── {} ", category.name), accent),
                Span::styled("─".repeat(30), Style::default().fg(Color::DarkGray)),
            ]));
            for entry in category.entries {
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("  {:<18}", entry.key),
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(entry.description),
                ]));
            }
            lines.push(Line::from(""));
        }

        lines.push(Line::from(Span::styled(
            " Press ? or Esc to close ",
            Style::default().fg(Color::DarkGray),
        )));
        lines
    }

    /// Get total number of content lines.
    pub fn total_lines() -> usize {
        // title, blank, per category header + entries + blank, footer
        3 + CATEGORIES
            .iter()
            .map(|c| c.entries.len() + 2)
            .sum::<usize>()
    }
}

impl Widget for HelpOverlay {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let overlay_width = area.width.min(60);
        let overlay_height = area.height.min(Self::total_lines() as u16 + 2);
        let x = area.x + area.width.saturating_sub(overlay_width) / 2;
        let y = area.y + area.height.saturating_sub(overlay_height) / 2;
        let overlay_area = Rect::new(x, y, overlay_width, overlay_height);

        Clear.render(overlay_area, buf);
        let block = Block::default()
            .title(" Help ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::LightBlue));
        let inner = block.inner(overlay_area);
        block.render(overlay_area, buf);

        for (i, line) in Self::build_content_lines()
            .iter()
            .take(inner.height as usize)
            .enumerate()
        {
            buf.set_line(
                inner.x + 1,
                inner.y + i as u16,
                line,
                inner.width.saturating_sub(2),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_categories_have_entries() {
        for cat in CATEGORIES {
            assert!(
                !cat.entries.is_empty(),
                "Category '{}' has no entries",
                cat.name
            );
        }
    }

    #[test]
    fn content_lines_match_total() {
        assert_eq!(HelpOverlay::build_content_lines().len(), HelpOverlay::total_lines());
    }

    #[test]
    fn renders_inside_small_area() {
        let area = Rect::new(0, 0, 50, 10);
        let mut buf = Buffer::empty(area);
        HelpOverlay.render(area, &mut buf);
        let top: String = (0..50)
            .map(|x| buf.cell((x, 0)).unwrap().symbol().to_string())
            .collect();
        assert!(top.contains("Help"));
    }
}
