use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use orbit::fs::node::TreeNode;

/// Tree widget that renders the flattened rows with box-drawing characters.
pub struct TreeWidget<'a> {
    rows: &'a [TreeNode],
    selected: usize,
    scroll_offset: usize,
    block: Option<Block<'a>>,
}

impl<'a> TreeWidget<'a> {
    pub fn new(rows: &'a [TreeNode], selected: usize, scroll_offset: usize) -> Self {
        Self {
            rows,
            selected,
            scroll_offset,
            block: None,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = block.into();
        self
    }

    /// Whether no later sibling of `rows[index]` follows it.
    fn is_last_sibling(rows: &[TreeNode], index: usize) -> bool {
        let level = rows[index].level;
        rows[index + 1..]
            .iter()
            .find(|n| n.level <= level)
            .map_or(true, |n| n.level < level)
    }

    /// Build the prefix string for tree indentation using box-drawing characters.
    ///
    /// Continuation lines depend on whether each ancestor is the last of its
    /// siblings, so the ancestor chain is found by walking back up the rows.
    fn build_prefix(rows: &[TreeNode], index: usize) -> String {
        let level = rows[index].level;
        if level == 0 {
            return String::new();
        }

        let mut parts: Vec<&str> = Vec::new();
        for d in 1..level {
            let ancestor = (0..index)
                .rev()
                .take_while(|&j| rows[j].level >= d)
                .find(|&j| rows[j].level == d);
            let ancestor_is_last = ancestor.is_some_and(|j| Self::is_last_sibling(rows, j));
            parts.push(if ancestor_is_last { "   " } else { "│  " });
        }

        parts.push(if Self::is_last_sibling(rows, index) {
            "└──"
        } else {
            "├──"
        });
        parts.join("")
    }

    fn item_indicator(node: &TreeNode) -> &'static str {
        match (node.is_dir, node.is_expanded) {
            (true, true) => "▾ ",
            (true, false) => "▸ ",
            (false, _) => "  ",
        }
    }

    fn item_style(node: &TreeNode, is_selected: bool) -> Style {
        if is_selected {
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD)
        } else if node.is_symlink {
            Style::default().fg(Color::Cyan)
        } else if node.is_dir {
            Style::default()
                .fg(Color::LightBlue)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        }
    }
}

impl<'a> Widget for TreeWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_area = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };

        let visible_height = inner_area.height as usize;
        if self.rows.is_empty() || visible_height == 0 {
            return;
        }

        let visible = self
            .rows
            .iter()
            .enumerate()
            .skip(self.scroll_offset)
            .take(visible_height);

        for (i, (idx, node)) in visible.enumerate() {
            let y = inner_area.y + i as u16;
            let prefix = Self::build_prefix(self.rows, idx);
            let link = if node.is_symlink { " ->" } else { "" };
            let content = format!(
                "{}{}{}{}",
                prefix,
                Self::item_indicator(node),
                node.name,
                link
            );

            let line = Line::from(Span::styled(
                content,
                Self::item_style(node, idx == self.selected),
            ));
            buf.set_line(inner_area.x, y, &line, inner_area.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn dir(parent: &TreeNode, name: &str, expanded: bool) -> TreeNode {
        let mut node = parent.child(&parent.path.join(name));
        node.is_dir = true;
        node.is_expanded = expanded;
        node
    }

    fn file(parent: &TreeNode, name: &str) -> TreeNode {
        let mut node = parent.child(&parent.path.join(name));
        node.is_file = true;
        node
    }

    /// root/{src/{main.rs}, docs, README.md}
    fn sample_rows() -> Vec<TreeNode> {
        let mut root = TreeNode::root(Path::new("/orbit-widget"));
        root.is_dir = true;
        root.is_expanded = true;
        let src = dir(&root, "src", true);
        let main = file(&src, "main.rs");
        let docs = dir(&root, "docs", false);
        let readme = file(&root, "README.md");
        vec![root, src, main, docs, readme]
    }

    fn render_lines(rows: &[TreeNode], width: u16, height: u16) -> Vec<String> {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        TreeWidget::new(rows, 0, 0).render(area, &mut buf);
        (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| buf.cell((x, y)).unwrap().symbol().to_string())
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn prefixes_follow_sibling_structure() {
        let rows = sample_rows();
        assert_eq!(TreeWidget::build_prefix(&rows, 0), "");
        assert_eq!(TreeWidget::build_prefix(&rows, 1), "├──");
        assert_eq!(TreeWidget::build_prefix(&rows, 2), "│  └──");
        assert_eq!(TreeWidget::build_prefix(&rows, 3), "├──");
        assert_eq!(TreeWidget::build_prefix(&rows, 4), "└──");
    }

    #[test]
    fn renders_indicators_and_names() {
        let rows = sample_rows();
        let lines = render_lines(&rows, 40, 5);
        assert_eq!(lines[0], "▾ orbit-widget");
        assert_eq!(lines[1], "├──▾ src");
        assert_eq!(lines[2], "│  └──  main.rs");
        assert_eq!(lines[3], "├──▸ docs");
        assert_eq!(lines[4], "└──  README.md");
    }

    #[test]
    fn selected_row_is_highlighted() {
        let rows = sample_rows();
        let area = Rect::new(0, 0, 30, 5);
        let mut buf = Buffer::empty(area);
        TreeWidget::new(&rows, 1, 0).render(area, &mut buf);
        assert_eq!(buf.cell((0, 1)).unwrap().bg, Color::Blue);
        assert_ne!(buf.cell((0, 0)).unwrap().bg, Color::Blue);
    }

    #[test]
    fn scroll_offset_skips_rows() {
        let rows = sample_rows();
        let area = Rect::new(0, 0, 30, 2);
        let mut buf = Buffer::empty(area);
        TreeWidget::new(&rows, 3, 3).render(area, &mut buf);
        let first: String = (0..30)
            .map(|x| buf.cell((x, 0)).unwrap().symbol().to_string())
            .collect();
        assert!(first.contains("docs"));
    }

    #[test]
    fn empty_rows_do_not_panic() {
        let area = Rect::new(0, 0, 10, 3);
        let mut buf = Buffer::empty(area);
        TreeWidget::new(&[], 0, 0).render(area, &mut buf);
    }
}
