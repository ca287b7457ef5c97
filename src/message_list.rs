//! Transcript rendering
//!
//! Every message becomes a bubble: an author label over a box-drawn frame.
//! Bubbles are plain [`Line`]s so the list can be clipped and scrolled line by
//! line. The list is anchored to the bottom edge and filled upwards, newest
//! message first.

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::state::{ChatMessage, UiState};

pub const USER_LABEL: &str = "User";
pub const MODEL_LABEL: &str = "Model";

const SPINNER: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

/// Which top corner of the bubble is squared off, pointing at the author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleCorner {
    SharpTopStart,
    SharpTopEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BubbleContent<'a> {
    Loading,
    Text(&'a str),
}

/// How one message should look, before it is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BubbleStyle<'a> {
    pub author: &'static str,
    pub alignment: Alignment,
    pub corner: BubbleCorner,
    pub color: Color,
    pub content: BubbleContent<'a>,
}

pub fn bubble_style(message: &ChatMessage) -> BubbleStyle<'_> {
    let content = if message.is_loading {
        BubbleContent::Loading
    } else {
        BubbleContent::Text(&message.message)
    };

    if message.is_from_user {
        BubbleStyle {
            author: USER_LABEL,
            alignment: Alignment::Right,
            corner: BubbleCorner::SharpTopEnd,
            color: Color::Cyan,
            content,
        }
    } else {
        BubbleStyle {
            author: MODEL_LABEL,
            alignment: Alignment::Left,
            corner: BubbleCorner::SharpTopStart,
            color: Color::Yellow,
            content,
        }
    }
}

/// Widest a bubble may be inside a container of `container_width` columns.
pub fn max_bubble_width(container_width: u16) -> usize {
    container_width as usize * 9 / 10
}

/// Messages in display order: last inserted first.
pub fn visible_items(state: &UiState) -> impl Iterator<Item = &ChatMessage> {
    state.messages.iter().rev()
}

fn pad_to(text: &str, width: usize) -> String {
    let mut padded = text.to_string();
    let used = text.width();
    if used < width {
        padded.push_str(&" ".repeat(width - used));
    }
    padded
}

/// Render one message as label, frame and a trailing blank spacer line.
pub fn render_item(
    message: &ChatMessage,
    container_width: u16,
    frame: usize,
) -> Vec<Line<'static>> {
    let style = bubble_style(message);
    let border = Style::default().fg(style.color);

    // two border columns plus one column of padding on each side
    let max_inner = max_bubble_width(container_width).saturating_sub(4).max(1);

    let body: Vec<String> = match style.content {
        BubbleContent::Loading => vec![SPINNER[frame % SPINNER.len()].to_string()],
        BubbleContent::Text(text) => {
            let mut rows = Vec::new();
            for paragraph in text.split('\n') {
                if paragraph.is_empty() {
                    rows.push(String::new());
                    continue;
                }
                rows.extend(
                    textwrap::wrap(paragraph, max_inner)
                        .into_iter()
                        .map(|row| row.into_owned()),
                );
            }
            rows
        }
    };

    let inner = body.iter().map(|row| row.width()).max().unwrap_or(0).clamp(1, max_inner);
    let rule = "─".repeat(inner + 2);
    let (top_left, top_right) = match style.corner {
        BubbleCorner::SharpTopStart => ("┌", "╮"),
        BubbleCorner::SharpTopEnd => ("╭", "┐"),
    };

    let body_style = match style.content {
        BubbleContent::Loading => Style::default().fg(style.color),
        BubbleContent::Text(_) => Style::default(),
    };

    let mut lines = Vec::with_capacity(body.len() + 4);
    lines.push(
        Line::from(Span::styled(
            style.author,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
        ))
        .alignment(style.alignment),
    );
    lines.push(
        Line::from(Span::styled(format!("{}{}{}", top_left, rule, top_right), border))
            .alignment(style.alignment),
    );
    for row in &body {
        lines.push(
            Line::from(vec![
                Span::styled("│ ", border),
                Span::styled(pad_to(row, inner), body_style),
                Span::styled(" │", border),
            ])
            .alignment(style.alignment),
        );
    }
    lines.push(
        Line::from(Span::styled(format!("╰{}╯", rule), border)).alignment(style.alignment),
    );
    lines.push(Line::default());
    lines
}

/// All transcript lines top to bottom, i.e. the display order reversed back.
pub fn transcript_lines(state: &UiState, container_width: u16, frame: usize) -> Vec<Line<'static>> {
    let mut items: Vec<Vec<Line<'static>>> = visible_items(state)
        .map(|message| render_item(message, container_width, frame))
        .collect();
    items.reverse();
    items.into_iter().flatten().collect()
}

/// Draw the transcript bottom-anchored. `scroll` counts lines up from the
/// newest one and is clamped; the clamped value is returned.
pub fn render_message_list(
    frame: &mut Frame,
    area: Rect,
    state: &UiState,
    scroll: u16,
    animation_frame: usize,
) -> u16 {
    if state.is_empty() {
        let hint = Paragraph::new(Line::from(Span::styled(
            "Ask about your car's health",
            Style::default().fg(Color::DarkGray),
        )))
        .alignment(Alignment::Center);
        let hint_area = Rect::new(
            area.x,
            area.bottom().saturating_sub(1),
            area.width,
            1.min(area.height),
        );
        frame.render_widget(hint, hint_area);
        return 0;
    }

    let lines = transcript_lines(state, area.width, animation_frame);
    let total = lines.len() as u16;
    let height = area.height;
    let max_scroll = total.saturating_sub(height);
    let scroll = scroll.min(max_scroll);

    // Short transcripts sit on the bottom edge.
    let visible = total.min(height);
    let list_area = Rect::new(area.x, area.bottom() - visible, area.width, visible);
    let top = total - visible - scroll;

    let list = Paragraph::new(lines).scroll((top, 0));
    frame.render_widget(list, list_area);
    scroll
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn text_of(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_user_style() {
        let message = ChatMessage::user("How's my car?");
        let style = bubble_style(&message);
        assert_eq!(style.author, "User");
        assert_eq!(style.alignment, Alignment::Right);
        assert_eq!(style.corner, BubbleCorner::SharpTopEnd);
        assert_eq!(style.content, BubbleContent::Text("How's my car?"));
    }

    #[test]
    fn test_model_style() {
        let message = ChatMessage::model("03, 02, 01 01");
        let style = bubble_style(&message);
        assert_eq!(style.author, "Model");
        assert_eq!(style.alignment, Alignment::Left);
        assert_eq!(style.corner, BubbleCorner::SharpTopStart);
    }

    #[test]
    fn test_loading_shows_spinner_not_text() {
        let message = ChatMessage {
            message: "should not show".to_string(),
            is_from_user: false,
            is_loading: true,
        };
        assert_eq!(bubble_style(&message).content, BubbleContent::Loading);

        let lines = render_item(&message, 40, 0);
        let all: String = lines.iter().map(text_of).collect::<Vec<_>>().join("\n");
        assert!(!all.contains("should not show"));
        assert!(all.contains(SPINNER[0]));
    }

    #[test]
    fn test_bubble_width_capped_at_ninety_percent() {
        let words = "word ".repeat(60);
        let lines = render_item(&ChatMessage::model(words.trim()), 50, 0);
        for line in &lines[1..lines.len() - 1] {
            assert!(text_of(line).width() <= max_bubble_width(50));
        }

        let unbroken = "x".repeat(200);
        let lines = render_item(&ChatMessage::model(unbroken), 50, 0);
        assert_eq!(text_of(&lines[1]).width(), 45);
    }

    #[test]
    fn test_item_shape() {
        let lines = render_item(&ChatMessage::user("hi"), 80, 0);
        assert_eq!(text_of(&lines[0]), "User");
        assert_eq!(text_of(&lines[1]), "╭────┐");
        assert_eq!(text_of(&lines[2]), "│ hi │");
        assert_eq!(text_of(&lines[3]), "╰────╯");
        assert_eq!(text_of(&lines[4]), "");
        assert!(lines.iter().take(4).all(|l| l.alignment == Some(Alignment::Right)));
    }

    #[test]
    fn test_visible_items_reverse_insertion_order() {
        let state = UiState {
            messages: vec![
                ChatMessage::user("one"),
                ChatMessage::model("two"),
                ChatMessage::user("three"),
            ],
        };
        let order: Vec<&str> = visible_items(&state).map(|m| m.message.as_str()).collect();
        assert_eq!(order, ["three", "two", "one"]);
    }

    #[test]
    fn test_newest_message_drawn_at_bottom() {
        let state = UiState {
            messages: vec![ChatMessage::user("first"), ChatMessage::model("second")],
        };
        let backend = TestBackend::new(30, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| {
                render_message_list(frame, frame.area(), &state, 0, 0);
            })
            .unwrap();

        let buffer = terminal.backend().buffer();
        let row = |y: u16| -> String {
            (0..buffer.area.width)
                .map(|x| buffer[(x, y)].symbol().to_string())
                .collect()
        };
        let rows: Vec<String> = (0..20).map(row).collect();
        let first = rows.iter().position(|r| r.contains("first")).unwrap();
        let second = rows.iter().position(|r| r.contains("second")).unwrap();
        assert!(first < second);
        // last line is the spacer under the newest bubble
        assert!(rows[18].contains('╰'));
        assert!(rows[19].trim().is_empty());
    }

    #[test]
    fn test_scroll_is_clamped() {
        let state = UiState {
            messages: vec![ChatMessage::user("a"), ChatMessage::model("b")],
        };
        let backend = TestBackend::new(30, 4);
        let mut terminal = Terminal::new(backend).unwrap();
        let mut applied = 0;
        terminal
            .draw(|frame| {
                applied = render_message_list(frame, frame.area(), &state, 500, 0);
            })
            .unwrap();
        // two items of five lines each, four visible
        assert_eq!(applied, 6);
    }
}
