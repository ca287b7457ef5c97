use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;
use crate::message_list::render_message_list;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, transcript, composer, footer
    let [header_area, list_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    // Horizontal padding around the transcript
    let list_area = Rect {
        x: list_area.x + 1,
        width: list_area.width.saturating_sub(2),
        ..list_area
    };
    app.list_area = Some(list_area);
    app.list_height = list_area.height;

    let scroll = {
        let state = app.ui_state.borrow();
        render_message_list(frame, list_area, &state, app.scroll, app.animation_frame)
    };
    app.scroll = scroll;

    render_composer(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" OBD2 Diagnostic Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!(" {} ", app.model_name), Style::default().fg(Color::White)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_composer(app: &App, frame: &mut Frame, area: Rect) {
    let enabled = app.input_enabled();
    let border_color = if enabled { Color::Yellow } else { Color::DarkGray };
    let text_color = if enabled { Color::Cyan } else { Color::DarkGray };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(if enabled { " Message " } else { " Message (waiting for reply) " });

    // Horizontal scrolling keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.composer.cursor();
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .composer
        .text()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(input_block);

    frame.render_widget(input, area);

    if enabled {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Ctrl+L ", key_style),
        Span::styled(" new chat ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ];
    if app.scroll > 0 {
        hints.push(Span::styled(
            format!(" {} lines up ", app.scroll),
            Style::default().fg(Color::DarkGray),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}
