//! Auth wizard screen

use super::layout::centered;
use crate::app::App;
use crate::state::{AuthFlow, Form, FormField};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

const FIELD_HEIGHT: u16 = 3;

/// Draw the auth wizard
pub fn draw(frame: &mut Frame, area: Rect, app: &App) {
    let Some(flow) = app.state.auth.as_ref() else {
        return;
    };

    let field_count = flow.field_count() as u16;
    let height = 8 + field_count * FIELD_HEIGHT + 2;
    let card = centered(area, 64, height);

    let (current, total) = flow.progress();
    let block = Block::default()
        .title(format!(" {} · step {}/{} ", flow.flow_type(), current, total))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(card);
    frame.render_widget(block, card);

    let mut constraints = vec![
        Constraint::Length(1), // Title
        Constraint::Length(2), // Subtitle
        Constraint::Length(1), // Account type
    ];
    constraints.extend((0..field_count).map(|_| Constraint::Length(FIELD_HEIGHT)));
    constraints.push(Constraint::Length(2)); // Error / progress
    constraints.push(Constraint::Min(0));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    frame.render_widget(
        Paragraph::new(Span::styled(
            flow.title(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(Span::styled(
            flow.subtitle(),
            Style::default().fg(Color::DarkGray),
        ))
        .wrap(Wrap { trim: true }),
        chunks[1],
    );
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Account: ", Style::default().fg(Color::DarkGray)),
            Span::raw(flow.user_type.label()),
        ])),
        chunks[2],
    );

    for index in 0..flow.field_count() {
        if let Some(field) = flow.get_field(index) {
            let is_active = index == flow.active_field() && !flow.busy;
            draw_field(frame, chunks[3 + index], field, is_active);
        }
    }

    frame.render_widget(footer(flow), chunks[3 + flow.field_count()]);
}

fn footer(flow: &AuthFlow) -> Paragraph<'_> {
    if flow.busy {
        return Paragraph::new(Span::styled(
            "Please wait…",
            Style::default().fg(Color::Yellow),
        ));
    }
    match &flow.error {
        Some(error) => Paragraph::new(Span::styled(
            error.as_str(),
            Style::default().fg(Color::Red),
        ))
        .wrap(Wrap { trim: true }),
        None => Paragraph::new(""),
    }
}

/// Draw a single form field
fn draw_field(frame: &mut Frame, area: Rect, field: &FormField, is_active: bool) {
    let color = if is_active {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let display_value = field.display_value();
    let cursor = if is_active { "▌" } else { "" };

    let content = Paragraph::new(Line::from(vec![
        Span::styled(display_value, Style::default().fg(color)),
        Span::styled(cursor, Style::default().fg(Color::Cyan)),
    ]));

    let block = Block::default()
        .title(format!(" {} ", field.label))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));

    frame.render_widget(content.block(block), area);
}
