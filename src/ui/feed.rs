//! Signal feed list and detail view

use crate::app::App;
use crate::state::{SignalDirection, SignalPost};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

fn direction_color(direction: SignalDirection) -> Color {
    match direction {
        SignalDirection::Long => Color::Green,
        SignalDirection::Short => Color::Red,
    }
}

fn format_price(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

/// Draw the signal feed
pub fn draw(frame: &mut Frame, area: Rect, app: &App) {
    let feed = &app.state.feed;
    let title = if feed.is_loading_more() {
        format!(
            " Signals ({}) · loading page {}… ",
            feed.items().len(),
            feed.page()
        )
    } else if feed.has_pending_trigger() {
        format!(" Signals ({}) · more on the way… ", feed.items().len())
    } else {
        format!(" Signals ({}) ", feed.items().len())
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    // Full-screen placeholders only while nothing is listed
    if feed.items().is_empty() {
        let (text, color) = if feed.is_loading() {
            ("Loading signals…".to_string(), Color::Yellow)
        } else if let Some(error) = feed.error() {
            (format!("{error}\n\nPress r to retry"), Color::Red)
        } else if feed.is_empty_state() {
            ("No signals yet".to_string(), Color::DarkGray)
        } else {
            (String::new(), Color::DarkGray)
        };
        let placeholder = Paragraph::new(text)
            .style(Style::default().fg(color))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let mut items: Vec<ListItem> = feed.items().iter().map(signal_row).collect();
    if let Some(error) = feed.error() {
        items.push(ListItem::new(Line::from(Span::styled(
            format!("  {error}"),
            Style::default().fg(Color::Red),
        ))));
    } else if !feed.has_next_page() {
        items.push(ListItem::new(Line::from(Span::styled(
            "  End of feed",
            Style::default().fg(Color::DarkGray),
        ))));
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");

    let mut state = ListState::default().with_selected(Some(app.state.selected_index));
    frame.render_stateful_widget(list, area, &mut state);
}

fn signal_row(post: &SignalPost) -> ListItem<'_> {
    let mut spans = vec![
        Span::styled(
            format!("{:<5} ", post.direction.label()),
            Style::default()
                .fg(direction_color(post.direction))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{:<12}", post.symbol),
            Style::default().fg(Color::White),
        ),
        Span::raw(format!(" @ {:<12.2}", post.entry_price)),
        Span::styled(
            format!(" {}", post.agent.display_name()),
            Style::default().fg(Color::Cyan),
        ),
    ];
    if post.agent.is_verified {
        spans.push(Span::styled(" ✓", Style::default().fg(Color::Green)));
    }
    spans.push(Span::styled(
        format!("  {}", post.created_at.format("%Y-%m-%d %H:%M")),
        Style::default().fg(Color::DarkGray),
    ));
    ListItem::new(Line::from(spans))
}

/// Draw the selected signal in full
pub fn draw_detail(frame: &mut Frame, area: Rect, app: &App) {
    let Some(post) = app.state.selected_post() else {
        let empty = Paragraph::new("No signal selected")
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    };

    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                post.direction.label(),
                Style::default()
                    .fg(direction_color(post.direction))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(
                post.symbol.as_str(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Agent:       ", label),
            Span::styled(post.agent.display_name(), Style::default().fg(Color::Cyan)),
            Span::styled(format!(" (@{})", post.agent.username), label),
        ]),
        Line::from(vec![
            Span::styled("Entry:       ", label),
            Span::raw(format!("{:.2}", post.entry_price)),
        ]),
        Line::from(vec![
            Span::styled("Take profit: ", label),
            Span::styled(
                format_price(post.take_profit),
                Style::default().fg(Color::Green),
            ),
        ]),
        Line::from(vec![
            Span::styled("Stop loss:   ", label),
            Span::styled(format_price(post.stop_loss), Style::default().fg(Color::Red)),
        ]),
    ];
    if let Some(ratio) = post.risk_reward() {
        lines.push(Line::from(vec![
            Span::styled("R:R:         ", label),
            Span::raw(format!("{ratio:.2}")),
        ]));
    }
    lines.push(Line::from(vec![
        Span::styled("Posted:      ", label),
        Span::raw(post.created_at.format("%Y-%m-%d %H:%M UTC").to_string()),
    ]));

    if !post.body.is_empty() {
        lines.push(Line::from(""));
        lines.extend(post.body.lines().map(Line::from));
    }

    let detail = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .title(format!(" {} ", post.symbol))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(detail, area);
}
